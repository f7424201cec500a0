//! Error types for the questionnaire bot.

use careline_api::ApiError;
use thiserror::Error;

/// Result type alias for questionnaire operations
pub type QuestionnaireResult<T> = Result<T, QuestionnaireError>;

/// Errors raised while loading the question script.
///
/// Each structurally invalid nesting level of the backend response gets its
/// own variant so callers can tell exactly which level was missing.
#[derive(Debug, Error)]
pub enum QuestionnaireError {
    /// The backend answered with no response body at all
    #[error("question list response was empty")]
    EmptyResponse,

    /// The response body carried no content envelope
    #[error("question list response had no content")]
    EmptyContent,

    /// The content envelope carried no data entries
    #[error("question list response had no data entries")]
    EmptyData,

    /// The data entry carried no questionnaire templates
    #[error("question list response had no questionnaire templates")]
    EmptyTemplateList,

    /// The questionnaire template carried no questions
    #[error("questionnaire template had no questions")]
    EmptyQuestionList,

    /// The question list could not be fetched at all
    #[error("failed to load question list")]
    Api(#[from] ApiError),
}
