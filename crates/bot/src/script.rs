//! Question script parsing: backend shapes into the bot's question list.

use careline_api::{QuestionListResponse, RawAnswerOption, RawQuestion};
use serde::Serialize;

use crate::error::{QuestionnaireError, QuestionnaireResult};

/// Presentation type of a question, as advertised to other participants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerType {
    Text,
    YesOrNo,
    MultipleSelect,
    MultipleChoice,
}

impl AnswerType {
    /// Map a backend question type code. The mapping is case-exact; anything
    /// unrecognized falls back to free text.
    pub fn from_type_code(code: &str) -> Self {
        match code {
            "PLAINTEXT" => AnswerType::Text,
            "YESORNO" => AnswerType::YesOrNo,
            "MULTISELECT" => AnswerType::MultipleSelect,
            "MULTICHOICE" => AnswerType::MultipleChoice,
            _ => AnswerType::Text,
        }
    }

    /// Wire name of this answer type
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerType::Text => "TEXT",
            AnswerType::YesOrNo => "YESORNO",
            AnswerType::MultipleSelect => "MULTIPLESELECT",
            AnswerType::MultipleChoice => "MULTIPLECHOICE",
        }
    }
}

/// A selectable answer option, bilingual fields included
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOption {
    pub id: i64,
    pub value: String,
    pub value_es: Option<String>,
    pub info: Option<String>,
    pub info_es: Option<String>,
    pub numeric_value: Option<f64>,
    pub display_order: Option<i64>,
}

/// One scripted question
#[derive(Debug, Clone)]
pub struct Question {
    pub id: i64,
    pub text: String,
    pub text_es: Option<String>,
    pub answer_type: AnswerType,
    pub condition_values: [Option<String>; 3],
    pub options: Vec<AnswerOption>,
}

impl From<RawAnswerOption> for AnswerOption {
    fn from(raw: RawAnswerOption) -> Self {
        Self {
            id: raw.questionnaire_options_id,
            value: raw.option_value,
            value_es: raw.option_value_es,
            info: raw.option_info,
            info_es: raw.option_info_es,
            numeric_value: raw.numeric_value,
            display_order: raw.display_order,
        }
    }
}

impl From<RawQuestion> for Question {
    fn from(raw: RawQuestion) -> Self {
        let answer_type = raw
            .question_type_code
            .as_deref()
            .map(AnswerType::from_type_code)
            .unwrap_or(AnswerType::Text);
        Self {
            id: raw.questionnaire_master_id,
            text: raw.question,
            text_es: raw.question_es,
            answer_type,
            condition_values: [
                raw.condition_value1,
                raw.condition_value2,
                raw.condition_value3,
            ],
            options: raw.answers.into_iter().map(AnswerOption::from).collect(),
        }
    }
}

/// Validate the nested response levels and extract the question list.
///
/// Uses the first data entry and first template, matching the backend's
/// one-template-per-visit-type contract.
pub fn parse_question_script(
    response: Option<QuestionListResponse>,
) -> QuestionnaireResult<Vec<Question>> {
    let response = response.ok_or(QuestionnaireError::EmptyResponse)?;
    let content = response.content.ok_or(QuestionnaireError::EmptyContent)?;
    let entry = content
        .data
        .into_iter()
        .next()
        .ok_or(QuestionnaireError::EmptyData)?;
    let template = entry
        .questionnaire_template_list
        .into_iter()
        .next()
        .ok_or(QuestionnaireError::EmptyTemplateList)?;
    if template.question_lists.is_empty() {
        return Err(QuestionnaireError::EmptyQuestionList);
    }
    Ok(template
        .question_lists
        .into_iter()
        .map(Question::from)
        .collect())
}
