//! # Careline API Crate
//!
//! The REST collaborator contract: a transport trait
//! (`send(method, url, body) -> {status, content, error}`), a reqwest-backed
//! production transport, and a typed client for the questionnaire surface
//! the bot consumes. The backend itself is an external system.

mod client;
mod error;
mod transport;
mod types;

pub use client::ApiClient;
pub use error::{ApiError, ApiResult};
pub use transport::{ApiResponse, ApiTransport, Method, ReqwestTransport};
pub use types::{
    QuestionListContent, QuestionListData, QuestionListResponse, QuestionnaireTemplate,
    RawAnswerOption, RawQuestion, VisitTypeRef,
};
