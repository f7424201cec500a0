//! Typed client over the transport contract.

use std::sync::Arc;

use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::transport::{ApiTransport, Method};
use crate::types::{QuestionListResponse, VisitTypeRef};

/// Typed access to the remote backend's questionnaire surface
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn ApiTransport>,
}

impl ApiClient {
    /// Create a client over the given transport
    pub fn new(transport: Arc<dyn ApiTransport>) -> Self {
        Self { transport }
    }

    /// Fetch the questionnaire template list for the given visit types.
    ///
    /// Returns `Ok(None)` when the backend answered successfully but with no
    /// body at all; structural validation of the nested levels inside the
    /// body is left to the caller.
    pub async fn get_question_list(
        &self,
        visit_types: &[VisitTypeRef],
    ) -> ApiResult<Option<QuestionListResponse>> {
        let body = serde_json::to_value(visit_types)?;
        let response = self
            .transport
            .send(Method::Post, "questionnaire/template/list", Some(body))
            .await;

        if let Some(message) = response.error {
            return Err(ApiError::Transport { message });
        }
        if !(200..300).contains(&response.status) {
            return Err(ApiError::Status {
                code: response.status,
            });
        }

        debug!(status = response.status, "question list fetched");
        match response.content {
            None => Ok(None),
            Some(content) => Ok(Some(serde_json::from_value(content)?)),
        }
    }
}
