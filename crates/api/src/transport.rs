//! The transport contract for the remote backend.
//!
//! Everything above this layer talks in terms of `send(method, url, body) ->
//! {status, content, error}`; the backend itself is an external collaborator.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::{ApiError, ApiResult};

/// HTTP method subset used by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// Outcome of one transport exchange.
///
/// Transport-level failures are reported in `error`, never raised: retry and
/// recovery decisions belong to the caller.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status code, 0 when the request never reached the backend
    pub status: u16,
    /// Parsed response body, if any
    pub content: Option<Value>,
    /// Transport failure description, if any
    pub error: Option<String>,
}

/// Contract for reaching the remote backend
#[async_trait]
pub trait ApiTransport: Send + Sync {
    /// Perform one request against the given path (relative to the
    /// transport's base URL) and report the outcome
    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> ApiResponse;
}

/// reqwest-backed production transport
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ReqwestTransport {
    /// Build a transport for the given base URL.
    ///
    /// `token`, when present, is attached to every request as a bearer token.
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        request_timeout: Duration,
    ) -> ApiResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ApiError::transport(format!("failed to build http client: {e}")))?;

        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }

        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl ApiTransport for ReqwestTransport {
    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> ApiResponse {
        let url = self.url_for(path);
        debug!(?method, %url, "sending api request");

        let mut request = match method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
        };
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                return ApiResponse {
                    status: 0,
                    content: None,
                    error: Some(e.to_string()),
                }
            }
        };

        let status = response.status().as_u16();
        let content = response.json::<Value>().await.ok();

        ApiResponse {
            status,
            content,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining() {
        let transport =
            ReqwestTransport::new("https://api.example.com/", None, Duration::from_secs(5))
                .unwrap();
        assert_eq!(
            transport.url_for("/questionnaire/list"),
            "https://api.example.com/questionnaire/list"
        );
        assert_eq!(
            transport.url_for("questionnaire/list"),
            "https://api.example.com/questionnaire/list"
        );
    }
}
