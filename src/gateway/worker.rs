//! HTTP client for the remote background-removal worker
//!
//! The gateway forwards one request per processing call and classifies
//! failures for the caller. There are no retries here: a credit has
//! already been spent by the time the worker is called, so duplicate
//! submissions would double-charge work.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const RESPONSE_SNIPPET_LEN: usize = 256;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("Worker did not respond within the processing deadline")]
    Timeout,

    #[error("Worker rejected the request (status {status}): {message}")]
    UpstreamRejected { status: u16, message: String },

    #[error("Worker unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Worker returned an unreadable response: {0}")]
    InvalidResponse(String),
}

impl UpstreamError {
    pub fn code(&self) -> &'static str {
        match self {
            UpstreamError::Timeout => "TIMEOUT",
            UpstreamError::UpstreamRejected { .. } => "UPSTREAM_REJECTED",
            UpstreamError::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
            UpstreamError::InvalidResponse(_) => "UPSTREAM_INVALID_RESPONSE",
        }
    }
}

/// Body of a worker processing call.
#[derive(Debug, Serialize)]
pub struct WorkerRequest {
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    pub return_mask: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resize: Option<HashMap<String, serde_json::Value>>,
    pub debug: bool,
}

/// Worker's response envelope.
#[derive(Debug, Deserialize)]
pub struct WorkerResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub mask: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Clone)]
pub struct WorkerClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    timeout: Duration,
}

impl WorkerClient {
    pub fn new(endpoint: String, api_key: String, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("bg-gateway/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("Failed to create worker HTTP client");

        WorkerClient {
            http,
            endpoint,
            api_key,
            timeout,
        }
    }

    /// Forward one processing request and parse the worker envelope.
    pub async fn remove_background(
        &self,
        request: &WorkerRequest,
    ) -> Result<WorkerResponse, UpstreamError> {
        debug!(endpoint = %self.endpoint, "Forwarding request to worker");

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(classify_send_error)?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| UpstreamError::InvalidResponse(e.to_string()))?;

        if !status.is_success() {
            return Err(classify_status(status.as_u16(), &body));
        }

        serde_json::from_str(&body)
            .map_err(|e| UpstreamError::InvalidResponse(e.to_string()))
    }
}

fn classify_send_error(err: reqwest::Error) -> UpstreamError {
    if err.is_timeout() {
        UpstreamError::Timeout
    } else {
        UpstreamError::UpstreamUnavailable(err.to_string())
    }
}

fn classify_status(status: u16, body: &str) -> UpstreamError {
    let message = truncate_body(body);
    if status >= 500 {
        UpstreamError::UpstreamUnavailable(format!("status {status}: {message}"))
    } else {
        UpstreamError::UpstreamRejected { status, message }
    }
}

/// Error bodies from the worker can carry whole base64 payloads; keep
/// only a short prefix for logs and responses.
fn truncate_body(body: &str) -> String {
    if body.len() <= RESPONSE_SNIPPET_LEN {
        body.to_string()
    } else {
        let mut end = RESPONSE_SNIPPET_LEN;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_classify_as_unavailable() {
        assert!(matches!(
            classify_status(502, "bad gateway"),
            UpstreamError::UpstreamUnavailable(_)
        ));
        assert!(matches!(
            classify_status(503, ""),
            UpstreamError::UpstreamUnavailable(_)
        ));
    }

    #[test]
    fn client_errors_classify_as_rejected() {
        match classify_status(422, "unprocessable") {
            UpstreamError::UpstreamRejected { status, message } => {
                assert_eq!(status, 422);
                assert_eq!(message, "unprocessable");
            }
            other => panic!("unexpected classification: {other:?}"),
        }
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "x".repeat(1000);
        let truncated = truncate_body(&body);
        assert_eq!(truncated.len(), RESPONSE_SNIPPET_LEN + 3);
        assert!(truncated.ends_with("..."));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let body = "é".repeat(300);
        let truncated = truncate_body(&body);
        assert!(truncated.ends_with("..."));
    }

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(UpstreamError::Timeout.code(), "TIMEOUT");
        assert_eq!(
            UpstreamError::UpstreamRejected {
                status: 400,
                message: String::new()
            }
            .code(),
            "UPSTREAM_REJECTED"
        );
        assert_eq!(
            UpstreamError::UpstreamUnavailable(String::new()).code(),
            "UPSTREAM_UNAVAILABLE"
        );
        assert_eq!(
            UpstreamError::InvalidResponse(String::new()).code(),
            "UPSTREAM_INVALID_RESPONSE"
        );
    }

    #[test]
    fn request_omits_unset_options() {
        let req = WorkerRequest {
            image: "data:image/png;base64,AAAA".to_string(),
            quality: None,
            format: None,
            return_mask: false,
            resize: None,
            debug: false,
        };
        let json = serde_json::to_value(&req).unwrap();
        let obj = json.as_object().unwrap();
        assert!(!obj.contains_key("quality"));
        assert!(!obj.contains_key("resize"));
        assert!(obj.contains_key("return_mask"));
    }

    #[test]
    fn response_defaults_tolerate_sparse_envelopes() {
        let resp: WorkerResponse = serde_json::from_str("{}").unwrap();
        assert!(!resp.success);
        assert!(resp.image.is_none());
        assert!(resp.metadata.is_none());
    }
}
