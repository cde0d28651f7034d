//! Delivery of submissions to the form endpoint.

use std::sync::Mutex;

use formset_types::{SubmissionRequest, SubmissionResponse};
use serde_json::{Map, Value};

/// Sends submission requests and returns the endpoint's response.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn submit(&self, request: &SubmissionRequest) -> Result<SubmissionResponse, TransportError>;
}

/// Errors that can occur delivering a submission.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("no endpoint configured")]
    MissingEndpoint,

    #[error("request failed: {0}")]
    Request(String),

    #[error("request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("response body is not valid JSON: {message}; body preview: {preview}")]
    InvalidBody { message: String, preview: String },
}

/// Accepts every submission with an empty success body.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineTransport;

#[async_trait::async_trait]
impl Transport for OfflineTransport {
    async fn submit(&self, request: &SubmissionRequest) -> Result<SubmissionResponse, TransportError> {
        tracing::debug!(method = request.method.as_str(), "offline transport accepted submission");
        Ok(SubmissionResponse::ok(Value::Object(Map::new())))
    }
}

/// Answers submissions from a queue of canned outcomes and records every request.
///
/// Once the queue is exhausted every submission is accepted with an empty body.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    outcomes: Mutex<Vec<Result<SubmissionResponse, TransportError>>>,
    requests: Mutex<Vec<SubmissionRequest>>,
}

impl ScriptedTransport {
    pub fn new(outcomes: Vec<Result<SubmissionResponse, TransportError>>) -> Self {
        let mut outcomes = outcomes;
        outcomes.reverse();
        Self {
            outcomes: Mutex::new(outcomes),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<SubmissionRequest> {
        self.requests.lock().map(|requests| requests.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    async fn submit(&self, request: &SubmissionRequest) -> Result<SubmissionResponse, TransportError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        let next = self.outcomes.lock().ok().and_then(|mut outcomes| outcomes.pop());
        next.unwrap_or_else(|| Ok(SubmissionResponse::ok(Value::Object(Map::new()))))
    }
}
