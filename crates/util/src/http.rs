//! # HTTP Transport
//!
//! Delivers submissions to the form endpoint with `reqwest`. Full submissions are sent as
//! `POST`, partial ones as `PATCH`, both with a JSON body of the form
//! `{"formset_data": ...}` and the CSRF token in the `X-CSRFToken` header.

use std::time::Duration;

use anyhow::{Context, Result};
use formset_engine::{Transport, TransportError};
use formset_types::{SubmissionMethod, SubmissionRequest, SubmissionResponse};
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::{ClientConfig, redact_sensitive};

pub const CSRF_HEADER: &str = "X-CSRFToken";

const PREVIEW_LIMIT: usize = 200;

pub struct HttpTransport {
    client: Client,
    endpoint: Url,
    csrf_token: Option<String>,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(endpoint: Url, csrf_token: Option<String>, timeout: Duration) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .default_headers(default_headers)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            endpoint,
            csrf_token,
            timeout,
        })
    }

    /// Builds a transport from client configuration. Fails when no endpoint is configured.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let endpoint = config
            .endpoint_url()?
            .ok_or(TransportError::MissingEndpoint)
            .context("Set FORMSET_ENDPOINT or add 'endpoint' to the config file")?;
        Self::new(endpoint, config.csrf_token.clone(), config.timeout())
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn request_error(&self, error: reqwest::Error) -> TransportError {
        if error.is_timeout() {
            return TransportError::Timeout {
                seconds: self.timeout.as_secs(),
            };
        }
        TransportError::Request(redact_sensitive(&error.to_string()))
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn submit(&self, request: &SubmissionRequest) -> Result<SubmissionResponse, TransportError> {
        let method = match request.method {
            SubmissionMethod::Post => Method::POST,
            SubmissionMethod::Patch => Method::PATCH,
        };
        let mut builder = self.client.request(method, self.endpoint.clone()).json(&request.payload);
        if let Some(token) = self.csrf_token.as_deref() {
            builder = builder.header(CSRF_HEADER, token);
        }
        debug!(method = request.method.as_str(), endpoint = %self.endpoint, "sending submission");

        let response = builder.send().await.map_err(|error| self.request_error(error))?;
        let status = response.status();
        let text = response.text().await.map_err(|error| self.request_error(error))?;
        let body = if text.trim().is_empty() { Value::Null } else { parse_body(&text, status)? };
        debug!(status = status.as_u16(), "submission answered");
        Ok(SubmissionResponse {
            status: status.as_u16(),
            body,
        })
    }
}

fn parse_body(text: &str, status: StatusCode) -> Result<Value, TransportError> {
    serde_json::from_str(text).map_err(|error| {
        warn!(status = status.as_u16(), error = %error, "submission response is not JSON");
        TransportError::InvalidBody {
            message: format!("status {status}: {error}"),
            preview: body_preview(text),
        }
    })
}

/// Body text on a single line, cut after `PREVIEW_LIMIT` characters.
fn body_preview(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return "<empty>".to_string();
    }
    match collapsed.char_indices().nth(PREVIEW_LIMIT) {
        Some((cut, _)) => format!("{}...", &collapsed[..cut]),
        None => collapsed,
    }
}
