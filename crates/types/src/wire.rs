//! Submission payloads and server responses.
//!
//! Submissions are posted as `{"formset_data": <value>}`. The server answers with
//! status 200 (optionally carrying values to apply or a `success_url`) or with
//! status 422 and a body mapping dotted field paths to lists of error messages.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key wrapping the serialized tree.
pub const FORMSET_DATA_KEY: &str = "formset_data";

/// Key addressing the non-field error slot of a holder.
pub const HOLDER_ERRORS_KEY: &str = "__all__";

/// Key of a redirect instruction in a success response.
pub const SUCCESS_URL_KEY: &str = "success_url";

pub const STATUS_OK: u16 = 200;
pub const STATUS_UNPROCESSABLE: u16 = 422;

/// Dotted path → ordered error messages.
pub type ErrorMap = IndexMap<String, Vec<String>>;

/// Body of a submission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubmissionPayload {
    pub formset_data: Value,
}

/// HTTP verb used for a submission. Partial submissions use `PATCH`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum SubmissionMethod {
    Post,
    Patch,
}

impl SubmissionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionMethod::Post => "POST",
            SubmissionMethod::Patch => "PATCH",
        }
    }
}

/// A request the host must deliver to the endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubmissionRequest {
    pub method: SubmissionMethod,
    pub payload: SubmissionPayload,
}

/// Raw response as received from the endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubmissionResponse {
    pub status: u16,
    #[serde(default)]
    pub body: Value,
}

impl SubmissionResponse {
    pub fn ok(body: Value) -> Self {
        Self { status: STATUS_OK, body }
    }

    pub fn unprocessable(errors: &ErrorMap) -> Self {
        let body = errors
            .iter()
            .map(|(path, messages)| (path.clone(), Value::Array(messages.iter().cloned().map(Value::String).collect())))
            .collect::<Map<String, Value>>();
        Self {
            status: STATUS_UNPROCESSABLE,
            body: Value::Object(body),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_validation_failure(&self) -> bool {
        self.status == STATUS_UNPROCESSABLE
    }

    /// Redirect target carried by a success response.
    pub fn success_url(&self) -> Option<&str> {
        self.body.get(SUCCESS_URL_KEY).and_then(Value::as_str)
    }

    /// Errors carried by a 422 response, flattened to dotted paths.
    pub fn errors(&self) -> ErrorMap {
        flatten_error_body(&self.body)
    }
}

/// Flattens an error body into dotted path → messages.
///
/// Accepts a flat mapping (`{"contact.first_name": ["…"]}`) as well as a nested body
/// mirroring the tree (`{"contact": {"first_name": ["…"]}}` or lists per sibling).
/// A bare string is treated as a single message.
pub fn flatten_error_body(body: &Value) -> ErrorMap {
    let mut errors = ErrorMap::new();
    collect_errors(body, String::new(), &mut errors);
    errors
}

fn collect_errors(value: &Value, current_path: String, errors: &mut ErrorMap) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                collect_errors(nested, join_path(&current_path, key), errors);
            }
        }
        Value::Array(items) if items.iter().all(|item| item.is_string()) => {
            let messages = items.iter().filter_map(Value::as_str).map(str::to_string);
            errors.entry(current_path).or_default().extend(messages);
        }
        Value::Array(items) => {
            for (index, nested) in items.iter().enumerate() {
                collect_errors(nested, join_path(&current_path, &index.to_string()), errors);
            }
        }
        Value::String(message) => {
            errors.entry(current_path).or_default().push(message.clone());
        }
        _ => {}
    }
}

fn join_path(current_path: &str, key: &str) -> String {
    if current_path.is_empty() {
        key.to_string()
    } else {
        format!("{current_path}.{key}")
    }
}
