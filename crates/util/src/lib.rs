//! Host-side helpers for the formset runtime: client configuration, the HTTP transport
//! and log redaction.

use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::Regex;

pub mod config;
pub mod http;

pub use config::{ClientConfig, ClientConfigError};
pub use http::HttpTransport;

static SENSITIVE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)(authorization: )([\w\-\.=:/+]+)",
        r"(?i)(x-csrftoken: )([^\s]+)",
        r"(?i)([A-Z0-9_]*?(KEY|TOKEN|SECRET|PASSWORD)=)([^\s]+)",
        r#"(?i)("csrf_token"\s*:\s*")([^"]*)"#,
    ]
    .into_iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// Redacts values that look like secrets in a string.
pub fn redact_sensitive(input: &str) -> String {
    let mut redacted = input.to_string();
    for pattern in SENSITIVE_PATTERNS.iter() {
        redacted = pattern
            .replace_all(&redacted, |caps: &regex::Captures| {
                let prefix = caps.get(1).map(|m| m.as_str()).unwrap_or("");
                format!("{prefix}<redacted>")
            })
            .to_string();
    }
    redacted
}

/// Expands a leading `~` to the home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs_next::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csrf_tokens_are_redacted_from_headers_and_env_lines() {
        assert_eq!(redact_sensitive("X-CSRFToken: abc123"), "X-CSRFToken: <redacted>");
        assert_eq!(redact_sensitive("FORMSET_CSRF_TOKEN=abc123 other"), "FORMSET_CSRF_TOKEN=<redacted> other");
        assert_eq!(redact_sensitive(r#"{"csrf_token": "abc123"}"#), r#"{"csrf_token": "<redacted>"}"#);
    }

    #[test]
    fn plain_text_is_untouched() {
        assert_eq!(redact_sensitive("POST http://localhost:8000/form/"), "POST http://localhost:8000/form/");
    }

    #[test]
    fn tilde_paths_resolve_under_home() {
        let expanded = expand_tilde("~/formset/config.json");
        assert!(expanded.ends_with("formset/config.json"));
        assert_eq!(expand_tilde("/etc/formset.json"), PathBuf::from("/etc/formset.json"));
    }
}
