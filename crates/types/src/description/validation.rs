//! Text constraint checks shared by the engine and description tooling.
//!
//! These routines enforce the declarative length and pattern rules attached to a field.
//! Required-ness and choice membership depend on the widget and are checked by the engine.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Length and pattern rules for text-like widgets.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TextConstraints {
    #[serde(default)]
    pub min_length: Option<usize>,
    #[serde(default)]
    pub max_length: Option<usize>,
    #[serde(default)]
    pub pattern: Option<String>,
}

impl TextConstraints {
    pub fn is_empty(&self) -> bool {
        self.min_length.is_none() && self.max_length.is_none() && self.pattern.is_none()
    }

    /// Compiles the pattern, if any.
    pub fn compile_pattern(&self) -> Result<Option<Regex>, regex::Error> {
        self.pattern.as_deref().map(Regex::new).transpose()
    }
}

/// A broken constraint, keyed the same way as `error_messages` overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintViolation {
    MinLength(usize),
    MaxLength(usize),
    Pattern,
    Invalid,
    InvalidChoice(String),
}

impl ConstraintViolation {
    /// Key used to look up a custom message.
    pub fn message_key(&self) -> &'static str {
        match self {
            ConstraintViolation::MinLength(_) => "min_length",
            ConstraintViolation::MaxLength(_) => "max_length",
            ConstraintViolation::Pattern | ConstraintViolation::Invalid => "invalid",
            ConstraintViolation::InvalidChoice(_) => "invalid_choice",
        }
    }

    pub fn default_message(&self) -> String {
        match self {
            ConstraintViolation::MinLength(length) => format!("Ensure this value has at least {length} characters."),
            ConstraintViolation::MaxLength(length) => format!("Ensure this value has at most {length} characters."),
            ConstraintViolation::Pattern | ConstraintViolation::Invalid => "Enter a valid value.".to_string(),
            ConstraintViolation::InvalidChoice(choice) => {
                format!("Select a valid choice. {choice} is not one of the available choices.")
            }
        }
    }
}

/// Validates non-empty text against length rules and an already compiled pattern.
///
/// Empty text always passes; required-ness is decided by the caller.
pub fn validate_text(text: &str, constraints: &TextConstraints, pattern: Option<&Regex>) -> Result<(), ConstraintViolation> {
    if text.is_empty() {
        return Ok(());
    }

    let length = text.chars().count();
    if let Some(min_length) = constraints.min_length
        && length < min_length
    {
        return Err(ConstraintViolation::MinLength(min_length));
    }

    if let Some(max_length) = constraints.max_length
        && length > max_length
    {
        return Err(ConstraintViolation::MaxLength(max_length));
    }

    if let Some(regex) = pattern
        && !regex.is_match(text)
    {
        return Err(ConstraintViolation::Pattern);
    }

    Ok(())
}
