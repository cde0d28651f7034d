//! Field values.
//!
//! Widgets store one of three shapes of value. Conversion to and from JSON follows
//! conventional HTML form encoding: checked checkboxes become `"on"`, unchecked ones `""`.

use serde_json::Value;

/// Wire representation of a checked checkbox.
pub const CHECKED: &str = "on";

/// The current value of a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Free text, numbers as typed, single choices.
    Text(String),
    /// Checkbox state.
    Flag(bool),
    /// Multiple selected choices, in selection order.
    Many(Vec<String>),
}

impl Default for FieldValue {
    fn default() -> Self {
        FieldValue::Text(String::new())
    }
}

impl FieldValue {
    /// Empty text, unchecked boxes and empty selections are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            FieldValue::Text(text) => !text.is_empty(),
            FieldValue::Flag(flag) => *flag,
            FieldValue::Many(items) => !items.is_empty(),
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.is_truthy()
    }

    /// Blank value of the same shape.
    pub fn blank(&self) -> FieldValue {
        match self {
            FieldValue::Text(_) => FieldValue::Text(String::new()),
            FieldValue::Flag(_) => FieldValue::Flag(false),
            FieldValue::Many(_) => FieldValue::Many(Vec::new()),
        }
    }

    /// Text as it would be submitted by a browser.
    pub fn as_text(&self) -> String {
        match self {
            FieldValue::Text(text) => text.clone(),
            FieldValue::Flag(true) => CHECKED.to_string(),
            FieldValue::Flag(false) => String::new(),
            FieldValue::Many(items) => items.join(","),
        }
    }

    /// Compares against a literal taken from a condition expression.
    ///
    /// Multi-selects match when the literal is one of the selected items.
    pub fn matches_text(&self, literal: &str) -> bool {
        match self {
            FieldValue::Text(text) => text == literal,
            FieldValue::Flag(flag) => match literal {
                "true" | CHECKED => *flag,
                "false" | "" => !*flag,
                _ => false,
            },
            FieldValue::Many(items) => items.iter().any(|item| item == literal),
        }
    }

    pub fn to_wire(&self) -> Value {
        match self {
            FieldValue::Many(items) => Value::Array(items.iter().cloned().map(Value::String).collect()),
            other => Value::String(other.as_text()),
        }
    }

    /// Shape-agnostic conversion from JSON. Widgets apply their own coercion on top.
    pub fn from_json(value: &Value) -> FieldValue {
        match value {
            Value::Null => FieldValue::Text(String::new()),
            Value::Bool(flag) => FieldValue::Flag(*flag),
            Value::String(text) => FieldValue::Text(text.clone()),
            Value::Number(number) => FieldValue::Text(number.to_string()),
            Value::Array(items) => FieldValue::Many(items.iter().map(json_scalar_text).collect()),
            Value::Object(_) => FieldValue::Text(value.to_string()),
        }
    }
}

/// Renders a scalar JSON value the way it would appear in an input element.
pub fn json_scalar_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
