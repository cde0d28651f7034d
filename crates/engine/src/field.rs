//! Field value binding.
//!
//! A [`Field`] wraps one declared input: its typed value, validation state, and the
//! conditions deciding whether it is currently hidden, disabled, or required. Activators
//! are fields too; they carry an action pipeline instead of a data value.

use formset_types::{
    ButtonVariant, ChoiceOption, ConstraintViolation, FieldDescription, FieldPath, FieldValue, TextConstraints, WidgetKind,
    validate_text,
};
use indexmap::IndexMap;
use regex::Regex;
use serde_json::Value as JsonValue;

use crate::{
    action::ActionPipeline,
    condition::{Visibility, compile_optional},
    error::ConfigError,
    expression::{Expression, PathResolver},
};

pub const REQUIRED_MESSAGE: &str = "This field is required.";
const NUMBER_MESSAGE: &str = "Enter a number.";
const EMAIL_MESSAGE: &str = "Enter a valid email address.";

/// Validation outcome of a single field.
pub type ValidationResult = Result<(), Vec<String>>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ValidationState {
    #[default]
    Untouched,
    Valid,
    Invalid(Vec<String>),
}

/// Button state of an Activator.
#[derive(Debug, Clone)]
pub struct Activator {
    pub pipeline: ActionPipeline,
    pub variant: ButtonVariant,
    /// Set by the `disable` action, cleared by `enable`.
    pub self_disabled: bool,
}

#[derive(Debug, Clone)]
struct FieldRules {
    constraints: TextConstraints,
    pattern: Option<Regex>,
    choices: Vec<ChoiceOption>,
    error_messages: IndexMap<String, String>,
}

#[derive(Debug, Clone, Default)]
struct FieldConditions {
    visibility: Visibility,
    disable: Option<Expression>,
    require: Option<Expression>,
}

#[derive(Debug, Clone)]
pub struct Field {
    name: String,
    path: FieldPath,
    description: FieldDescription,
    widget: WidgetKind,
    /// Value at mount time, restored by `reset`.
    initial: FieldValue,
    value: FieldValue,
    state: ValidationState,
    rules: FieldRules,
    conditions: FieldConditions,
    activator: Option<Activator>,
    hidden: bool,
    disabled: bool,
    required_now: bool,
}

impl Field {
    /// Builds a field at `path` from its declaration and optional initial value.
    pub fn build(path: FieldPath, description: &FieldDescription, initial: Option<&JsonValue>) -> Result<Self, ConfigError> {
        let name = path.last().unwrap_or_default().to_string();
        let conditions = FieldConditions {
            visibility: Visibility::compile(
                &path,
                description.show_condition.as_deref(),
                description.hide_condition.as_deref(),
            )?,
            disable: compile_optional(&path, "disable", description.disable_condition.as_deref())?,
            require: compile_optional(&path, "require", description.require_condition.as_deref())?,
        };
        let constraints = description.text_constraints();
        let pattern = constraints.compile_pattern().map_err(|source| ConfigError::InvalidPattern {
            path: path.clone(),
            source,
        })?;
        let activator = if description.is_activator() {
            let pipeline = match description.action.as_deref() {
                Some(action) => ActionPipeline::parse(action).map_err(|source| ConfigError::InvalidAction {
                    path: path.clone(),
                    source,
                })?,
                None => ActionPipeline::default(),
            };
            Some(Activator {
                pipeline,
                variant: description.button_variant.unwrap_or_default(),
                self_disabled: false,
            })
        } else {
            None
        };

        let widget = description.widget;
        let declared_initial = description.initial.as_ref();
        let initial_value = coerce(widget, initial.or(declared_initial).map(FieldValue::from_json).unwrap_or_default());

        Ok(Self {
            name,
            path,
            widget,
            initial: initial_value.clone(),
            value: initial_value,
            state: ValidationState::Untouched,
            rules: FieldRules {
                constraints,
                pattern,
                choices: description.choices.clone(),
                error_messages: description.error_messages.clone(),
            },
            conditions,
            activator,
            hidden: false,
            disabled: false,
            required_now: description.required && !description.is_activator(),
            description: description.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    pub(crate) fn set_path(&mut self, path: FieldPath) {
        self.path = path;
    }

    pub fn label(&self) -> Option<&str> {
        self.description.label.as_deref()
    }

    pub fn help_text(&self) -> Option<&str> {
        self.description.help_text.as_deref()
    }

    pub fn widget(&self) -> WidgetKind {
        self.widget
    }

    pub fn description(&self) -> &FieldDescription {
        &self.description
    }

    pub fn value(&self) -> &FieldValue {
        &self.value
    }

    pub fn state(&self) -> &ValidationState {
        &self.state
    }

    pub fn errors(&self) -> &[String] {
        match &self.state {
            ValidationState::Invalid(messages) => messages,
            _ => &[],
        }
    }

    pub fn activator(&self) -> Option<&Activator> {
        self.activator.as_ref()
    }

    pub(crate) fn activator_mut(&mut self) -> Option<&mut Activator> {
        self.activator.as_mut()
    }

    pub fn is_activator(&self) -> bool {
        self.activator.is_some()
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn is_required(&self) -> bool {
        self.required_now
    }

    /// Whether the field currently contributes to validation and `collect_data`.
    pub fn is_operable(&self) -> bool {
        !self.hidden && !self.disabled && !self.is_activator()
    }

    /// Stores a new value coerced to the widget's shape.
    ///
    /// A field showing errors is revalidated so fixed input clears them immediately.
    pub fn set_value(&mut self, value: FieldValue) {
        self.value = coerce(self.widget, value);
        if matches!(self.state, ValidationState::Invalid(_)) {
            let _ = self.validate();
        }
    }

    pub fn validate(&mut self) -> ValidationResult {
        let outcome = self.check();
        self.state = match &outcome {
            Ok(()) => ValidationState::Valid,
            Err(messages) => ValidationState::Invalid(messages.clone()),
        };
        outcome
    }

    /// Validates without recording the outcome.
    pub fn check(&self) -> ValidationResult {
        if self.is_activator() {
            return Ok(());
        }
        if self.value.is_empty() {
            return if self.required_now {
                Err(vec![self.message_for_key("required", REQUIRED_MESSAGE)])
            } else {
                Ok(())
            };
        }
        self.check_widget().map_err(|violation| vec![self.message_for(&violation)])
    }

    fn check_widget(&self) -> Result<(), ConstraintViolation> {
        match (&self.widget, &self.value) {
            (WidgetKind::Checkbox, _) => Ok(()),
            (WidgetKind::Select | WidgetKind::Radio, FieldValue::Text(choice)) => self.check_choice(choice),
            (WidgetKind::SelectMultiple, FieldValue::Many(choices)) => choices.iter().try_for_each(|choice| self.check_choice(choice)),
            (WidgetKind::Number, FieldValue::Text(text)) => {
                text.trim().parse::<f64>().map_err(|_| ConstraintViolation::Invalid)?;
                validate_text(text, &self.rules.constraints, self.rules.pattern.as_ref())
            }
            (WidgetKind::Email, FieldValue::Text(text)) => {
                validate_text(text, &self.rules.constraints, self.rules.pattern.as_ref())?;
                if looks_like_email(text) { Ok(()) } else { Err(ConstraintViolation::Invalid) }
            }
            (_, value) => validate_text(&value.as_text(), &self.rules.constraints, self.rules.pattern.as_ref()),
        }
    }

    fn check_choice(&self, choice: &str) -> Result<(), ConstraintViolation> {
        if self.rules.choices.is_empty() || self.rules.choices.iter().any(|option| option.value() == choice) {
            Ok(())
        } else {
            Err(ConstraintViolation::InvalidChoice(choice.to_string()))
        }
    }

    fn message_for(&self, violation: &ConstraintViolation) -> String {
        let default = match (violation, self.widget) {
            (ConstraintViolation::Invalid, WidgetKind::Number) => NUMBER_MESSAGE.to_string(),
            (ConstraintViolation::Invalid, WidgetKind::Email) => EMAIL_MESSAGE.to_string(),
            _ => violation.default_message(),
        };
        self.message_for_key(violation.message_key(), &default)
    }

    fn message_for_key(&self, key: &str, default: &str) -> String {
        self.rules.error_messages.get(key).cloned().unwrap_or_else(|| default.to_string())
    }

    /// Replaces the error state with messages received from elsewhere, e.g. the server.
    pub fn set_errors(&mut self, messages: Vec<String>) {
        self.state = if messages.is_empty() {
            ValidationState::Valid
        } else {
            ValidationState::Invalid(messages)
        };
    }

    pub fn clear_errors(&mut self) {
        self.state = ValidationState::Untouched;
    }

    /// Restores the value the field was mounted with.
    pub fn reset(&mut self) {
        self.value = self.initial.clone();
        self.state = ValidationState::Untouched;
    }

    /// Value as sent over the wire. Hidden fields send a blank placeholder.
    pub fn wire_value(&self) -> JsonValue {
        if self.hidden { self.value.blank().to_wire() } else { self.value.to_wire() }
    }

    /// Recomputes the derived hidden/disabled/required flags.
    pub(crate) fn refresh(&mut self, scope: &FieldPath, resolver: &dyn PathResolver, holder_hidden: bool, holder_disabled: bool) {
        self.hidden = holder_hidden || self.conditions.visibility.is_hidden(scope, resolver);
        let disabled_by_condition = self
            .conditions
            .disable
            .as_ref()
            .is_some_and(|expression| expression.evaluate(scope, resolver));
        let self_disabled = self.activator.as_ref().is_some_and(|activator| activator.self_disabled);
        self.disabled = holder_disabled || disabled_by_condition || self_disabled;
        self.required_now = !self.is_activator()
            && match &self.conditions.require {
                Some(expression) => expression.evaluate(scope, resolver),
                None => self.description.required,
            };
    }
}

/// Coerces a raw value into the shape the widget stores.
pub fn coerce(widget: WidgetKind, value: FieldValue) -> FieldValue {
    match (widget, value) {
        (WidgetKind::Checkbox, FieldValue::Text(text)) => {
            let text = text.trim().to_ascii_lowercase();
            FieldValue::Flag(!text.is_empty() && text != "false" && text != "off" && text != "0")
        }
        (WidgetKind::Checkbox, FieldValue::Many(items)) => FieldValue::Flag(!items.is_empty()),
        (WidgetKind::SelectMultiple, FieldValue::Text(text)) if text.is_empty() => FieldValue::Many(Vec::new()),
        (WidgetKind::SelectMultiple, FieldValue::Text(text)) => FieldValue::Many(vec![text]),
        (WidgetKind::SelectMultiple, FieldValue::Flag(_)) => FieldValue::Many(Vec::new()),
        (WidgetKind::Checkbox, flag @ FieldValue::Flag(_)) | (WidgetKind::SelectMultiple, flag @ FieldValue::Many(_)) => flag,
        (WidgetKind::Button, _) => FieldValue::Text(String::new()),
        (_, FieldValue::Text(text)) => FieldValue::Text(text),
        (_, other) => FieldValue::Text(other.as_text()),
    }
}

fn looks_like_email(text: &str) -> bool {
    let Some((local, domain)) = text.rsplit_once('@') else {
        return false;
    };
    !local.is_empty()
        && !local.contains(char::is_whitespace)
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && domain.contains('.')
        && !domain.contains(char::is_whitespace)
}
