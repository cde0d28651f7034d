//! Declarative formset descriptions.
//!
//! A description is the tree shape a formset is mounted from: forms holding fields and
//! fieldsets, collections holding forms and nested collections, and steppers holding
//! ordered steps. Member maps use `IndexMap` so declaration order is the render order.
//!
//! Descriptions are usually authored in YAML:
//!
//! ```yaml
//! root:
//!   type: form
//!   members:
//!     customer:
//!       fieldset:
//!         legend: Customer
//!         hide_condition: no_customer
//!         members:
//!           name: { widget: text, max_length: 100 }
//!     no_customer: { widget: checkbox, required: false }
//! ```

pub mod validation;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

pub use validation::{ConstraintViolation, TextConstraints, validate_text};

/// Top-level document: an optional prefix namespace and the root node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormsetDescription {
    /// Namespace prepended to every path in the mounted tree.
    #[serde(default)]
    pub prefix: Option<String>,
    /// Root of the tree.
    pub root: NodeDescription,
}

/// A node of the holder tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeDescription {
    /// A single form owning fields and fieldsets.
    Form(FormDescription),
    /// A named grouping of forms and nested collections, optionally repeatable.
    Collection(CollectionDescription),
    /// A collection whose members are navigated one step at a time.
    Stepper(CollectionDescription),
}

/// Show/hide/disable conditions and induce expressions attached to a holder.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HolderConditions {
    #[serde(default)]
    pub show_condition: Option<String>,
    #[serde(default)]
    pub hide_condition: Option<String>,
    #[serde(default)]
    pub disable_condition: Option<String>,
    /// Activates the enclosing stepper step when it turns true.
    #[serde(default)]
    pub induce_activate: Option<String>,
    /// Opens the dialog when it turns true.
    #[serde(default)]
    pub induce_open: Option<String>,
    /// Closes the dialog when it turns true.
    #[serde(default)]
    pub induce_close: Option<String>,
}

/// Declares a form.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FormDescription {
    #[serde(default)]
    pub legend: Option<String>,
    #[serde(default)]
    pub help_text: Option<String>,
    #[serde(flatten)]
    pub conditions: HolderConditions,
    /// Present when the form is rendered inside a dialog.
    #[serde(default)]
    pub dialog: Option<DialogDescription>,
    /// Fields and fieldsets in render order.
    #[serde(default)]
    pub members: IndexMap<String, MemberDescription>,
}

/// Dialog presentation of a form.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DialogDescription {
    #[serde(default)]
    pub title: Option<String>,
    /// Modal dialogs block interaction with the rest of the page.
    #[serde(default)]
    pub modal: bool,
}

/// A member of a form or fieldset: either a nested fieldset or a field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MemberDescription {
    Fieldset { fieldset: FieldsetDescription },
    Field(FieldDescription),
}

/// Visual grouping of fields inside a form, with its own conditions.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FieldsetDescription {
    #[serde(default)]
    pub legend: Option<String>,
    #[serde(default)]
    pub help_text: Option<String>,
    #[serde(flatten)]
    pub conditions: HolderConditions,
    #[serde(default)]
    pub members: IndexMap<String, MemberDescription>,
}

/// Closed set of widgets a field can be rendered with.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WidgetKind {
    #[default]
    Text,
    Textarea,
    Email,
    Number,
    Checkbox,
    Select,
    Radio,
    SelectMultiple,
    Hidden,
    /// An Activator: a button rather than a data value.
    Button,
}

/// Visual variant of an Activator button.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ButtonVariant {
    #[default]
    Primary,
    Secondary,
    Success,
    Danger,
    Warning,
    Info,
}

/// One selectable option, either a bare value or a value with a label.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ChoiceOption {
    Plain(String),
    Labelled { value: String, label: String },
}

impl ChoiceOption {
    pub fn value(&self) -> &str {
        match self {
            ChoiceOption::Plain(value) => value,
            ChoiceOption::Labelled { value, .. } => value,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            ChoiceOption::Plain(value) => value,
            ChoiceOption::Labelled { label, .. } => label,
        }
    }
}

/// Declares a single field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FieldDescription {
    pub label: Option<String>,
    pub help_text: Option<String>,
    pub widget: WidgetKind,
    /// Fields are required unless declared otherwise.
    pub required: bool,
    pub initial: Option<JsonValue>,
    pub choices: Vec<ChoiceOption>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<String>,
    /// Overrides for the default error messages, keyed by rule
    /// (`required`, `invalid`, `min_length`, `max_length`, `invalid_choice`).
    pub error_messages: IndexMap<String, String>,
    pub show_condition: Option<String>,
    pub hide_condition: Option<String>,
    pub disable_condition: Option<String>,
    /// Makes the field required while the expression is true.
    pub require_condition: Option<String>,
    /// Action pipeline of an Activator, for example `submit -> proceed`.
    pub action: Option<String>,
    pub button_variant: Option<ButtonVariant>,
}

impl Default for FieldDescription {
    fn default() -> Self {
        Self {
            label: None,
            help_text: None,
            widget: WidgetKind::Text,
            required: true,
            initial: None,
            choices: Vec::new(),
            min_length: None,
            max_length: None,
            pattern: None,
            error_messages: IndexMap::new(),
            show_condition: None,
            hide_condition: None,
            disable_condition: None,
            require_condition: None,
            action: None,
            button_variant: None,
        }
    }
}

impl FieldDescription {
    pub fn text_constraints(&self) -> TextConstraints {
        TextConstraints {
            min_length: self.min_length,
            max_length: self.max_length,
            pattern: self.pattern.clone(),
        }
    }

    pub fn is_activator(&self) -> bool {
        self.widget == WidgetKind::Button
    }
}

/// Declares a collection or stepper.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CollectionDescription {
    #[serde(default)]
    pub legend: Option<String>,
    #[serde(default)]
    pub help_text: Option<String>,
    /// Label of the "add sibling" button.
    #[serde(default)]
    pub add_label: Option<String>,
    /// ORM relation used by server-side persistence; carried but not interpreted.
    #[serde(default)]
    pub related_field: Option<String>,
    #[serde(default)]
    pub min_siblings: Option<usize>,
    #[serde(default)]
    pub max_siblings: Option<usize>,
    #[serde(default)]
    pub extra_siblings: Option<usize>,
    /// Activates this collection when it is a step of a stepper.
    #[serde(default)]
    pub induce_activate: Option<String>,
    #[serde(default)]
    pub members: IndexMap<String, NodeDescription>,
}

impl CollectionDescription {
    /// Collections declaring any sibling attribute render as repeatable siblings.
    pub fn is_repeatable(&self) -> bool {
        self.min_siblings.is_some() || self.max_siblings.is_some() || self.extra_siblings.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn customer_form_deserializes_from_yaml() {
        let document = r#"
root:
  type: form
  members:
    customer:
      fieldset:
        legend: Customer
        hide_condition: no_customer
        members:
          name: { label: Recipient, max_length: 100 }
          phone_number: { required: false, pattern: '^\+?[ 0-9.\-]{4,25}$' }
    no_customer: { widget: checkbox, required: false }
"#;
        let description: FormsetDescription = serde_yaml::from_str(document).expect("parse description");
        let NodeDescription::Form(form) = description.root else {
            panic!("expected a form root");
        };
        let keys: Vec<&str> = form.members.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["customer", "no_customer"]);
        let MemberDescription::Fieldset { fieldset } = &form.members["customer"] else {
            panic!("expected a fieldset");
        };
        assert_eq!(fieldset.conditions.hide_condition.as_deref(), Some("no_customer"));
        let MemberDescription::Field(name) = &fieldset.members["name"] else {
            panic!("expected a field");
        };
        assert!(name.required);
        assert_eq!(name.max_length, Some(100));
        let MemberDescription::Field(flag) = &form.members["no_customer"] else {
            panic!("expected a field");
        };
        assert_eq!(flag.widget, WidgetKind::Checkbox);
        assert!(!flag.required);
    }

    #[test]
    fn collections_are_repeatable_only_with_sibling_attributes() {
        let document = r#"
root:
  type: collection
  members:
    coffee_order:
      type: collection
      min_siblings: 1
      extra_siblings: 1
      members:
        coffee:
          type: form
          members:
            nickname: {}
"#;
        let description: FormsetDescription = serde_yaml::from_str(document).expect("parse description");
        let NodeDescription::Collection(root) = &description.root else {
            panic!("expected a collection root");
        };
        assert!(!root.is_repeatable());
        let NodeDescription::Collection(orders) = &root.members["coffee_order"] else {
            panic!("expected nested collection");
        };
        assert!(orders.is_repeatable());
    }

    #[test]
    fn labelled_choices_expose_value_and_label() {
        let choices: Vec<ChoiceOption> =
            serde_json::from_str(r#"["vanilla", {"value": "cream", "label": "Irish Cream"}]"#).expect("parse choices");
        assert_eq!(choices[0].label(), "vanilla");
        assert_eq!(choices[1].value(), "cream");
        assert_eq!(choices[1].label(), "Irish Cream");
    }
}
