//! `df-*` markup attributes.
//!
//! Rendered forms carry their conditions as element attributes (`df-show`, `df-hide`,
//! `df-disable`, `df-require`, `df-induce-open`, `df-induce-close`, `df-induce-activate`).
//! This module reads such attribute lists back into conditions and renders conditions as
//! attributes.

use std::fmt::Write as _;

use formset_types::{FieldDescription, FieldPath, HolderConditions};
use serde::Serialize;

use crate::{
    condition::{InduceKind, Visibility, compile_optional},
    error::ConfigError,
    holder::{Holder, HolderMember},
    node::Node,
};

pub const ATTRIBUTE_PREFIX: &str = "df-";

const SHOW: &str = "df-show";
const HIDE: &str = "df-hide";
const DISABLE: &str = "df-disable";
const REQUIRE: &str = "df-require";
const INDUCE_OPEN: &str = "df-induce-open";
const INDUCE_CLOSE: &str = "df-induce-close";
const INDUCE_ACTIVATE: &str = "df-induce-activate";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MarkupError {
    #[error("unknown attribute '{0}'")]
    UnknownAttribute(String),
    #[error("attribute '{0}' given more than once")]
    DuplicateAttribute(String),
}

/// Conditions as carried by markup attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MarkupConditions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hide: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub induce_open: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub induce_close: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub induce_activate: Option<String>,
}

impl MarkupConditions {
    /// Reads `df-*` attributes from a name/value list. Other attributes are ignored.
    pub fn from_attributes<'a>(attributes: impl IntoIterator<Item = (&'a str, &'a str)>) -> Result<Self, MarkupError> {
        let mut conditions = Self::default();
        for (name, value) in attributes {
            if !name.starts_with(ATTRIBUTE_PREFIX) {
                continue;
            }
            let slot = conditions
                .slot_mut(name)
                .ok_or_else(|| MarkupError::UnknownAttribute(name.to_string()))?;
            if slot.is_some() {
                return Err(MarkupError::DuplicateAttribute(name.to_string()));
            }
            *slot = Some(value.to_string());
        }
        Ok(conditions)
    }

    fn slot_mut(&mut self, name: &str) -> Option<&mut Option<String>> {
        match name {
            SHOW => Some(&mut self.show),
            HIDE => Some(&mut self.hide),
            DISABLE => Some(&mut self.disable),
            REQUIRE => Some(&mut self.require),
            INDUCE_OPEN => Some(&mut self.induce_open),
            INDUCE_CLOSE => Some(&mut self.induce_close),
            INDUCE_ACTIVATE => Some(&mut self.induce_activate),
            _ => None,
        }
    }

    pub fn from_holder(conditions: &HolderConditions) -> Self {
        Self {
            show: conditions.show_condition.clone(),
            hide: conditions.hide_condition.clone(),
            disable: conditions.disable_condition.clone(),
            require: None,
            induce_open: conditions.induce_open.clone(),
            induce_close: conditions.induce_close.clone(),
            induce_activate: conditions.induce_activate.clone(),
        }
    }

    pub fn from_field(description: &FieldDescription) -> Self {
        Self {
            show: description.show_condition.clone(),
            hide: description.hide_condition.clone(),
            disable: description.disable_condition.clone(),
            require: description.require_condition.clone(),
            ..Self::default()
        }
    }

    /// Holder conditions carried by these attributes. `df-require` has no holder
    /// counterpart and is dropped.
    pub fn to_holder_conditions(&self) -> HolderConditions {
        HolderConditions {
            show_condition: self.show.clone(),
            hide_condition: self.hide.clone(),
            disable_condition: self.disable.clone(),
            induce_activate: self.induce_activate.clone(),
            induce_open: self.induce_open.clone(),
            induce_close: self.induce_close.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Attribute name/value pairs in canonical order.
    pub fn to_attributes(&self) -> Vec<(&'static str, &str)> {
        [
            (SHOW, &self.show),
            (HIDE, &self.hide),
            (DISABLE, &self.disable),
            (REQUIRE, &self.require),
            (INDUCE_OPEN, &self.induce_open),
            (INDUCE_CLOSE, &self.induce_close),
            (INDUCE_ACTIVATE, &self.induce_activate),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.as_deref().map(|value| (name, value)))
        .collect()
    }

    /// Renders the attributes as an HTML attribute string.
    pub fn render(&self) -> String {
        let mut rendered = String::new();
        for (name, value) in self.to_attributes() {
            if !rendered.is_empty() {
                rendered.push(' ');
            }
            let _ = write!(rendered, "{name}=\"{}\"", escape_attribute(value));
        }
        rendered
    }

    /// Checks that every expression parses and show/hide are not combined.
    pub fn compile(&self, path: &FieldPath) -> Result<(), ConfigError> {
        Visibility::compile(path, self.show.as_deref(), self.hide.as_deref())?;
        compile_optional(path, "disable", self.disable.as_deref())?;
        compile_optional(path, "require", self.require.as_deref())?;
        compile_optional(path, InduceKind::Open.attribute(), self.induce_open.as_deref())?;
        compile_optional(path, InduceKind::Close.attribute(), self.induce_close.as_deref())?;
        compile_optional(path, InduceKind::Activate.attribute(), self.induce_activate.as_deref())?;
        Ok(())
    }
}

fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for character in value.chars() {
        match character {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Markup of every node, holder and field in the tree carrying at least one condition,
/// in render order.
pub fn collect_markup(root: &Node) -> Vec<(FieldPath, MarkupConditions)> {
    let mut markup = Vec::new();
    collect_node(root, &mut markup);
    markup
}

fn collect_node(node: &Node, markup: &mut Vec<(FieldPath, MarkupConditions)>) {
    match node {
        Node::Form(holder) => collect_holder(holder, markup),
        _ => {
            if let Some(collection) = node.as_collection() {
                let conditions = MarkupConditions {
                    induce_activate: collection.description().induce_activate.clone(),
                    ..MarkupConditions::default()
                };
                push_unless_empty(node.path(), conditions, markup);
            }
            for child in node.children() {
                collect_node(child, markup);
            }
        }
    }
}

fn collect_holder(holder: &Holder, markup: &mut Vec<(FieldPath, MarkupConditions)>) {
    push_unless_empty(holder.path(), MarkupConditions::from_holder(holder.conditions()), markup);
    for member in holder.members().values() {
        match member {
            HolderMember::Field(field) => push_unless_empty(field.path(), MarkupConditions::from_field(field.description()), markup),
            HolderMember::Fieldset(fieldset) => collect_holder(fieldset, markup),
        }
    }
}

fn push_unless_empty(path: &FieldPath, conditions: MarkupConditions, markup: &mut Vec<(FieldPath, MarkupConditions)>) {
    if !conditions.is_empty() {
        markup.push((path.clone(), conditions));
    }
}
