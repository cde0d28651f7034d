//! # Formset Engine
//!
//! Headless runtime for nested, dynamically-behaved forms. A declarative description is
//! mounted into a [`FormsetTree`]: forms holding fields and fieldsets, collections with
//! repeatable siblings, and steppers navigating their members one step at a time. The tree
//! keeps values, validation state and show/hide/disable flags in sync with the conditions
//! declared on every holder, fires induce expressions, runs Activator pipelines and
//! produces submission payloads.
//!
//! ## Usage
//!
//! ```rust
//! use formset_engine::{FormsetTree, parse_description_str};
//! use formset_types::FieldValue;
//!
//! let description = parse_description_str(r#"
//! root:
//!   type: form
//!   members:
//!     name: { max_length: 100 }
//!     subscribe: { widget: checkbox, required: false }
//! "#)?;
//! let mut tree = FormsetTree::mount(&description, None)?;
//! tree.set_value(&tree.path("name"), FieldValue::Text("Ada".into()))?;
//! assert_eq!(tree.submission_payload().formset_data["name"], "Ada");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! - **`expression`**: parser and evaluator of condition expressions
//! - **`action`**: Activator pipelines such as `submit -> proceed`
//! - **`field`**, **`holder`**: value binding, forms and fieldsets
//! - **`collection`**, **`stepper`**, **`node`**: the shapes a tree is built from
//! - **`tree`**: the root controller owning a mounted tree
//! - **`controller`**, **`transport`**: async delivery of submissions
//! - **`markup`**: `df-*` attribute reading and rendering

use std::{fs, path::Path};

use anyhow::{Context, Result};
use formset_types::{FieldPath, FormsetDescription};

pub mod action;
pub mod collection;
pub mod condition;
pub mod controller;
pub mod error;
pub mod expression;
pub mod field;
pub mod holder;
pub mod markup;
pub mod node;
pub mod report;
pub mod stepper;
mod syntax;
pub mod transport;
pub mod tree;

pub use action::{ActionCall, ActionPipeline};
pub use collection::FormCollection;
pub use condition::{InduceEvent, InduceKind};
pub use controller::{FormEvent, FormsetController};
pub use error::{ConfigError, Rejection};
pub use expression::Expression;
pub use field::{Field, ValidationState};
pub use holder::{CloseMode, Holder, HolderKind};
pub use markup::{MarkupConditions, collect_markup};
pub use node::Node;
pub use report::{CycleReport, Effect, ValidationReport};
pub use stepper::{StepOutcome, StepperCollection};
pub use transport::{OfflineTransport, ScriptedTransport, Transport, TransportError};
pub use tree::{FormsetTree, ValidationMode};

/// Checks a member name: a non-empty identifier that is not purely numeric, since numeric
/// segments address siblings.
pub(crate) fn validate_member_name(parent: &FieldPath, name: &str) -> Result<(), ConfigError> {
    if syntax::is_identifier(name) && !name.chars().all(|character| character.is_ascii_digit()) {
        return Ok(());
    }
    Err(ConfigError::InvalidMemberName {
        parent: parent.clone(),
        name: name.to_string(),
    })
}

/// Loads a description file. JSON is accepted as well since YAML is a superset of it.
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not match the description format.
pub fn parse_description_file(file_path: impl AsRef<Path>) -> Result<FormsetDescription> {
    let file_path = file_path.as_ref();
    let content = fs::read_to_string(file_path).with_context(|| format!("Failed to read description file: {}", file_path.display()))?;
    parse_description_str(&content).with_context(|| format!("Invalid description in {}", file_path.display()))
}

pub fn parse_description_str(content: &str) -> Result<FormsetDescription> {
    serde_yaml::from_str(content).context("Unsupported description document. Expected a 'root' node with 'type: form | collection | stepper'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_description_file_reads_yaml_and_json() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let yaml_path = temp_dir.path().join("customer.yaml");
        fs::write(&yaml_path, "root:\n  type: form\n  members:\n    name: {}\n").expect("write yaml");
        let json_path = temp_dir.path().join("customer.json");
        fs::write(&json_path, r#"{"prefix": "customer", "root": {"type": "form", "members": {"name": {}}}}"#).expect("write json");

        let from_yaml = parse_description_file(&yaml_path).expect("yaml description");
        let from_json = parse_description_file(&json_path).expect("json description");
        assert_eq!(from_yaml.root, from_json.root);
        assert_eq!(from_json.prefix.as_deref(), Some("customer"));
    }

    #[test]
    fn parse_description_file_reports_the_path() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("broken.yaml");
        fs::write(&path, "root: { type: wizard }").expect("write");
        let error = parse_description_file(&path).expect_err("must fail");
        assert!(format!("{error:#}").contains("broken.yaml"));
    }

    #[test]
    fn numeric_member_names_are_refused() {
        assert!(validate_member_name(&FieldPath::root(), "customer").is_ok());
        assert!(validate_member_name(&FieldPath::root(), "0").is_err());
        assert!(validate_member_name(&FieldPath::root(), "first name").is_err());
    }
}
