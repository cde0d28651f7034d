//! Error types surfaced by the engine.
//!
//! [`ConfigError`] is raised while mounting a description and is fatal for that tree.
//! [`Rejection`] reports a user operation the tree refused without changing state.

use formset_types::FieldPath;
use thiserror::Error;

use crate::{action::ActionError, expression::ExpressionError};

/// A description that cannot be mounted.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("'{path}' declares both a show and a hide condition")]
    ConflictingVisibility { path: FieldPath },

    #[error("stepper '{path}' cannot be repeatable")]
    RepeatableStepper { path: FieldPath },

    #[error("stepper '{path}' has no steps")]
    EmptyStepper { path: FieldPath },

    #[error("invalid {attribute} expression on '{path}': {source}")]
    InvalidExpression {
        path: FieldPath,
        attribute: &'static str,
        #[source]
        source: ExpressionError,
    },

    #[error("invalid action on '{path}': {source}")]
    InvalidAction {
        path: FieldPath,
        #[source]
        source: ActionError,
    },

    #[error("invalid pattern on '{path}': {source}")]
    InvalidPattern {
        path: FieldPath,
        #[source]
        source: regex::Error,
    },

    #[error("member name '{name}' under '{parent}' must be a non-numeric identifier")]
    InvalidMemberName { parent: FieldPath, name: String },

    #[error("collection '{path}' has min_siblings {min} greater than max_siblings {max}")]
    SiblingBounds { path: FieldPath, min: usize, max: usize },

    #[error("'{path}' declares {attribute} but is not a step of a stepper")]
    MisplacedInducer { path: FieldPath, attribute: &'static str },
}

/// A user operation the tree refused. State is unchanged when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("a submission is in flight")]
    Busy,

    #[error("no field, activator or collection at '{0}'")]
    UnknownPath(FieldPath),

    #[error("'{0}' is not an activator")]
    NotAnActivator(FieldPath),

    #[error("'{0}' is an activator and holds no value")]
    NotAValueField(FieldPath),

    #[error("'{0}' is not a collection")]
    NotACollection(FieldPath),

    #[error("'{0}' is disabled")]
    Disabled(FieldPath),

    #[error("'{0}' is hidden")]
    Hidden(FieldPath),

    #[error("collection '{0}' is not repeatable")]
    NotRepeatable(FieldPath),

    #[error("collection '{path}' already holds the maximum of {max} siblings")]
    MaxSiblingsReached { path: FieldPath, max: usize },

    #[error("collection '{path}' must keep at least {min} siblings")]
    MinSiblingsReached { path: FieldPath, min: usize },

    #[error("collection '{path}' has no sibling {index}")]
    SiblingOutOfRange { path: FieldPath, index: usize },

    #[error("'{0}' is not a stepper")]
    NotAStepper(FieldPath),

    #[error("stepper '{path}' has no step {index}")]
    StepOutOfRange { path: FieldPath, index: usize },

    #[error("step {index} of '{path}' is not reachable yet")]
    StepNotReachable { path: FieldPath, index: usize },

    #[error("no submission is pending")]
    NoSubmissionPending,
}
