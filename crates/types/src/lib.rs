//! Shared type definitions for the formset runtime.
//!
//! The engine, the HTTP transport, and the CLI all speak in terms of the types defined here:
//!
//! - [`FieldPath`]: dotted addresses of fields and holders inside a mounted tree
//! - [`FieldValue`]: the closed set of values a field can hold
//! - [`description`]: the declarative tree shape a formset is mounted from
//! - [`wire`]: submission payloads and server responses

pub mod description;
pub mod path;
pub mod value;
pub mod wire;

pub use description::{
    ButtonVariant, ChoiceOption, CollectionDescription, ConstraintViolation, DialogDescription, FieldDescription, FieldsetDescription,
    FormDescription, FormsetDescription, HolderConditions, MemberDescription, NodeDescription, TextConstraints, WidgetKind,
    validate_text,
};
pub use path::FieldPath;
pub use value::FieldValue;
pub use wire::{ErrorMap, SubmissionMethod, SubmissionPayload, SubmissionRequest, SubmissionResponse};
