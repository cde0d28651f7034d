//! What a mutation cycle produced, in a shape hosts can render or serialize.

use formset_types::{
    ErrorMap, FieldPath, SubmissionRequest,
    wire::{STATUS_OK, STATUS_UNPROCESSABLE},
};
use serde::Serialize;

use crate::condition::InduceEvent;

/// Outcome of a validation pass.
///
/// Keys are dotted paths relative to the tree root, the same keys a 422 response uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub status: u16,
    pub errors: ErrorMap,
}

impl ValidationReport {
    pub(crate) fn from_failures(root: &FieldPath, failures: Vec<(FieldPath, Vec<String>)>) -> Self {
        let mut errors = ErrorMap::new();
        for (path, messages) in failures {
            let key = path.strip_prefix(root).unwrap_or(path);
            errors.entry(key.to_string()).or_default().extend(messages);
        }
        let status = if errors.is_empty() { STATUS_OK } else { STATUS_UNPROCESSABLE };
        Self { status, errors }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Something the host has to carry out on behalf of the tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum Effect {
    /// Deliver this request and hand the outcome to `complete_submission`.
    Submit { request: SubmissionRequest },
    Redirect { url: String },
}

/// Everything that happened while handling one user event.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CycleReport {
    /// Inducers that fired, in firing order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub induced: Vec<InduceEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub effects: Vec<Effect>,
    /// Transport failure or unexpected response status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    /// Index of the sibling created by `add_sibling`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sibling: Option<usize>,
}

impl CycleReport {
    /// The submission the cycle suspended on, if any.
    pub fn pending_submission(&self) -> Option<&SubmissionRequest> {
        self.effects.iter().rev().find_map(|effect| match effect {
            Effect::Submit { request } => Some(request),
            Effect::Redirect { .. } => None,
        })
    }

    pub fn redirect(&self) -> Option<&str> {
        self.effects.iter().rev().find_map(|effect| match effect {
            Effect::Redirect { url } => Some(url.as_str()),
            Effect::Submit { .. } => None,
        })
    }

    /// Folds a later cycle of the same user event into this one.
    pub fn merge(&mut self, later: CycleReport) {
        self.induced.extend(later.induced);
        if later.validation.is_some() {
            self.validation = later.validation;
        }
        self.effects.extend(later.effects);
        if later.failure.is_some() {
            self.failure = later.failure;
        }
        if later.sibling.is_some() {
            self.sibling = later.sibling;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_are_keyed_relative_to_the_root() {
        let root = FieldPath::parse("checkout");
        let report = ValidationReport::from_failures(
            &root,
            vec![
                (FieldPath::parse("checkout.contact.first_name"), vec!["This field is required.".into()]),
                (FieldPath::parse("checkout.contact.last_name"), vec!["This field is required.".into()]),
            ],
        );
        assert_eq!(report.status, STATUS_UNPROCESSABLE);
        assert_eq!(report.errors.keys().collect::<Vec<_>>(), vec!["contact.first_name", "contact.last_name"]);
    }

    #[test]
    fn empty_report_is_ok() {
        let report = ValidationReport::from_failures(&FieldPath::root(), Vec::new());
        assert!(report.is_valid());
        assert_eq!(report.status, STATUS_OK);
    }
}
