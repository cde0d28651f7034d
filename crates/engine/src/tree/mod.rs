//! The mounted collection tree and its root controller.
//!
//! [`FormsetTree`] owns every node of one mounted formset. All mutations go through it:
//! after each one the tree re-derives hidden/disabled/required flags, sweeps induce
//! expressions once, and hands back a [`CycleReport`] describing what happened.
//!
//! Submissions are cooperative: a click whose pipeline reaches `submit` suspends with an
//! [`Effect::Submit`]. The tree then stays read-only until the host delivers the outcome
//! through [`FormsetTree::complete_submission`].

mod induce;
mod initial;
mod pipeline;
pub(crate) mod snapshot;

use formset_types::{
    ErrorMap, FieldPath, FieldValue, FormsetDescription, SubmissionPayload,
    wire::{HOLDER_ERRORS_KEY, STATUS_UNPROCESSABLE},
};
use indexmap::IndexMap;
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, info};

use crate::{
    error::{ConfigError, Rejection},
    field::Field,
    holder::Placement,
    node::Node,
    report::{CycleReport, ValidationReport},
    stepper::{StepOutcome, StepperCollection},
};

pub(crate) use pipeline::PendingSubmission;
use snapshot::ValueSnapshot;

/// Scope of a validation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationMode {
    /// Every holder of the tree.
    Full,
    /// Only the node at the given path.
    Partial(FieldPath),
}

/// The Activator firing in the current cycle and its resolved `activate(...)` arguments.
#[derive(Debug, Clone)]
pub(crate) struct ActiveActivator {
    pub path: FieldPath,
    pub args: Vec<String>,
}

#[derive(Debug)]
pub struct FormsetTree {
    prefix: Option<String>,
    root: Node,
    active: Option<ActiveActivator>,
    in_flight: Option<PendingSubmission>,
    /// Body of the last successful response, read by `^key` references.
    response_values: Map<String, JsonValue>,
    /// Server errors no field or holder claimed.
    non_field_errors: Vec<String>,
}

impl FormsetTree {
    /// Mounts a description with optional initial data.
    ///
    /// Initial data mirrors the tree as nested objects (arrays for repeatable collections);
    /// dotted keys such as `"customer.name"` are accepted as well.
    pub fn mount(description: &FormsetDescription, initial: Option<&JsonValue>) -> Result<Self, ConfigError> {
        let root_path = description
            .prefix
            .as_deref()
            .map(FieldPath::parse)
            .unwrap_or_else(FieldPath::root);
        let initial = initial.map(initial::expand_dotted_keys);
        let root = Node::build(root_path, &description.root, initial.as_ref(), Placement::default())?;

        let mut tree = Self {
            prefix: description.prefix.clone(),
            root,
            active: None,
            in_flight: None,
            response_values: Map::new(),
            non_field_errors: Vec::new(),
        };
        tree.refresh();
        tree.root.for_each_stepper_mut(&mut |stepper| stepper.mark_prefilled());
        // Prime the latches so conditions already true at mount do not fire.
        tree.sweep(false);
        info!(
            prefix = tree.prefix.as_deref().unwrap_or_default(),
            fields = tree.root.fields().len(),
            "formset mounted"
        );
        Ok(tree)
    }

    /// Tears the tree down. A pending submission is abandoned.
    pub fn unmount(self) {
        if let Some(pending) = &self.in_flight {
            debug!(activator = %pending.activator, "unmounting with a submission in flight");
        }
        info!(prefix = self.prefix.as_deref().unwrap_or_default(), "formset unmounted");
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn root_path(&self) -> &FieldPath {
        self.root.path()
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Resolves a root-relative dotted path to an absolute one.
    pub fn path(&self, dotted: &str) -> FieldPath {
        self.root_path().extend(&FieldPath::parse(dotted))
    }

    pub fn node(&self, path: &FieldPath) -> Option<&Node> {
        self.root.node(path)
    }

    pub fn field(&self, path: &FieldPath) -> Option<&Field> {
        self.root.field(path)
    }

    pub fn value(&self, path: &FieldPath) -> Option<&FieldValue> {
        self.field(path).map(Field::value)
    }

    pub fn stepper(&self, path: &FieldPath) -> Option<&StepperCollection> {
        self.root.node(path)?.as_stepper()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn response_values(&self) -> &Map<String, JsonValue> {
        &self.response_values
    }

    pub fn non_field_errors(&self) -> &[String] {
        &self.non_field_errors
    }

    fn ensure_idle(&self) -> Result<(), Rejection> {
        if self.is_busy() {
            debug!("rejected: submission in flight");
            return Err(Rejection::Busy);
        }
        Ok(())
    }

    /// Sets the value of a data field and re-evaluates everything depending on it.
    pub fn set_value(&mut self, path: &FieldPath, value: FieldValue) -> Result<CycleReport, Rejection> {
        self.ensure_idle()?;
        let field = self.root.field_mut(path).ok_or_else(|| Rejection::UnknownPath(path.clone()))?;
        if field.is_activator() {
            return Err(Rejection::NotAValueField(path.clone()));
        }
        if field.is_hidden() {
            return Err(Rejection::Hidden(path.clone()));
        }
        if field.is_disabled() {
            return Err(Rejection::Disabled(path.clone()));
        }
        field.set_value(value);
        debug!(path = %path, value = %field.value().as_text(), "value changed");
        self.root.touch(path);

        let mut report = CycleReport::default();
        self.settle(&mut report);
        Ok(report)
    }

    /// Adds a sibling to the repeatable collection at `path`, after sibling `after` or at
    /// the end.
    pub fn add_sibling(&mut self, path: &FieldPath, after: Option<usize>) -> Result<CycleReport, Rejection> {
        self.ensure_idle()?;
        let collection = match self.root.node_mut(path) {
            Some(Node::Collection(collection)) => collection,
            Some(_) => return Err(Rejection::NotACollection(path.clone())),
            None => return Err(Rejection::UnknownPath(path.clone())),
        };
        let index = collection.add_sibling(after).inspect_err(|rejection| debug!(%rejection, "add_sibling rejected"))?;

        let mut report = CycleReport {
            sibling: Some(index),
            ..CycleReport::default()
        };
        self.settle(&mut report);
        Ok(report)
    }

    pub fn remove_sibling(&mut self, path: &FieldPath, index: usize) -> Result<CycleReport, Rejection> {
        self.ensure_idle()?;
        let collection = match self.root.node_mut(path) {
            Some(Node::Collection(collection)) => collection,
            Some(_) => return Err(Rejection::NotACollection(path.clone())),
            None => return Err(Rejection::UnknownPath(path.clone())),
        };
        collection
            .remove_sibling(index)
            .inspect_err(|rejection| debug!(%rejection, "remove_sibling rejected"))?;

        let mut report = CycleReport::default();
        self.settle(&mut report);
        Ok(report)
    }

    /// Navigates the stepper at `path` to step `index`.
    ///
    /// A blocked advance is not a rejection: it is reported through
    /// [`CycleReport::validation`] with the current step kept.
    pub fn activate_step(&mut self, path: &FieldPath, index: usize) -> Result<CycleReport, Rejection> {
        self.ensure_idle()?;
        let mut report = CycleReport::default();
        self.navigate(path, index, &mut report)
            .inspect_err(|rejection| debug!(%rejection, "step navigation rejected"))?;
        self.settle(&mut report);
        Ok(report)
    }

    /// Runs stepper navigation. `Ok(false)` means validation blocked the move.
    fn navigate(&mut self, path: &FieldPath, index: usize, report: &mut CycleReport) -> Result<bool, Rejection> {
        let root_path = self.root_path().clone();
        let Some(node) = self.root.node_mut(path) else {
            return Err(Rejection::UnknownPath(path.clone()));
        };
        let Node::Stepper(stepper) = node else {
            return Err(Rejection::NotAStepper(path.clone()));
        };
        match stepper.activate(index)? {
            StepOutcome::Unchanged | StepOutcome::Moved { .. } => Ok(true),
            StepOutcome::Blocked(failures) => {
                report.validation = Some(ValidationReport::from_failures(&root_path, failures));
                Ok(false)
            }
        }
    }

    /// Runs a validation pass, recording errors on the fields it visits.
    pub fn validate(&mut self, mode: ValidationMode) -> ValidationReport {
        let root_path = self.root_path().clone();
        let mut failures = Vec::new();
        match &mode {
            ValidationMode::Full => {
                self.root.validate(&mut failures);
            }
            ValidationMode::Partial(scope) => match self.root.node_mut(scope) {
                Some(node) => {
                    node.validate(&mut failures);
                }
                None => {
                    if let Some(holder) = self.root.holder_mut(scope) {
                        holder.validate(&mut failures);
                    }
                }
            },
        }
        let report = ValidationReport::from_failures(&root_path, failures);
        if report.is_valid() && mode == ValidationMode::Full {
            self.non_field_errors.clear();
        }
        debug!(?mode, errors = report.errors.len(), "validation pass");
        report
    }

    pub fn is_valid(&self) -> bool {
        self.root.is_valid()
    }

    /// Values of every visible, enabled data field, keyed by absolute path.
    pub fn collect_data(&self) -> IndexMap<FieldPath, FieldValue> {
        let mut data = IndexMap::new();
        self.root.collect_data(&mut data);
        data
    }

    /// Payload of a full submission.
    pub fn submission_payload(&self) -> SubmissionPayload {
        SubmissionPayload {
            formset_data: self.root.wire_data(),
        }
    }

    /// Payload of a partial submission of the node at `scope`, wrapped in the objects
    /// leading to it from the root.
    pub fn partial_payload(&self, scope: &FieldPath) -> SubmissionPayload {
        let data = match self.root.node(scope) {
            Some(node) => node.wire_data(),
            None => JsonValue::Object(Map::new()),
        };
        let relative = scope.strip_prefix(self.root_path()).unwrap_or_default();
        let formset_data = relative.segments().iter().rev().fold(data, |inner, segment| {
            let mut wrapper = Map::new();
            wrapper.insert(segment.clone(), inner);
            JsonValue::Object(wrapper)
        });
        SubmissionPayload { formset_data }
    }

    /// Routes server errors to fields and holders.
    ///
    /// Keys are root-relative dotted paths. A key naming a holder, or ending in `__all__`,
    /// fills that holder's error slot; keys nothing claims become non-field errors.
    pub fn apply_errors(&mut self, errors: &ErrorMap) {
        for (key, messages) in errors {
            let mut path = self.path(key);
            if path.last() == Some(HOLDER_ERRORS_KEY) {
                path = path.parent().unwrap_or_default();
            }
            if !self.root.apply_errors(&path, messages) {
                debug!(key = %key, "unclaimed server errors");
                self.non_field_errors.extend(messages.iter().cloned());
            }
        }
    }

    /// Restores every form to its mount-time values and clears all errors. Rejected while a
    /// submission is in flight.
    pub fn reset(&mut self) -> Result<CycleReport, Rejection> {
        self.ensure_idle()?;
        self.restore();
        Ok(CycleReport::default())
    }

    fn restore(&mut self) {
        self.root.reset();
        self.root.clear_errors();
        self.non_field_errors.clear();
        self.refresh();
        self.sweep(false);
        debug!("formset reset");
    }

    fn snapshot(&self) -> ValueSnapshot {
        let mut snapshot = ValueSnapshot::with_active(self.active.as_ref().map(|active| active.path.clone()));
        self.root.record_values(&mut snapshot);
        snapshot
    }

    /// Recomputes derived flags from current values.
    fn refresh(&mut self) {
        let snapshot = self.snapshot();
        self.root.refresh(&snapshot);
    }

    pub(crate) fn unprocessable(errors: ErrorMap) -> ValidationReport {
        ValidationReport {
            status: STATUS_UNPROCESSABLE,
            errors,
        }
    }
}
