//! Activator pipelines and the submission round trip.

use formset_types::{FieldPath, FieldValue, SubmissionMethod, SubmissionRequest, SubmissionResponse, wire::SUCCESS_URL_KEY};
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use crate::{
    action::{ActionArg, ActionCall},
    error::Rejection,
    expression::PathReference,
    node::Node,
    report::{CycleReport, Effect},
    transport::TransportError,
};

use super::{ActiveActivator, FormsetTree, ValidationMode};

/// A pipeline suspended on a submission.
#[derive(Debug, Clone)]
pub(crate) struct PendingSubmission {
    pub activator: FieldPath,
    pub method: SubmissionMethod,
    /// Calls still to run once the submission succeeds.
    pub remaining: Vec<ActionCall>,
    pub reject_chain: Vec<ActionCall>,
}

enum ChainOutcome {
    Completed,
    /// Waiting for a submission response.
    Suspended,
    Failed,
}

impl FormsetTree {
    /// Clicks the Activator at `path`, running its pipeline until it completes, fails or
    /// suspends on a submission.
    pub fn click(&mut self, path: &FieldPath) -> Result<CycleReport, Rejection> {
        self.ensure_idle()?;
        let field = self.root.field(path).ok_or_else(|| Rejection::UnknownPath(path.clone()))?;
        let Some(activator) = field.activator() else {
            return Err(Rejection::NotAnActivator(path.clone()));
        };
        if field.is_hidden() {
            return Err(Rejection::Hidden(path.clone()));
        }
        if field.is_disabled() {
            return Err(Rejection::Disabled(path.clone()));
        }
        let pipeline = activator.pipeline.clone();
        info!(path = %path, "activator clicked");

        let mut report = CycleReport::default();
        self.run(path, &pipeline.success_chain, &pipeline.reject_chain, &mut report);
        Ok(report)
    }

    /// Applies the outcome of the pending submission and resumes the suspended pipeline.
    ///
    /// A 2xx response stores its body as response values and continues with the calls
    /// after `submit`. A 422 response routes its errors into the tree. Any other status and
    /// transport errors leave the tree unchanged. The latter two run the reject chain.
    pub fn complete_submission(&mut self, outcome: Result<SubmissionResponse, TransportError>) -> Result<CycleReport, Rejection> {
        let pending = self.in_flight.take().ok_or(Rejection::NoSubmissionPending)?;
        let mut report = CycleReport::default();
        match outcome {
            Ok(response) if response.is_success() => {
                info!(activator = %pending.activator, status = response.status, method = pending.method.as_str(), "submission accepted");
                self.response_values = match response.body {
                    JsonValue::Object(body) => body,
                    _ => Default::default(),
                };
                self.non_field_errors.clear();
                self.run(&pending.activator, &pending.remaining, &pending.reject_chain, &mut report);
            }
            Ok(response) if response.is_validation_failure() => {
                let errors = response.errors();
                info!(activator = %pending.activator, errors = errors.len(), "submission rejected by validation");
                self.apply_errors(&errors);
                report.validation = Some(Self::unprocessable(errors));
                self.run_chain(&pending.activator, &pending.reject_chain, &[], &mut report);
            }
            Ok(response) => {
                warn!(activator = %pending.activator, status = response.status, "unexpected submission response");
                report.failure = Some(format!("unexpected response status {}", response.status));
                self.run_chain(&pending.activator, &pending.reject_chain, &[], &mut report);
            }
            Err(error) => {
                warn!(activator = %pending.activator, error = %error, "submission failed");
                report.failure = Some(error.to_string());
                self.run_chain(&pending.activator, &pending.reject_chain, &[], &mut report);
            }
        }
        Ok(report)
    }

    fn run(&mut self, activator: &FieldPath, chain: &[ActionCall], reject_chain: &[ActionCall], report: &mut CycleReport) {
        if let ChainOutcome::Failed = self.run_chain(activator, chain, reject_chain, report)
            && !reject_chain.is_empty()
        {
            debug!(activator = %activator, "running reject chain");
            self.run_chain(activator, reject_chain, &[], report);
        }
    }

    fn run_chain(&mut self, activator: &FieldPath, chain: &[ActionCall], reject_chain: &[ActionCall], report: &mut CycleReport) -> ChainOutcome {
        for (position, call) in chain.iter().enumerate() {
            let succeeded = match call {
                ActionCall::Activate(arguments) => {
                    let args = arguments.iter().map(|argument| self.argument_text(activator, argument)).collect();
                    self.active = Some(ActiveActivator {
                        path: activator.clone(),
                        args,
                    });
                    self.settle(report)
                }
                ActionCall::Submit | ActionCall::SubmitPartial => {
                    let remaining = &chain[position + 1..];
                    return self.begin_submission(activator, call, remaining, reject_chain, report);
                }
                ActionCall::SetFieldValue { target, source } => {
                    let value = self.argument_value(activator, source);
                    self.assign(activator, target, value, report)
                }
                ActionCall::DeleteValue(target) => {
                    let blank = self
                        .resolve_field(activator, target)
                        .and_then(|path| self.root.field(&path))
                        .map(|field| field.value().blank());
                    match blank {
                        Some(blank) => self.assign(activator, target, Some(blank), report),
                        None => false,
                    }
                }
                ActionCall::Reset => {
                    self.restore();
                    true
                }
                ActionCall::Disable | ActionCall::Enable => {
                    let disable = matches!(call, ActionCall::Disable);
                    if let Some(state) = self.root.field_mut(activator).and_then(|field| field.activator_mut()) {
                        state.self_disabled = disable;
                    }
                    self.settle(report)
                }
                ActionCall::Proceed(url) => {
                    let url = url.clone().or_else(|| {
                        self.response_values
                            .get(SUCCESS_URL_KEY)
                            .and_then(JsonValue::as_str)
                            .map(str::to_string)
                    });
                    match url {
                        Some(url) => {
                            info!(activator = %activator, url = %url, "proceeding");
                            report.effects.push(Effect::Redirect { url });
                            true
                        }
                        None => {
                            debug!(activator = %activator, "proceed without a target url");
                            false
                        }
                    }
                }
                ActionCall::ClearErrors => {
                    self.root.clear_errors();
                    self.non_field_errors.clear();
                    true
                }
                ActionCall::Noop => true,
            };
            if !succeeded {
                debug!(activator = %activator, call = call.name(), "pipeline step failed");
                return ChainOutcome::Failed;
            }
        }
        ChainOutcome::Completed
    }

    fn begin_submission(
        &mut self,
        activator: &FieldPath,
        call: &ActionCall,
        remaining: &[ActionCall],
        reject_chain: &[ActionCall],
        report: &mut CycleReport,
    ) -> ChainOutcome {
        let (mode, method) = match call {
            ActionCall::SubmitPartial => (ValidationMode::Partial(self.partial_scope(activator)), SubmissionMethod::Patch),
            _ => (ValidationMode::Full, SubmissionMethod::Post),
        };
        let validation = self.validate(mode.clone());
        if !validation.is_valid() {
            debug!(activator = %activator, errors = validation.errors.len(), "submission blocked by validation");
            report.validation = Some(validation);
            return ChainOutcome::Failed;
        }
        let payload = match &mode {
            ValidationMode::Full => self.submission_payload(),
            ValidationMode::Partial(scope) => self.partial_payload(scope),
        };
        info!(activator = %activator, method = method.as_str(), "submission started");
        report.effects.push(Effect::Submit {
            request: SubmissionRequest { method, payload },
        });
        self.in_flight = Some(PendingSubmission {
            activator: activator.clone(),
            method,
            remaining: remaining.to_vec(),
            reject_chain: reject_chain.to_vec(),
        });
        ChainOutcome::Suspended
    }

    /// The form owning the Activator, the unit of a partial submission.
    fn partial_scope(&self, activator: &FieldPath) -> FieldPath {
        self.root
            .lineage(activator)
            .into_iter()
            .rev()
            .find(|node| matches!(node, Node::Form(_)))
            .map(|node| node.path().clone())
            .unwrap_or_else(|| self.root_path().clone())
    }

    /// First candidate of `reference` naming a data field, seen from the Activator's holder.
    fn resolve_field(&self, activator: &FieldPath, reference: &PathReference) -> Option<FieldPath> {
        let scope = activator.parent().unwrap_or_default();
        reference
            .candidates(&scope)
            .into_iter()
            .find(|candidate| self.root.field(candidate).is_some_and(|field| !field.is_activator()))
    }

    fn argument_value(&self, activator: &FieldPath, argument: &ActionArg) -> Option<FieldValue> {
        match argument {
            ActionArg::Text(text) | ActionArg::Number(text) => Some(FieldValue::Text(text.clone())),
            ActionArg::Bool(flag) => Some(FieldValue::Flag(*flag)),
            ActionArg::Path(reference) => {
                let path = self.resolve_field(activator, reference)?;
                self.root.field(&path).map(|field| field.value().clone())
            }
            ActionArg::ResponseValue(key) => self.response_values.get(key).map(FieldValue::from_json),
        }
    }

    fn argument_text(&self, activator: &FieldPath, argument: &ActionArg) -> String {
        self.argument_value(activator, argument)
            .map(|value| value.as_text())
            .unwrap_or_default()
    }

    /// Writes `value` into the field `target` resolves to and settles the tree.
    fn assign(&mut self, activator: &FieldPath, target: &PathReference, value: Option<FieldValue>, report: &mut CycleReport) -> bool {
        let (Some(path), Some(value)) = (self.resolve_field(activator, target), value) else {
            debug!(activator = %activator, target = %target, "unresolved value assignment");
            return false;
        };
        if let Some(field) = self.root.field_mut(&path) {
            field.set_value(value);
        }
        self.root.touch(&path);
        debug!(path = %path, "value assigned by action");
        self.settle(report)
    }
}
