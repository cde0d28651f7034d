//! Stepper collections.
//!
//! A stepper reinterprets the members of a collection as ordered steps with exactly one
//! current step. Steps become visited once reached through successful validation, and
//! navigation may never skip past the first unvisited step.

use formset_types::{CollectionDescription, FieldPath};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{debug, info};

use crate::{
    collection::FormCollection,
    error::{ConfigError, Rejection},
    holder::Placement,
    node::Node,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepState {
    pub name: String,
    pub visited: bool,
}

/// Result of an accepted navigation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The requested step already is the current one.
    Unchanged,
    Moved { from: usize, to: usize },
    /// Validation of an intermediate step failed; the current step is kept.
    Blocked(Vec<(FieldPath, Vec<String>)>),
}

#[derive(Debug, Clone)]
pub struct StepperCollection {
    collection: FormCollection,
    steps: Vec<StepState>,
    current: usize,
}

impl StepperCollection {
    pub(crate) fn build(
        path: FieldPath,
        description: &CollectionDescription,
        initial: Option<&JsonValue>,
        placement: Placement,
    ) -> Result<Self, ConfigError> {
        if description.is_repeatable() || placement.within_repeatable {
            return Err(ConfigError::RepeatableStepper { path });
        }
        if description.members.is_empty() {
            return Err(ConfigError::EmptyStepper { path });
        }
        let collection = FormCollection::build(path, description, initial, placement, true)?;
        let steps = description
            .members
            .keys()
            .enumerate()
            .map(|(index, name)| StepState {
                name: name.clone(),
                visited: index == 0,
            })
            .collect();
        Ok(Self {
            collection,
            steps,
            current: 0,
        })
    }

    pub fn collection(&self) -> &FormCollection {
        &self.collection
    }

    pub(crate) fn collection_mut(&mut self) -> &mut FormCollection {
        &mut self.collection
    }

    pub fn path(&self) -> &FieldPath {
        self.collection.path()
    }

    pub fn steps(&self) -> &[StepState] {
        &self.steps
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn current_step(&self) -> Option<&Node> {
        self.step(self.current)
    }

    /// Index of the furthest visited step.
    pub fn highest_visited(&self) -> usize {
        self.steps.iter().rposition(|step| step.visited).unwrap_or(0)
    }

    pub fn step(&self, index: usize) -> Option<&Node> {
        self.collection.members()?.get_index(index).map(|(_, node)| node)
    }

    fn step_mut(&mut self, index: usize) -> Option<&mut Node> {
        self.collection.members_mut()?.get_index_mut(index).map(|(_, node)| node)
    }

    /// Index of the step containing `path`.
    pub fn step_index_of(&self, path: &FieldPath) -> Option<usize> {
        self.collection
            .members()?
            .values()
            .position(|node| path.starts_with(node.path()))
    }

    /// Navigates to step `index`.
    ///
    /// Allowed only up to one step past the furthest visited step. Revisiting needs no
    /// validation; reaching the first unvisited step validates every step from the
    /// current one up to the target first.
    pub fn activate(&mut self, index: usize) -> Result<StepOutcome, Rejection> {
        if index >= self.steps.len() {
            return Err(Rejection::StepOutOfRange {
                path: self.path().clone(),
                index,
            });
        }
        if index == self.current {
            return Ok(StepOutcome::Unchanged);
        }
        if index > self.highest_visited() + 1 {
            debug!(path = %self.path(), index, highest_visited = self.highest_visited(), "step not reachable");
            return Err(Rejection::StepNotReachable {
                path: self.path().clone(),
                index,
            });
        }

        let from = self.current;
        if !self.steps[index].visited {
            let mut failures = Vec::new();
            let mut valid = true;
            for step in from..index {
                if let Some(node) = self.step_mut(step) {
                    valid &= node.validate(&mut failures);
                }
            }
            if !valid {
                debug!(path = %self.path(), from, to = index, errors = failures.len(), "step advance blocked by validation");
                return Ok(StepOutcome::Blocked(failures));
            }
            self.steps[index].visited = true;
        }
        self.current = index;
        info!(path = %self.path(), from, to = index, step = %self.steps[index].name, "step activated");
        Ok(StepOutcome::Moved { from, to: index })
    }

    /// Marks steps visited whose predecessors are all visited and valid with their
    /// current data, as when a stepper is mounted with prefilled values.
    pub(crate) fn mark_prefilled(&mut self) {
        for index in 1..self.steps.len() {
            let previous_valid = self.steps[index - 1].visited && self.step(index - 1).is_some_and(Node::is_valid);
            if !previous_valid {
                break;
            }
            self.steps[index].visited = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::snapshot::ValueSnapshot;
    use serde_json::json;

    const CHECKOUT: &str = r#"
members:
  contact:
    type: form
    members:
      first_name: {}
      last_name: {}
  shipping:
    type: form
    members:
      street: {}
  payment:
    type: form
    members:
      card_owner: {}
"#;

    fn checkout(initial: Option<JsonValue>) -> StepperCollection {
        let description: CollectionDescription = serde_yaml::from_str(CHECKOUT).expect("description");
        let stepper = StepperCollection::build(FieldPath::root(), &description, initial.as_ref(), Placement::default()).expect("build");
        let mut node = Node::Stepper(stepper);
        let mut snapshot = ValueSnapshot::default();
        node.record_values(&mut snapshot);
        node.refresh(&snapshot);
        let Node::Stepper(stepper) = node else {
            unreachable!("built as a stepper");
        };
        stepper
    }

    #[test]
    fn skipping_ahead_is_rejected() {
        let mut stepper = checkout(None);
        assert_eq!(stepper.current(), 0);
        assert!(matches!(stepper.activate(2), Err(Rejection::StepNotReachable { index: 2, .. })));
        assert!(matches!(stepper.activate(7), Err(Rejection::StepOutOfRange { index: 7, .. })));
        assert_eq!(stepper.activate(0), Ok(StepOutcome::Unchanged));
    }

    #[test]
    fn advancing_requires_a_valid_current_step() {
        let mut stepper = checkout(None);
        let StepOutcome::Blocked(failures) = stepper.activate(1).expect("accepted request") else {
            panic!("expected validation to block");
        };
        let failed: Vec<String> = failures.iter().map(|(path, _)| path.to_string()).collect();
        assert_eq!(failed, vec!["contact.first_name", "contact.last_name"]);
        assert_eq!(stepper.current(), 0);
        assert!(!stepper.steps()[1].visited);
    }

    #[test]
    fn visited_steps_can_be_revisited_without_validation() {
        let mut stepper = checkout(Some(json!({"contact": {"first_name": "Ada", "last_name": "Lovelace"}})));
        assert_eq!(stepper.activate(1), Ok(StepOutcome::Moved { from: 0, to: 1 }));
        assert_eq!(stepper.highest_visited(), 1);
        assert_eq!(stepper.activate(0), Ok(StepOutcome::Moved { from: 1, to: 0 }));
        assert_eq!(stepper.activate(1), Ok(StepOutcome::Moved { from: 0, to: 1 }));
        assert!(matches!(stepper.activate(2), Ok(StepOutcome::Blocked(_))));
    }

    #[test]
    fn prefilled_steps_are_marked_visited() {
        let mut stepper = checkout(Some(json!({
            "contact": {"first_name": "Ada", "last_name": "Lovelace"},
            "shipping": {"street": "Main Street"}
        })));
        stepper.mark_prefilled();
        let visited: Vec<bool> = stepper.steps().iter().map(|step| step.visited).collect();
        assert_eq!(visited, vec![true, true, true]);
        assert_eq!(stepper.current(), 0);
        assert_eq!(stepper.step_index_of(&FieldPath::parse("payment.card_owner")), Some(2));
    }

    #[test]
    fn repeatable_stepper_is_a_configuration_error() {
        let description: CollectionDescription = serde_yaml::from_str("{ min_siblings: 1, members: { a: { type: form } } }").expect("description");
        let error = StepperCollection::build(FieldPath::root(), &description, None, Placement::default()).expect_err("must fail");
        assert!(matches!(error, ConfigError::RepeatableStepper { .. }));

        let description: CollectionDescription = serde_yaml::from_str("{ members: { a: { type: form } } }").expect("description");
        let nested = Placement {
            within_repeatable: true,
            ..Placement::default()
        };
        assert!(StepperCollection::build(FieldPath::parse("orders.0.wizard"), &description, None, nested).is_err());
    }
}
