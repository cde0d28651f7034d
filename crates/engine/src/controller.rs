//! Async driver pairing a mounted tree with a [`Transport`].

use formset_types::FieldValue;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::{error::Rejection, report::CycleReport, transport::Transport, tree::FormsetTree};

/// A user event addressed by root-relative dotted paths.
///
/// This is also the step format of replay scripts, read with [`FormEvent::parse_script`]:
///
/// ```yaml
/// - set: { path: customer.name, value: John Doe }
/// - click: { path: submit }
/// - add: { collection: coffee_order }
/// - step: { stepper: "", index: 1 }
/// - reset
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormEvent {
    Set {
        path: String,
        value: JsonValue,
    },
    Click {
        path: String,
    },
    Add {
        collection: String,
        #[serde(default)]
        after: Option<usize>,
    },
    Remove {
        collection: String,
        index: usize,
    },
    Step {
        stepper: String,
        index: usize,
    },
    Reset,
}

impl FormEvent {
    /// Parses a YAML replay script. Events are written as single-key maps (`- set: {..}`)
    /// or, for `reset`, a bare name.
    pub fn parse_script(content: &str) -> Result<Vec<FormEvent>, serde_yaml::Error> {
        serde_yaml::with::singleton_map_recursive::deserialize(serde_yaml::Deserializer::from_str(content))
    }
}

/// Owns a tree and a transport and runs every event to completion, awaiting each
/// submission the event's pipeline produces.
pub struct FormsetController<T: Transport> {
    tree: FormsetTree,
    transport: T,
}

impl<T: Transport> FormsetController<T> {
    pub fn new(tree: FormsetTree, transport: T) -> Self {
        Self { tree, transport }
    }

    pub fn tree(&self) -> &FormsetTree {
        &self.tree
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn dispatch(&mut self, event: &FormEvent) -> Result<CycleReport, Rejection> {
        let tree = &mut self.tree;
        let mut report = match event {
            FormEvent::Set { path, value } => tree.set_value(&tree.path(path), FieldValue::from_json(value))?,
            FormEvent::Click { path } => tree.click(&tree.path(path))?,
            FormEvent::Add { collection, after } => tree.add_sibling(&tree.path(collection), *after)?,
            FormEvent::Remove { collection, index } => tree.remove_sibling(&tree.path(collection), *index)?,
            FormEvent::Step { stepper, index } => tree.activate_step(&tree.path(stepper), *index)?,
            FormEvent::Reset => tree.reset()?,
        };
        self.drain(&mut report).await?;
        Ok(report)
    }

    /// Delivers pending submissions until the pipeline no longer suspends.
    async fn drain(&mut self, report: &mut CycleReport) -> Result<(), Rejection> {
        let mut request = report.pending_submission().cloned();
        while self.tree.is_busy()
            && let Some(current) = request.take()
        {
            debug!(method = current.method.as_str(), "delivering submission");
            let outcome = self.transport.submit(&current).await;
            let resumed = self.tree.complete_submission(outcome)?;
            request = resumed.pending_submission().cloned();
            report.merge(resumed);
        }
        Ok(())
    }

    /// Tears the tree down.
    pub fn unmount(self) {
        self.tree.unmount();
    }
}

#[cfg(test)]
mod tests {
    use formset_types::{ErrorMap, SubmissionMethod, SubmissionResponse};
    use serde_json::json;

    use super::*;
    use crate::{parse_description_str, transport::ScriptedTransport};

    const SIGNUP: &str = r#"
root:
  type: form
  members:
    email: { widget: email }
    join:
      widget: button
      action: submit -> proceed
"#;

    fn controller(outcomes: Vec<Result<SubmissionResponse, crate::TransportError>>) -> FormsetController<ScriptedTransport> {
        let description = parse_description_str(SIGNUP).expect("description");
        let tree = FormsetTree::mount(&description, None).expect("mount");
        FormsetController::new(tree, ScriptedTransport::new(outcomes))
    }

    #[tokio::test]
    async fn dispatch_delivers_submissions_and_resumes_the_pipeline() {
        let mut controller = controller(vec![Ok(SubmissionResponse::ok(json!({"success_url": "/welcome"})))]);
        controller
            .dispatch(&FormEvent::Set {
                path: "email".into(),
                value: json!("ada@example.com"),
            })
            .await
            .expect("set");
        let report = controller.dispatch(&FormEvent::Click { path: "join".into() }).await.expect("click");

        assert_eq!(report.redirect(), Some("/welcome"));
        assert!(!controller.tree().is_busy());
        let requests = controller.transport().requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, SubmissionMethod::Post);
        assert_eq!(requests[0].payload.formset_data, json!({"email": "ada@example.com"}));
    }

    #[tokio::test]
    async fn validation_failures_from_the_server_are_reported() {
        let mut errors = ErrorMap::new();
        errors.insert("email".into(), vec!["Already registered.".into()]);
        let mut controller = controller(vec![Ok(SubmissionResponse::unprocessable(&errors))]);
        controller
            .dispatch(&FormEvent::Set {
                path: "email".into(),
                value: json!("ada@example.com"),
            })
            .await
            .expect("set");
        let report = controller.dispatch(&FormEvent::Click { path: "join".into() }).await.expect("click");

        assert_eq!(report.validation.as_ref().expect("validation").status, 422);
        assert!(report.redirect().is_none());
        let email = controller.tree().path("email");
        assert_eq!(controller.tree().field(&email).expect("field").errors(), ["Already registered."]);
    }

    #[tokio::test]
    async fn invalid_forms_never_reach_the_transport() {
        let mut controller = controller(Vec::new());
        let report = controller.dispatch(&FormEvent::Click { path: "join".into() }).await.expect("click");
        assert!(report.validation.is_some());
        assert!(controller.transport().requests().is_empty());
        controller.unmount();
    }

    #[test]
    fn replay_events_deserialize_from_yaml() {
        let events = FormEvent::parse_script(
            r#"
- set: { path: customer.name, value: John Doe }
- click: { path: submit }
- add: { collection: coffee_order }
- remove: { collection: coffee_order, index: 1 }
- step: { stepper: "", index: 2 }
- reset
"#,
        )
        .expect("events");
        assert_eq!(events.len(), 6);
        assert_eq!(events[2], FormEvent::Add {
            collection: "coffee_order".into(),
            after: None,
        });
        assert_eq!(events[5], FormEvent::Reset);
        assert_eq!(events[0], FormEvent::Set {
            path: "customer.name".into(),
            value: JsonValue::String("John Doe".into()),
        });
    }

    #[test]
    fn malformed_scripts_are_rejected() {
        assert!(FormEvent::parse_script("- jump: { path: submit }").is_err());
        assert!(FormEvent::parse_script("- remove: { collection: coffee_order }").is_err());
    }
}
