use tracing::{debug, info};

use crate::{
    condition::{InduceEvent, InduceKind},
    holder::CloseMode,
    node::Node,
    report::CycleReport,
};

use super::FormsetTree;

impl FormsetTree {
    /// Polls every inducer once. With `fire` unset the latches are updated silently.
    pub(super) fn sweep(&mut self, fire: bool) -> Vec<InduceEvent> {
        let snapshot = self.snapshot();
        let mut events = Vec::new();
        self.root.poll_inducers(&snapshot, fire, &mut events);
        events
    }

    /// Re-derives flags, runs one induce sweep and executes what fired.
    ///
    /// The active Activator is consumed here: after the sweep it is cleared and the latches
    /// are re-primed, so a `:active` condition falls back to false before the next event.
    /// Returns `false` when an induced step activation was blocked by validation.
    pub(super) fn settle(&mut self, report: &mut CycleReport) -> bool {
        self.refresh();
        let events = self.sweep(true);
        let mut succeeded = true;
        for event in events {
            succeeded &= self.execute(&event, report);
            report.induced.push(event);
        }
        self.active = None;
        self.refresh();
        self.sweep(false);
        succeeded
    }

    fn execute(&mut self, event: &InduceEvent, report: &mut CycleReport) -> bool {
        match event.kind {
            InduceKind::Open => {
                if let Some(holder) = self.root.holder_mut(&event.path)
                    && holder.open_dialog()
                {
                    info!(path = %event.path, "dialog opened by inducer");
                }
                true
            }
            InduceKind::Close => {
                let mode = self
                    .active
                    .as_ref()
                    .and_then(|active| active.args.first())
                    .and_then(|argument| CloseMode::parse(argument));
                let Some(mode) = mode else {
                    debug!(path = %event.path, "close inducer fired without a close mode");
                    return true;
                };
                if let Some(holder) = self.root.holder_mut(&event.path) {
                    let closed = holder.close_dialog(mode);
                    debug!(path = %event.path, ?mode, closed, "close inducer handled");
                }
                self.refresh();
                true
            }
            InduceKind::Activate => {
                let Some(stepper_path) = event.path.parent() else {
                    return true;
                };
                let index = match self.root.node(&stepper_path) {
                    Some(Node::Stepper(stepper)) => stepper.step_index_of(&event.path),
                    _ => None,
                };
                let Some(index) = index else {
                    debug!(path = %event.path, "activate inducer outside a stepper");
                    return true;
                };
                match self.navigate(&stepper_path, index, report) {
                    Ok(moved) => moved,
                    Err(rejection) => {
                        debug!(path = %event.path, %rejection, "induced step activation rejected");
                        false
                    }
                }
            }
        }
    }
}
