//! Tree nodes: forms, collections and steppers.

use formset_types::{FieldPath, FieldValue, NodeDescription};
use indexmap::IndexMap;
use serde_json::Value as JsonValue;

use crate::{
    collection::FormCollection,
    condition::InduceEvent,
    error::ConfigError,
    expression::PathResolver,
    field::Field,
    holder::{Holder, HolderKind, Placement},
    stepper::StepperCollection,
    tree::snapshot::ValueSnapshot,
};

#[derive(Debug, Clone)]
pub enum Node {
    Form(Holder),
    Collection(FormCollection),
    Stepper(StepperCollection),
}

impl Node {
    pub(crate) fn build(
        path: FieldPath,
        description: &NodeDescription,
        initial: Option<&JsonValue>,
        placement: Placement,
    ) -> Result<Self, ConfigError> {
        match description {
            NodeDescription::Form(form) => Holder::build_form(path, form, initial, placement).map(Node::Form),
            NodeDescription::Collection(collection) => {
                FormCollection::build(path, collection, initial, placement, false).map(Node::Collection)
            }
            NodeDescription::Stepper(collection) => StepperCollection::build(path, collection, initial, placement).map(Node::Stepper),
        }
    }

    pub fn path(&self) -> &FieldPath {
        match self {
            Node::Form(holder) => holder.path(),
            Node::Collection(collection) => collection.path(),
            Node::Stepper(stepper) => stepper.collection().path(),
        }
    }

    pub fn name(&self) -> &str {
        self.path().last().unwrap_or_default()
    }

    pub fn as_form(&self) -> Option<&Holder> {
        match self {
            Node::Form(holder) => Some(holder),
            _ => None,
        }
    }

    pub fn as_stepper(&self) -> Option<&StepperCollection> {
        match self {
            Node::Stepper(stepper) => Some(stepper),
            _ => None,
        }
    }

    /// The collection behind a collection or stepper node.
    pub fn as_collection(&self) -> Option<&FormCollection> {
        match self {
            Node::Form(_) => None,
            Node::Collection(collection) => Some(collection),
            Node::Stepper(stepper) => Some(stepper.collection()),
        }
    }

    fn as_collection_mut(&mut self) -> Option<&mut FormCollection> {
        match self {
            Node::Form(_) => None,
            Node::Collection(collection) => Some(collection),
            Node::Stepper(stepper) => Some(stepper.collection_mut()),
        }
    }

    pub(crate) fn rebase(&mut self, path: FieldPath) {
        match self {
            Node::Form(holder) => holder.rebase(path),
            Node::Collection(collection) => collection.rebase(path),
            Node::Stepper(stepper) => stepper.collection_mut().rebase(path),
        }
    }

    /// Child nodes of a collection or stepper, across all live siblings.
    pub fn children(&self) -> Vec<&Node> {
        match self.as_collection() {
            Some(collection) => collection.children().collect(),
            None => Vec::new(),
        }
    }

    fn child_containing_mut(&mut self, path: &FieldPath) -> Option<&mut Node> {
        self.as_collection_mut()?
            .children_mut()
            .find(|child| path.starts_with(child.path()))
    }

    fn child_containing(&self, path: &FieldPath) -> Option<&Node> {
        self.as_collection()?.children().find(|child| path.starts_with(child.path()))
    }

    pub fn node(&self, path: &FieldPath) -> Option<&Node> {
        if self.path() == path {
            return Some(self);
        }
        self.child_containing(path)?.node(path)
    }

    pub(crate) fn node_mut(&mut self, path: &FieldPath) -> Option<&mut Node> {
        if self.path() == path {
            return Some(self);
        }
        self.child_containing_mut(path)?.node_mut(path)
    }

    /// Nodes from `self` down to the node containing `path`, outermost first.
    pub fn lineage(&self, path: &FieldPath) -> Vec<&Node> {
        let mut lineage = vec![self];
        let mut current = self;
        while let Some(child) = current.child_containing(path) {
            lineage.push(child);
            current = child;
        }
        lineage
    }

    pub fn field(&self, path: &FieldPath) -> Option<&Field> {
        match self {
            Node::Form(holder) => holder.field(path),
            _ => self.child_containing(path)?.field(path),
        }
    }

    pub(crate) fn field_mut(&mut self, path: &FieldPath) -> Option<&mut Field> {
        match self {
            Node::Form(holder) => holder.field_mut(path),
            _ => self.child_containing_mut(path)?.field_mut(path),
        }
    }

    /// A form or fieldset at `path`.
    pub fn holder(&self, path: &FieldPath) -> Option<&Holder> {
        match self {
            Node::Form(holder) => holder.holder(path),
            _ => self.child_containing(path)?.holder(path),
        }
    }

    pub(crate) fn holder_mut(&mut self, path: &FieldPath) -> Option<&mut Holder> {
        match self {
            Node::Form(holder) => holder.holder_mut(path),
            _ => self.child_containing_mut(path)?.holder_mut(path),
        }
    }

    pub fn fields(&self) -> Vec<&Field> {
        match self {
            Node::Form(holder) => holder.fields(),
            _ => self.children().into_iter().flat_map(Node::fields).collect(),
        }
    }

    pub(crate) fn for_each_field_mut(&mut self, visit: &mut dyn FnMut(&mut Field)) {
        match self {
            Node::Form(holder) => holder.for_each_field_mut(visit),
            _ => {
                if let Some(collection) = self.as_collection_mut() {
                    for child in collection.children_mut() {
                        child.for_each_field_mut(visit);
                    }
                }
            }
        }
    }

    pub(crate) fn for_each_holder_mut(&mut self, visit: &mut dyn FnMut(&mut Holder)) {
        match self {
            Node::Form(holder) => holder.for_each_holder_mut(visit),
            _ => {
                if let Some(collection) = self.as_collection_mut() {
                    for child in collection.children_mut() {
                        child.for_each_holder_mut(visit);
                    }
                }
            }
        }
    }

    /// Visits every stepper beneath and including this node.
    pub(crate) fn for_each_stepper_mut(&mut self, visit: &mut dyn FnMut(&mut StepperCollection)) {
        if let Node::Stepper(stepper) = self {
            visit(stepper);
        }
        if let Some(collection) = self.as_collection_mut() {
            for child in collection.children_mut() {
                child.for_each_stepper_mut(visit);
            }
        }
    }

    pub(crate) fn record_values(&self, snapshot: &mut ValueSnapshot) {
        match self {
            Node::Form(holder) => holder.record_values(snapshot),
            _ => {
                for child in self.children() {
                    child.record_values(snapshot);
                }
            }
        }
    }

    pub(crate) fn refresh(&mut self, resolver: &dyn PathResolver) {
        match self {
            Node::Form(holder) => holder.refresh(resolver, false, false),
            _ => {
                if let Some(collection) = self.as_collection_mut() {
                    for child in collection.children_mut() {
                        child.refresh(resolver);
                    }
                }
            }
        }
    }

    pub(crate) fn poll_inducers(&mut self, resolver: &dyn PathResolver, fire: bool, events: &mut Vec<InduceEvent>) {
        match self {
            Node::Form(holder) => holder.poll_inducers(resolver, fire, events),
            _ => {
                if let Some(collection) = self.as_collection_mut() {
                    collection.poll_inducer(resolver, fire, events);
                    for child in collection.children_mut() {
                        child.poll_inducers(resolver, fire, events);
                    }
                }
            }
        }
    }

    /// Validates everything beneath this node. Closed dialogs and pristine extra siblings
    /// are skipped.
    pub(crate) fn validate(&mut self, failures: &mut Vec<(FieldPath, Vec<String>)>) -> bool {
        match self {
            Node::Form(holder) => {
                if holder.dialog().is_some() && !holder.is_dialog_open() {
                    return true;
                }
                holder.validate(failures)
            }
            Node::Collection(collection) => collection.validate(failures),
            Node::Stepper(stepper) => stepper.collection_mut().validate(failures),
        }
    }

    /// Validity without recording errors.
    pub fn is_valid(&self) -> bool {
        match self {
            Node::Form(holder) => (holder.dialog().is_some() && !holder.is_dialog_open()) || holder.is_valid(),
            _ => self.as_collection().is_some_and(FormCollection::is_valid),
        }
    }

    pub fn collect_data(&self, data: &mut IndexMap<FieldPath, FieldValue>) {
        match self {
            Node::Form(holder) => holder.collect_data(data),
            _ => {
                if let Some(collection) = self.as_collection() {
                    collection.collect_into(data);
                }
            }
        }
    }

    /// Wire representation: flat mapping for a form, nested objects for collections and
    /// arrays for repeatable collections.
    pub fn wire_data(&self) -> JsonValue {
        match self {
            Node::Form(holder) => holder.wire_data(),
            _ => self.as_collection().map(FormCollection::wire_data).unwrap_or(JsonValue::Null),
        }
    }

    pub(crate) fn apply_errors(&mut self, path: &FieldPath, messages: &[String]) -> bool {
        match self {
            Node::Form(holder) => holder.apply_errors(path, messages),
            _ => self
                .child_containing_mut(path)
                .is_some_and(|child| child.apply_errors(path, messages)),
        }
    }

    pub(crate) fn reset(&mut self) {
        self.for_each_holder_mut(&mut |holder| {
            if holder.kind() == HolderKind::Form {
                holder.reset();
            }
        });
    }

    pub(crate) fn clear_errors(&mut self) {
        self.for_each_holder_mut(&mut |holder| holder.clear_errors());
    }

    /// Marks the pristine extra sibling containing `path`, if any, as touched.
    pub(crate) fn touch(&mut self, path: &FieldPath) {
        if let Some(collection) = self.as_collection_mut() {
            collection.touch(path);
        }
        if let Some(child) = self.child_containing_mut(path) {
            child.touch(path);
        }
    }
}
