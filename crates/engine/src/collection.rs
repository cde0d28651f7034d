//! Form collections and their siblings.
//!
//! A collection groups named member nodes. A repeatable collection renders its members
//! once per sibling, each sibling addressed by a numeric path segment:
//! `coffee_order.0.coffee.nickname`, `coffee_order.1.coffee.nickname`, ...
//! Sibling indices are always contiguous from zero.

use formset_types::{CollectionDescription, FieldPath, FieldValue};
use indexmap::IndexMap;
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, warn};

use crate::{
    condition::{InduceEvent, InduceKind, Inducer},
    error::{ConfigError, Rejection},
    expression::PathResolver,
    holder::Placement,
    node::Node,
    validate_member_name,
};

/// Segment standing in for the sibling index of the template.
const TEMPLATE_SEGMENT: &str = "__prefix__";

/// One live instance of the collection's members.
#[derive(Debug, Clone)]
pub struct Sibling {
    members: IndexMap<String, Node>,
    /// An offered blank sibling the user has not touched yet.
    pristine_extra: bool,
}

impl Sibling {
    pub fn members(&self) -> &IndexMap<String, Node> {
        &self.members
    }

    pub fn is_pristine_extra(&self) -> bool {
        self.pristine_extra
    }
}

/// Data of a collection as returned by [`FormCollection::sibling_data`].
#[derive(Debug, Clone, PartialEq)]
pub enum CollectionData {
    Single(IndexMap<FieldPath, FieldValue>),
    Siblings(Vec<IndexMap<FieldPath, FieldValue>>),
}

#[derive(Debug, Clone)]
pub struct FormCollection {
    path: FieldPath,
    description: CollectionDescription,
    repeatable: bool,
    min_siblings: usize,
    max_siblings: Option<usize>,
    /// Pristine members every added sibling is cloned from.
    template: IndexMap<String, Node>,
    siblings: Vec<Sibling>,
    inducer: Option<Inducer>,
}

impl FormCollection {
    /// Builds a collection. `members_are_steps` is set when building the steps of a stepper.
    pub(crate) fn build(
        path: FieldPath,
        description: &CollectionDescription,
        initial: Option<&JsonValue>,
        placement: Placement,
        members_are_steps: bool,
    ) -> Result<Self, ConfigError> {
        let repeatable = description.is_repeatable();
        let min_siblings = description.min_siblings.unwrap_or(0);
        if let Some(max) = description.max_siblings
            && min_siblings > max
        {
            return Err(ConfigError::SiblingBounds {
                path,
                min: min_siblings,
                max,
            });
        }

        let inducer = match description.induce_activate.as_deref() {
            Some(_) if !placement.is_step => {
                return Err(ConfigError::MisplacedInducer {
                    path,
                    attribute: InduceKind::Activate.attribute(),
                });
            }
            Some(source) => Some(Inducer::compile(&path, InduceKind::Activate, source)?),
            None => None,
        };

        let member_placement = Placement {
            is_step: members_are_steps,
            within_repeatable: placement.within_repeatable || repeatable,
        };
        let template_base = if repeatable { path.join(TEMPLATE_SEGMENT) } else { path.clone() };
        let template = build_members(&template_base, description, None, member_placement)?;

        let mut collection = Self {
            path,
            description: description.clone(),
            repeatable,
            min_siblings,
            max_siblings: description.max_siblings,
            template,
            siblings: Vec::new(),
            inducer,
        };

        if !repeatable {
            let members = build_members(&collection.path, description, initial, member_placement)?;
            collection.siblings.push(Sibling {
                members,
                pristine_extra: false,
            });
            return Ok(collection);
        }

        let mut entries = sibling_entries(initial);
        if let Some(max) = collection.max_siblings
            && entries.len() > max
        {
            warn!(path = %collection.path, provided = entries.len(), max, "dropping initial siblings beyond max_siblings");
            entries.truncate(max);
        }
        for (index, entry) in entries.into_iter().enumerate() {
            let members = build_members(&collection.path.join(index.to_string()), description, Some(entry), member_placement)?;
            collection.siblings.push(Sibling {
                members,
                pristine_extra: false,
            });
        }
        while collection.siblings.len() < min_siblings {
            collection.push_blank(false);
        }
        for _ in 0..description.extra_siblings.unwrap_or(0) {
            if collection.is_full() {
                break;
            }
            collection.push_blank(true);
        }
        Ok(collection)
    }

    fn push_blank(&mut self, pristine_extra: bool) {
        let index = self.siblings.len();
        let members = self.instantiate(index);
        self.siblings.push(Sibling { members, pristine_extra });
    }

    /// Clones the template members into sibling `index`.
    fn instantiate(&self, index: usize) -> IndexMap<String, Node> {
        let base = self.path.join(index.to_string());
        self.template
            .iter()
            .map(|(name, node)| {
                let mut node = node.clone();
                node.rebase(base.join(name.as_str()));
                (name.clone(), node)
            })
            .collect()
    }

    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    pub fn description(&self) -> &CollectionDescription {
        &self.description
    }

    pub fn legend(&self) -> Option<&str> {
        self.description.legend.as_deref()
    }

    pub fn add_label(&self) -> Option<&str> {
        self.description.add_label.as_deref()
    }

    pub fn is_repeatable(&self) -> bool {
        self.repeatable
    }

    pub fn min_siblings(&self) -> usize {
        self.min_siblings
    }

    pub fn max_siblings(&self) -> Option<usize> {
        self.max_siblings
    }

    pub fn siblings(&self) -> &[Sibling] {
        &self.siblings
    }

    pub fn sibling_count(&self) -> usize {
        self.siblings.len()
    }

    fn is_full(&self) -> bool {
        self.max_siblings.is_some_and(|max| self.siblings.len() >= max)
    }

    pub fn inducer(&self) -> Option<&Inducer> {
        self.inducer.as_ref()
    }

    pub fn children(&self) -> impl Iterator<Item = &Node> {
        self.siblings.iter().flat_map(|sibling| sibling.members.values())
    }

    pub(crate) fn children_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.siblings.iter_mut().flat_map(|sibling| sibling.members.values_mut())
    }

    /// Member nodes of a non-repeatable collection, in declaration order.
    pub(crate) fn members(&self) -> Option<&IndexMap<String, Node>> {
        if self.repeatable {
            return None;
        }
        self.siblings.first().map(|sibling| &sibling.members)
    }

    pub(crate) fn members_mut(&mut self) -> Option<&mut IndexMap<String, Node>> {
        if self.repeatable {
            return None;
        }
        self.siblings.first_mut().map(|sibling| &mut sibling.members)
    }

    /// Inserts a blank sibling after `after` (default: append) and returns its index.
    pub fn add_sibling(&mut self, after: Option<usize>) -> Result<usize, Rejection> {
        if !self.repeatable {
            return Err(Rejection::NotRepeatable(self.path.clone()));
        }
        if let Some(max) = self.max_siblings
            && self.siblings.len() >= max
        {
            return Err(Rejection::MaxSiblingsReached {
                path: self.path.clone(),
                max,
            });
        }
        let position = match after {
            Some(index) if index >= self.siblings.len() => {
                return Err(Rejection::SiblingOutOfRange {
                    path: self.path.clone(),
                    index,
                });
            }
            Some(index) => index + 1,
            None => self.siblings.len(),
        };
        let members = self.instantiate(position);
        self.siblings.insert(position, Sibling {
            members,
            pristine_extra: false,
        });
        self.renumber(position + 1);
        debug!(path = %self.path, index = position, count = self.siblings.len(), "sibling added");
        Ok(position)
    }

    /// Removes sibling `index`, renumbering the ones after it. Pristine extra siblings do
    /// not count towards `min_siblings`.
    pub fn remove_sibling(&mut self, index: usize) -> Result<(), Rejection> {
        if !self.repeatable {
            return Err(Rejection::NotRepeatable(self.path.clone()));
        }
        if index >= self.siblings.len() {
            return Err(Rejection::SiblingOutOfRange {
                path: self.path.clone(),
                index,
            });
        }
        let live = self.live_siblings().count();
        let live_after = if self.siblings[index].pristine_extra { live } else { live - 1 };
        if live_after < self.min_siblings {
            return Err(Rejection::MinSiblingsReached {
                path: self.path.clone(),
                min: self.min_siblings,
            });
        }
        self.siblings.remove(index);
        self.renumber(index);
        debug!(path = %self.path, index, count = self.siblings.len(), "sibling removed");
        Ok(())
    }

    fn renumber(&mut self, from: usize) {
        for index in from..self.siblings.len() {
            let base = self.path.join(index.to_string());
            for (name, node) in self.siblings[index].members.iter_mut() {
                node.rebase(base.join(name.as_str()));
            }
        }
    }

    pub(crate) fn rebase(&mut self, path: FieldPath) {
        self.path = path;
        if self.repeatable {
            let template_base = self.path.join(TEMPLATE_SEGMENT);
            for (name, node) in self.template.iter_mut() {
                node.rebase(template_base.join(name.as_str()));
            }
            self.renumber(0);
        } else {
            let base = self.path.clone();
            for (name, node) in self.template.iter_mut() {
                node.rebase(base.join(name.as_str()));
            }
            if let Some(sibling) = self.siblings.first_mut() {
                for (name, node) in sibling.members.iter_mut() {
                    node.rebase(base.join(name.as_str()));
                }
            }
        }
    }

    pub(crate) fn poll_inducer(&mut self, resolver: &dyn PathResolver, fire: bool, events: &mut Vec<InduceEvent>) {
        if let Some(inducer) = self.inducer.as_mut()
            && inducer.poll(&self.path, resolver)
            && fire
        {
            events.push(InduceEvent {
                kind: inducer.kind,
                path: self.path.clone(),
            });
        }
    }

    /// Marks the sibling containing `path` as a regular sibling.
    pub(crate) fn touch(&mut self, path: &FieldPath) {
        if !self.repeatable {
            return;
        }
        let Some(relative) = path.strip_prefix(&self.path) else {
            return;
        };
        if let Some(index) = relative.segments().first().and_then(|segment| segment.parse::<usize>().ok())
            && let Some(sibling) = self.siblings.get_mut(index)
            && sibling.pristine_extra
        {
            sibling.pristine_extra = false;
            debug!(path = %self.path, index, "extra sibling touched");
        }
    }

    fn live_siblings(&self) -> impl Iterator<Item = &Sibling> {
        self.siblings.iter().filter(|sibling| !sibling.pristine_extra)
    }

    pub(crate) fn validate(&mut self, failures: &mut Vec<(FieldPath, Vec<String>)>) -> bool {
        let mut valid = true;
        for sibling in self.siblings.iter_mut().filter(|sibling| !sibling.pristine_extra) {
            for node in sibling.members.values_mut() {
                valid &= node.validate(failures);
            }
        }
        valid
    }

    /// Every live sibling is valid. A collection without siblings is vacuously valid.
    pub fn is_valid(&self) -> bool {
        self.live_siblings()
            .all(|sibling| sibling.members.values().all(Node::is_valid))
    }

    pub(crate) fn collect_into(&self, data: &mut IndexMap<FieldPath, FieldValue>) {
        for sibling in self.live_siblings() {
            for node in sibling.members.values() {
                node.collect_data(data);
            }
        }
    }

    /// Per-sibling data for repeatable collections, a single mapping otherwise.
    pub fn sibling_data(&self) -> CollectionData {
        let per_sibling = |sibling: &Sibling| {
            let mut data = IndexMap::new();
            for node in sibling.members.values() {
                node.collect_data(&mut data);
            }
            data
        };
        if self.repeatable {
            CollectionData::Siblings(self.live_siblings().map(per_sibling).collect())
        } else {
            CollectionData::Single(self.siblings.first().map(per_sibling).unwrap_or_default())
        }
    }

    pub fn wire_data(&self) -> JsonValue {
        let sibling_object = |sibling: &Sibling| {
            JsonValue::Object(
                sibling
                    .members
                    .iter()
                    .map(|(name, node)| (name.clone(), node.wire_data()))
                    .collect::<Map<String, JsonValue>>(),
            )
        };
        if self.repeatable {
            JsonValue::Array(self.live_siblings().map(sibling_object).collect())
        } else {
            self.siblings.first().map(sibling_object).unwrap_or(JsonValue::Null)
        }
    }
}

fn build_members(
    base: &FieldPath,
    description: &CollectionDescription,
    initial: Option<&JsonValue>,
    placement: Placement,
) -> Result<IndexMap<String, Node>, ConfigError> {
    let mut members = IndexMap::with_capacity(description.members.len());
    for (name, declaration) in &description.members {
        validate_member_name(base, name)?;
        let initial = initial.and_then(|value| value.get(name));
        members.insert(name.clone(), Node::build(base.join(name.as_str()), declaration, initial, placement)?);
    }
    Ok(members)
}

/// Initial data of a repeatable collection: an array, or an object keyed by sibling index.
fn sibling_entries(initial: Option<&JsonValue>) -> Vec<&JsonValue> {
    match initial {
        Some(JsonValue::Array(items)) => items.iter().collect(),
        Some(JsonValue::Object(map)) => {
            let mut indexed: Vec<(usize, &JsonValue)> = map
                .iter()
                .filter_map(|(key, value)| key.parse::<usize>().ok().map(|index| (index, value)))
                .collect();
            indexed.sort_by_key(|(index, _)| *index);
            indexed.into_iter().map(|(_, value)| value).collect()
        }
        _ => Vec::new(),
    }
}
