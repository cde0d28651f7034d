use std::collections::{HashMap, HashSet};

use formset_types::{FieldPath, FieldValue};

use crate::{
    expression::{Lookup, PathResolver},
    field::Field,
};

/// Owned copy of every field value, taken before a refresh so conditions can be
/// evaluated while the tree itself is borrowed mutably.
#[derive(Debug, Default)]
pub(crate) struct ValueSnapshot {
    values: HashMap<FieldPath, FieldValue>,
    activators: HashSet<FieldPath>,
    active: Option<FieldPath>,
}

impl ValueSnapshot {
    pub(crate) fn with_active(active: Option<FieldPath>) -> Self {
        Self {
            active,
            ..Self::default()
        }
    }

    pub(crate) fn record(&mut self, field: &Field) {
        if field.is_activator() {
            self.activators.insert(field.path().clone());
        } else {
            self.values.insert(field.path().clone(), field.value().clone());
        }
    }
}

impl PathResolver for ValueSnapshot {
    fn lookup(&self, path: &FieldPath) -> Option<Lookup<'_>> {
        if let Some(value) = self.values.get(path) {
            return Some(Lookup::Value(value));
        }
        self.activators.contains(path).then(|| Lookup::Activator {
            active: self.active.as_ref() == Some(path),
        })
    }
}
