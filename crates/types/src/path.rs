//! Dotted field paths.
//!
//! Every field, holder and collection in a mounted tree is addressed by a [`FieldPath`]
//! such as `customer.name` or `coffee_order.0.coffee.nickname`. Sibling instances of a
//! repeatable collection are disambiguated by a numeric segment.

use std::{convert::Infallible, fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Ordered list of path segments. The empty path addresses the tree root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    /// The empty path.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parses a dotted string. Empty segments are dropped, so `""` yields the root.
    pub fn parse(dotted: &str) -> Self {
        Self {
            segments: dotted
                .split('.')
                .map(str::trim)
                .filter(|segment| !segment.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Final segment, if any.
    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Returns a new path with `segment` appended.
    pub fn join(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    /// Returns a new path with all segments of `other` appended.
    pub fn extend(&self, other: &FieldPath) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self { segments }
    }

    pub fn parent(&self) -> Option<FieldPath> {
        if self.segments.is_empty() {
            return None;
        }
        Some(self.truncate(self.segments.len() - 1))
    }

    /// Keeps at most `length` leading segments.
    pub fn truncate(&self, length: usize) -> Self {
        Self {
            segments: self.segments.iter().take(length).cloned().collect(),
        }
    }

    pub fn starts_with(&self, prefix: &FieldPath) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// Removes `prefix` from the front of this path.
    pub fn strip_prefix(&self, prefix: &FieldPath) -> Option<FieldPath> {
        self.segments.strip_prefix(prefix.segments.as_slice()).map(|rest| Self {
            segments: rest.to_vec(),
        })
    }

    /// Each ancestor path of `self`, nearest first, ending with the root.
    pub fn ancestors(&self) -> impl Iterator<Item = FieldPath> + '_ {
        (0..self.segments.len()).rev().map(|length| self.truncate(length))
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

impl FromStr for FieldPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<&str> for FieldPath {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl Serialize for FieldPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FieldPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let dotted = String::deserialize(deserializer)?;
        Ok(Self::parse(&dotted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_displays_dotted_paths() {
        let path = FieldPath::parse("coffee_order.0.coffee.nickname");
        assert_eq!(path.len(), 4);
        assert_eq!(path.last(), Some("nickname"));
        assert_eq!(path.to_string(), "coffee_order.0.coffee.nickname");
        assert!(FieldPath::parse("").is_root());
    }

    #[test]
    fn strips_prefix() {
        let path = FieldPath::parse("coffee_order.2.coffee.nickname");
        let prefix = FieldPath::parse("coffee_order");
        assert_eq!(path.strip_prefix(&prefix), Some(FieldPath::parse("2.coffee.nickname")));
        assert!(path.strip_prefix(&FieldPath::parse("flavor")).is_none());
    }

    #[test]
    fn ancestors_are_listed_nearest_first() {
        let path = FieldPath::parse("a.b.c");
        let ancestors: Vec<String> = path.ancestors().map(|p| p.to_string()).collect();
        assert_eq!(ancestors, vec!["a.b", "a", ""]);
    }

    #[test]
    fn serializes_as_a_plain_string() {
        let path = FieldPath::parse("shipping.street");
        assert_eq!(serde_json::to_string(&path).expect("serialize"), "\"shipping.street\"");
        let parsed: FieldPath = serde_json::from_str("\"shipping.city\"").expect("deserialize");
        assert_eq!(parsed, FieldPath::parse("shipping.city"));
    }
}
