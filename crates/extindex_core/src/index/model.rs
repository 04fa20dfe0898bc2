//! Discovery data model.
//!
//! # Responsibility
//! - Name the entry/bucket/scope shapes used across build and run time.
//! - Provide the insertion-ordered scope mapping returned by discovery.
//!
//! # Invariants
//! - Scope keys are unique within one `ExtensionIndex`.
//! - Scope insertion order is preserved (unscoped first, then plugins in
//!   registry order when produced by the finder).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};

/// One index entry, conventionally a fully-qualified type name.
///
/// Kept as a type alias: entries are plain strings on the wire.
pub type Entry = String;

/// Deduplicated set of entries found for one scope.
pub type Bucket = BTreeSet<Entry>;

/// Build-time entries grouped by optional extension-point key.
///
/// `None` holds entries whose extension point is unknown.
pub type ExtensionGroups = BTreeMap<Option<String>, Bucket>;

/// Identifies where a bucket came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScopeKey {
    /// Host application class path; serialized as `null`.
    Unscoped,
    /// One plugin scope, keyed by plugin id.
    Plugin(String),
}

impl ScopeKey {
    pub fn plugin(id: impl Into<String>) -> Self {
        Self::Plugin(id.into())
    }

    /// Returns the plugin id, or `None` for the unscoped key.
    pub fn plugin_id(&self) -> Option<&str> {
        match self {
            Self::Unscoped => None,
            Self::Plugin(id) => Some(id.as_str()),
        }
    }

    pub fn is_unscoped(&self) -> bool {
        matches!(self, Self::Unscoped)
    }
}

impl Display for ScopeKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unscoped => write!(f, "<unscoped>"),
            Self::Plugin(id) => write!(f, "{id}"),
        }
    }
}

/// Result of one discovery pass: scope key to bucket, in discovery order.
///
/// Built fresh per pass and never cached by core.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionIndex {
    scopes: IndexMap<ScopeKey, Bucket>,
}

impl ExtensionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `bucket` under `key`.
    ///
    /// A key seen before keeps its original position; buckets are unioned.
    pub fn insert(&mut self, key: ScopeKey, bucket: Bucket) {
        self.scopes.entry(key).or_default().extend(bucket);
    }

    /// Appends every scope of `other`, keeping this index's order first.
    pub fn extend(&mut self, other: ExtensionIndex) {
        for (key, bucket) in other.scopes {
            self.insert(key, bucket);
        }
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    pub fn bucket(&self, key: &ScopeKey) -> Option<&Bucket> {
        self.scopes.get(key)
    }

    /// Entries found on the host class path, if the unscoped key was queried.
    pub fn global_entries(&self) -> Option<&Bucket> {
        self.scopes.get(&ScopeKey::Unscoped)
    }

    pub fn entries_for_plugin(&self, plugin_id: &str) -> Option<&Bucket> {
        self.scopes.get(&ScopeKey::plugin(plugin_id))
    }

    /// Scope keys in discovery order.
    pub fn scopes(&self) -> impl Iterator<Item = &ScopeKey> {
        self.scopes.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ScopeKey, &Bucket)> {
        self.scopes.iter()
    }

    /// Sum of bucket sizes; an entry present in two scopes counts twice.
    pub fn total_entries(&self) -> usize {
        self.scopes.values().map(BTreeSet::len).sum()
    }

    /// Returns the first scope (in discovery order) whose bucket holds `entry`.
    pub fn scope_of_entry(&self, entry: &str) -> Option<&ScopeKey> {
        self.scopes
            .iter()
            .find(|(_, bucket)| bucket.contains(entry))
            .map(|(key, _)| key)
    }
}

impl IntoIterator for ExtensionIndex {
    type Item = (ScopeKey, Bucket);
    type IntoIter = indexmap::map::IntoIter<ScopeKey, Bucket>;

    fn into_iter(self) -> Self::IntoIter {
        self.scopes.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::{Bucket, ExtensionIndex, ScopeKey};

    fn bucket(values: &[&str]) -> Bucket {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn preserves_insertion_order_of_scopes() {
        let mut index = ExtensionIndex::new();
        index.insert(ScopeKey::Unscoped, bucket(&["a.A"]));
        index.insert(ScopeKey::plugin("zeta"), bucket(&[]));
        index.insert(ScopeKey::plugin("alpha"), bucket(&["b.B"]));

        let order: Vec<String> = index.scopes().map(ToString::to_string).collect();
        assert_eq!(order, vec!["<unscoped>", "zeta", "alpha"]);
    }

    #[test]
    fn reinserting_scope_unions_and_keeps_position() {
        let mut index = ExtensionIndex::new();
        index.insert(ScopeKey::plugin("p1"), bucket(&["a.A"]));
        index.insert(ScopeKey::plugin("p2"), bucket(&["c.C"]));
        index.insert(ScopeKey::plugin("p1"), bucket(&["a.A", "b.B"]));

        assert_eq!(index.len(), 2);
        assert_eq!(
            index.entries_for_plugin("p1").expect("p1 bucket"),
            &bucket(&["a.A", "b.B"])
        );
        assert_eq!(index.scopes().next(), Some(&ScopeKey::plugin("p1")));
    }

    #[test]
    fn scope_of_entry_returns_first_provider() {
        let mut index = ExtensionIndex::new();
        index.insert(ScopeKey::Unscoped, bucket(&["x.Shared"]));
        index.insert(ScopeKey::plugin("p1"), bucket(&["x.Shared", "p.Only"]));

        assert_eq!(index.scope_of_entry("x.Shared"), Some(&ScopeKey::Unscoped));
        assert_eq!(index.scope_of_entry("p.Only"), Some(&ScopeKey::plugin("p1")));
        assert_eq!(index.scope_of_entry("missing"), None);
        assert_eq!(index.total_entries(), 3);
    }

    #[test]
    fn scope_key_serializes_as_null_or_id() {
        let unscoped = serde_json::to_string(&ScopeKey::Unscoped).expect("serialize unscoped");
        let plugin = serde_json::to_string(&ScopeKey::plugin("demo")).expect("serialize plugin");
        assert_eq!(unscoped, "null");
        assert_eq!(plugin, "\"demo\"");
    }
}
