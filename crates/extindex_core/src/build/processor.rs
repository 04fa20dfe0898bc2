//! Build-time pipeline: classify, merge with the previous index, write.

use crate::build::filer::Filer;
use crate::build::storage::{merge_groups, IndexStorage, WriteOutcome};
use crate::index::codec::parse_line;
use crate::index::model::ExtensionGroups;
use log::info;

/// Supplies the entries believed to be extensions, grouped by optional
/// extension-point key.
///
/// Deciding what is an extension happens outside this crate.
pub trait ExtensionClassifier {
    fn classify(&self) -> ExtensionGroups;
}

/// Classifier over an explicit list of entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticClassifier {
    groups: ExtensionGroups,
}

impl StaticClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one entry under `point`.
    ///
    /// The entry is normalized like an index line; returns `false` when
    /// nothing is left after normalization.
    pub fn add(&mut self, point: Option<&str>, entry: &str) -> bool {
        let Some(entry) = parse_line(entry) else {
            return false;
        };
        let point = point
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        self.groups.entry(point).or_default().insert(entry);
        true
    }

    pub fn is_empty(&self) -> bool {
        self.groups.values().all(|bucket| bucket.is_empty())
    }
}

impl ExtensionClassifier for StaticClassifier {
    fn classify(&self) -> ExtensionGroups {
        self.groups.clone()
    }
}

/// Runs one build cycle's index production.
pub struct IndexProcessor {
    storage: IndexStorage,
    merge_previous: bool,
}

impl IndexProcessor {
    pub fn new(storage: IndexStorage) -> Self {
        Self {
            storage,
            merge_previous: false,
        }
    }

    /// Keeps entries from an index already present in the build output.
    pub fn merge_previous(mut self, enabled: bool) -> Self {
        self.merge_previous = enabled;
        self
    }

    /// Classifies, optionally merges the previous index, and writes.
    pub fn process(&self, classifier: &dyn ExtensionClassifier, filer: &Filer) -> WriteOutcome {
        let mut groups = if self.merge_previous {
            self.storage.read(filer)
        } else {
            ExtensionGroups::new()
        };
        let previous: usize = groups.values().map(|bucket| bucket.len()).sum();

        merge_groups(&mut groups, classifier.classify());
        info!(
            "event=index_process module=processor status=start previous_entries={} groups={}",
            previous,
            groups.len()
        );
        self.storage.write(filer, &groups)
    }
}

#[cfg(test)]
mod tests {
    use super::{ExtensionClassifier, StaticClassifier};

    #[test]
    fn static_classifier_normalizes_and_groups() {
        let mut classifier = StaticClassifier::new();
        assert!(classifier.is_empty());
        assert!(classifier.add(None, " com.acme.Foo "));
        assert!(classifier.add(Some(" com.acme.Point "), "com.acme.Bar # impl"));
        assert!(classifier.add(Some(""), "com.acme.Baz"));
        assert!(!classifier.add(None, "   # nothing"));

        let groups = classifier.classify();
        assert_eq!(groups.len(), 2);
        assert!(groups[&None].contains("com.acme.Foo"));
        assert!(groups[&None].contains("com.acme.Baz"));
        assert!(groups[&Some("com.acme.Point".to_string())].contains("com.acme.Bar"));
    }
}
