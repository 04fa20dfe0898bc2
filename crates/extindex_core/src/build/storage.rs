//! Index storage: writes the index resource into a build output and reads a
//! previous one back.
//!
//! # Invariants
//! - `Legacy` writes exactly one resource; group keys are informational and
//!   every entry of every group is flattened into it.
//! - `ServiceProvider` writes one resource per extension-point key.
//! - Entries pass through `parse_line` before being written, so every written
//!   line reads back as the same entry.

use crate::build::filer::{Filer, FilerError};
use crate::config::{IndexSettings, StorageLayout};
use crate::diagnostics::Diagnostics;
use crate::index::codec::{parse_line, read_entries, write_file};
use crate::index::model::{Bucket, ExtensionGroups};
use log::{debug, info};
use std::io::{BufRead, Write};
use std::sync::Arc;

/// Why a write did not happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The resource was already opened in this build cycle.
    AlreadyOpened,
    /// The filer cycle was closed before the write.
    FilerClosed,
}

impl SkipReason {
    fn from_filer_error(err: &FilerError) -> Option<Self> {
        match err {
            FilerError::AlreadyOpened(_) => Some(Self::AlreadyOpened),
            FilerError::Closed => Some(Self::FilerClosed),
            _ => None,
        }
    }
}

/// Result of one storage write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Resources written (relative paths) and total entry lines written.
    Written {
        resources: Vec<String>,
        entries: usize,
    },
    /// Nothing was written because of a benign filer condition.
    Skipped(SkipReason),
    /// An unexpected failure was reported to diagnostics.
    Failed,
}

/// Reads and writes index resources through a `Filer`.
pub struct IndexStorage {
    settings: IndexSettings,
    diagnostics: Arc<dyn Diagnostics>,
}

impl IndexStorage {
    pub fn new(settings: IndexSettings, diagnostics: Arc<dyn Diagnostics>) -> Self {
        Self {
            settings,
            diagnostics,
        }
    }

    pub fn settings(&self) -> &IndexSettings {
        &self.settings
    }

    /// Writes `groups` as the index resource(s) of the build output.
    ///
    /// Settings that fail `IndexSettings::validate` are reported and nothing
    /// is written.
    pub fn write(&self, filer: &Filer, groups: &ExtensionGroups) -> WriteOutcome {
        if let Err(err) = self.settings.validate() {
            self.diagnostics
                .report(&format!("refusing to write extension index: {err}"));
            return WriteOutcome::Failed;
        }
        match self.settings.layout {
            StorageLayout::Legacy => self.write_legacy(filer, groups),
            StorageLayout::ServiceProvider => self.write_service_provider(filer, groups),
        }
    }

    /// Reads a previously written index from the build output.
    ///
    /// Missing, already-opened and closed resources yield no groups.
    pub fn read(&self, filer: &Filer) -> ExtensionGroups {
        match self.settings.layout {
            StorageLayout::Legacy => {
                let mut groups = ExtensionGroups::new();
                if let Some(bucket) = self.read_resource(filer, self.settings.resource_path()) {
                    groups.insert(None, bucket);
                }
                groups
            }
            StorageLayout::ServiceProvider => self.read_service_provider(filer),
        }
    }

    fn write_legacy(&self, filer: &Filer, groups: &ExtensionGroups) -> WriteOutcome {
        let resource = self.settings.resource_path();
        let entries = flatten_groups(groups);
        match self.write_resource(filer, resource, &entries) {
            Ok(()) => {
                info!(
                    "event=index_write module=storage status=ok layout=legacy resource={} entries={}",
                    resource,
                    entries.len()
                );
                WriteOutcome::Written {
                    resources: vec![resource.to_string()],
                    entries: entries.len(),
                }
            }
            Err(outcome) => outcome,
        }
    }

    fn write_service_provider(&self, filer: &Filer, groups: &ExtensionGroups) -> WriteOutcome {
        let mut resources = Vec::new();
        let mut written_entries = 0;
        let mut skipped = None;
        let mut failed = false;
        let mut dropped = 0;

        for (point, bucket) in groups {
            let Some(point) = point else {
                if !bucket.is_empty() {
                    self.diagnostics.report(&format!(
                        "{} entries have no extension point and cannot be stored in the service provider layout",
                        bucket.len()
                    ));
                    dropped += bucket.len();
                }
                continue;
            };
            if !is_valid_point_name(point) {
                self.diagnostics
                    .report(&format!("extension point name is not a valid file name: {point}"));
                dropped += bucket.len();
                continue;
            }

            let resource = format!("{}/{}", self.settings.resource_path(), point);
            let entries = normalize_bucket(bucket);
            match self.write_resource(filer, &resource, &entries) {
                Ok(()) => {
                    written_entries += entries.len();
                    resources.push(resource);
                }
                Err(WriteOutcome::Skipped(reason)) => {
                    skipped.get_or_insert(reason);
                }
                Err(_) => failed = true,
            }
        }

        if resources.is_empty() {
            if let Some(reason) = skipped {
                return WriteOutcome::Skipped(reason);
            }
            // Entries were supplied but none could be placed.
            if failed || dropped > 0 {
                return WriteOutcome::Failed;
            }
        }
        info!(
            "event=index_write module=storage status=ok layout=service_provider resources={} entries={}",
            resources.len(),
            written_entries
        );
        WriteOutcome::Written {
            resources,
            entries: written_entries,
        }
    }

    /// Writes one resource; `Err` carries the non-written outcome.
    fn write_resource(
        &self,
        filer: &Filer,
        resource: &str,
        entries: &Bucket,
    ) -> Result<(), WriteOutcome> {
        let mut writer = match filer.create_resource(resource) {
            Ok(writer) => writer,
            Err(err) => return Err(self.classify_failure(resource, err)),
        };

        let header = self.settings.header.as_str();
        let result = write_file(&mut writer, header, entries.iter().map(String::as_str))
            .and_then(|()| writer.flush());
        result.map_err(|err| {
            self.diagnostics
                .report(&format!("cannot write extension index `{resource}`: {err}"));
            WriteOutcome::Failed
        })
    }

    fn classify_failure(&self, resource: &str, err: FilerError) -> WriteOutcome {
        match SkipReason::from_filer_error(&err) {
            Some(reason) => {
                debug!("event=index_write module=storage status=skipped resource={resource} reason={err}");
                WriteOutcome::Skipped(reason)
            }
            None => {
                self.diagnostics
                    .report(&format!("cannot create extension index `{resource}`: {err}"));
                WriteOutcome::Failed
            }
        }
    }

    fn read_service_provider(&self, filer: &Filer) -> ExtensionGroups {
        let dir = self.settings.resource_path();
        let mut groups = ExtensionGroups::new();
        let names = match filer.list_resources(dir) {
            Ok(names) => names,
            Err(err) => {
                self.report_read_failure(dir, &err);
                return groups;
            }
        };

        for name in names {
            let resource = format!("{dir}/{name}");
            if let Some(bucket) = self.read_resource(filer, &resource) {
                groups.insert(Some(name), bucket);
            }
        }
        groups
    }

    fn read_resource(&self, filer: &Filer, resource: &str) -> Option<Bucket> {
        let reader = match filer.open_resource(resource) {
            Ok(reader) => reader,
            Err(err) => {
                self.report_read_failure(resource, &err);
                return None;
            }
        };
        self.decode(resource, reader)
    }

    fn decode(&self, resource: &str, reader: impl BufRead) -> Option<Bucket> {
        let mut bucket = Bucket::new();
        match read_entries(reader, &mut bucket) {
            Ok(_) => {
                debug!(
                    "event=index_read_back module=storage status=ok resource={} entries={}",
                    resource,
                    bucket.len()
                );
                Some(bucket)
            }
            Err(err) => {
                self.diagnostics
                    .report(&format!("cannot read extension index `{resource}`: {err}"));
                None
            }
        }
    }

    fn report_read_failure(&self, resource: &str, err: &FilerError) {
        if err.is_benign() {
            debug!("event=index_read_back module=storage status=skipped resource={resource} reason={err}");
        } else {
            self.diagnostics
                .report(&format!("cannot open extension index `{resource}`: {err}"));
        }
    }
}

/// Unions and normalizes every group into one bucket.
fn flatten_groups(groups: &ExtensionGroups) -> Bucket {
    groups.values().flat_map(normalize_bucket).collect()
}

fn normalize_bucket(bucket: &Bucket) -> Bucket {
    bucket.iter().filter_map(|entry| parse_line(entry)).collect()
}

fn is_valid_point_name(value: &str) -> bool {
    !value.is_empty()
        && value != "."
        && value != ".."
        && !value.contains(['/', '\\', ':', '#'])
        && !value.chars().any(char::is_whitespace)
}

/// Unions `incoming` into `groups`, key by key.
pub fn merge_groups(groups: &mut ExtensionGroups, incoming: ExtensionGroups) {
    for (point, bucket) in incoming {
        groups.entry(point).or_default().extend(bucket);
    }
}

#[cfg(test)]
mod tests {
    use super::{flatten_groups, is_valid_point_name, merge_groups};
    use crate::index::model::{Bucket, ExtensionGroups};

    fn bucket(values: &[&str]) -> Bucket {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn flatten_normalizes_and_drops_empty_entries() {
        let mut groups = ExtensionGroups::new();
        groups.insert(None, bucket(&["a.A", " b . B "]));
        groups.insert(Some("p.Point".to_string()), bucket(&["a.A", "# only comment", "c.C"]));

        assert_eq!(flatten_groups(&groups), bucket(&["a.A", "b.B", "c.C"]));
    }

    #[test]
    fn merge_unions_per_key() {
        let mut groups = ExtensionGroups::new();
        groups.insert(Some("p".to_string()), bucket(&["a.A"]));
        let mut incoming = ExtensionGroups::new();
        incoming.insert(Some("p".to_string()), bucket(&["b.B"]));
        incoming.insert(None, bucket(&["c.C"]));

        merge_groups(&mut groups, incoming);
        assert_eq!(groups[&Some("p".to_string())], bucket(&["a.A", "b.B"]));
        assert_eq!(groups[&None], bucket(&["c.C"]));
    }

    #[test]
    fn point_names_must_be_plain_file_names() {
        assert!(is_valid_point_name("com.acme.Greeting"));
        for value in ["", "..", "a/b", "a b", "a#b", "c:x"] {
            assert!(!is_valid_point_name(value), "{value:?} should be rejected");
        }
    }
}
