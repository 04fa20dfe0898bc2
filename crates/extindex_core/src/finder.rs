//! Extension finder.
//!
//! # Responsibility
//! - Run one discovery pass over the host scope and each plugin scope.
//! - Produce the ordered scope -> bucket mapping consumed by extension
//!   resolution.
//!
//! # Invariants
//! - The host scope is read through its aggregate view; plugin scopes only
//!   through their own entries.
//! - Every queried plugin scope appears in the result, with an empty bucket
//!   when it has no index resource.
//! - Result order: unscoped first (when queried), then plugins in registry
//!   order, regardless of `parallel_discovery`.
//! - Discovery never fails; unexpected failures go to diagnostics.

use crate::config::IndexSettings;
use crate::diagnostics::Diagnostics;
use crate::index::model::{Bucket, ExtensionIndex, ScopeKey};
use crate::index::reader::read_roots;
use crate::scope::loader::ResourceLoader;
use crate::scope::locator::{ScopeResourceLocator, Visibility};
use crate::scope::registry::ScopeRegistry;
use log::{debug, info};
use std::sync::Arc;
use std::time::Instant;

/// Discovers index entries per scope.
pub struct ExtensionFinder {
    settings: IndexSettings,
    diagnostics: Arc<dyn Diagnostics>,
}

impl ExtensionFinder {
    pub fn new(settings: IndexSettings, diagnostics: Arc<dyn Diagnostics>) -> Self {
        Self {
            settings,
            diagnostics,
        }
    }

    pub fn settings(&self) -> &IndexSettings {
        &self.settings
    }

    /// Reads the host class path into one bucket under `ScopeKey::Unscoped`.
    pub fn discover_global(&self, host: &dyn ResourceLoader) -> ExtensionIndex {
        debug!("event=discover module=finder status=start scope=global");
        let mut index = ExtensionIndex::new();
        let bucket = self.read_scope(&ScopeKey::Unscoped, host, Visibility::Aggregate);
        index.insert(ScopeKey::Unscoped, bucket);
        index
    }

    /// Reads each plugin scope through its own loader, in registry order.
    pub fn discover_per_plugin(&self, scopes: &ScopeRegistry) -> ExtensionIndex {
        debug!(
            "event=discover module=finder status=start scope=plugins plugins={} parallel={}",
            scopes.len(),
            self.settings.parallel_discovery
        );
        let mut index = ExtensionIndex::new();
        if self.settings.parallel_discovery && scopes.len() > 1 {
            for (key, bucket) in self.read_plugins_parallel(scopes) {
                index.insert(key, bucket);
            }
        } else {
            for (key, loader) in scopes.iter() {
                let bucket = self.read_scope(&key, loader.as_ref(), Visibility::Own);
                index.insert(key, bucket);
            }
        }
        index
    }

    /// Global scope first, then every plugin scope.
    pub fn discover(&self, host: &dyn ResourceLoader, scopes: &ScopeRegistry) -> ExtensionIndex {
        let started_at = Instant::now();
        let mut index = self.discover_global(host);
        index.extend(self.discover_per_plugin(scopes));
        info!(
            "event=discover module=finder status=ok scopes={} entries={} duration_ms={}",
            index.len(),
            index.total_entries(),
            started_at.elapsed().as_millis()
        );
        index
    }

    fn read_plugins_parallel(&self, scopes: &ScopeRegistry) -> Vec<(ScopeKey, Bucket)> {
        let pairs: Vec<_> = scopes.iter().collect();
        std::thread::scope(|scope| {
            let handles: Vec<_> = pairs
                .iter()
                .map(|(key, loader)| {
                    let loader = Arc::clone(loader);
                    scope.spawn(move || self.read_scope(key, loader.as_ref(), Visibility::Own))
                })
                .collect();

            pairs
                .iter()
                .zip(handles)
                .map(|((key, _), handle)| {
                    let bucket = handle.join().unwrap_or_else(|_| {
                        self.diagnostics
                            .report(&format!("extension discovery for scope `{key}` panicked"));
                        Bucket::new()
                    });
                    (key.clone(), bucket)
                })
                .collect()
        })
    }

    fn read_scope(
        &self,
        key: &ScopeKey,
        loader: &dyn ResourceLoader,
        visibility: Visibility,
    ) -> Bucket {
        let resource = self.settings.resource_path();
        debug!("event=scope_read module=finder status=start scope={key} resource={resource}");

        let locator = ScopeResourceLocator::new(self.diagnostics.as_ref());
        let roots = locator.locate_roots(loader, resource, visibility);
        let bucket = read_roots(roots, self.diagnostics.as_ref());

        if bucket.is_empty() {
            debug!("event=scope_read module=finder status=empty scope={key}");
        } else {
            debug!(
                "event=scope_read module=finder status=ok scope={} entries={}",
                key,
                bucket.len()
            );
            for entry in &bucket {
                debug!("event=scope_entry module=finder scope={key} entry={entry}");
            }
        }
        bucket
    }
}
