//! Caller-owned registry of plugin scopes.

use crate::index::model::ScopeKey;
use crate::scope::loader::ResourceLoader;
use indexmap::IndexMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Scope registration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeRegistryError {
    InvalidPluginId(String),
    DuplicatePluginId(String),
}

impl Display for ScopeRegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPluginId(value) => write!(f, "plugin id is invalid: {value}"),
            Self::DuplicatePluginId(value) => {
                write!(f, "plugin id already registered: {value}")
            }
        }
    }
}

impl Error for ScopeRegistryError {}

/// Ordered plugin id -> loader collection.
///
/// Iteration order is registration order; discovery reports plugin scopes
/// in that order.
#[derive(Default, Clone)]
pub struct ScopeRegistry {
    scopes: IndexMap<String, Arc<dyn ResourceLoader>>,
}

impl ScopeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one plugin scope.
    pub fn register(
        &mut self,
        plugin_id: &str,
        loader: Arc<dyn ResourceLoader>,
    ) -> Result<(), ScopeRegistryError> {
        let plugin_id = plugin_id.trim().to_string();
        if !is_valid_plugin_id(&plugin_id) {
            return Err(ScopeRegistryError::InvalidPluginId(plugin_id));
        }
        if self.scopes.contains_key(plugin_id.as_str()) {
            return Err(ScopeRegistryError::DuplicatePluginId(plugin_id));
        }

        self.scopes.insert(plugin_id, loader);
        Ok(())
    }

    /// Removes one plugin scope, keeping the order of the rest.
    pub fn unregister(&mut self, plugin_id: &str) -> Option<Arc<dyn ResourceLoader>> {
        self.scopes.shift_remove(plugin_id.trim())
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    pub fn get(&self, plugin_id: &str) -> Option<Arc<dyn ResourceLoader>> {
        self.scopes.get(plugin_id.trim()).cloned()
    }

    /// Returns plugin ids in registration order.
    pub fn plugin_ids(&self) -> Vec<String> {
        self.scopes.keys().cloned().collect()
    }

    /// Iterates `(scope key, loader)` pairs in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (ScopeKey, &Arc<dyn ResourceLoader>)> {
        self.scopes
            .iter()
            .map(|(id, loader)| (ScopeKey::plugin(id.as_str()), loader))
    }
}

impl std::fmt::Debug for ScopeRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeRegistry")
            .field("plugin_ids", &self.plugin_ids())
            .finish()
    }
}

fn is_valid_plugin_id(value: &str) -> bool {
    if value.is_empty() {
        return false;
    }
    value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-')
}
