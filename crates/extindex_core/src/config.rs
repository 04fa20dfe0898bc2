//! Index settings shared by the build-time writer and the runtime finder.
//!
//! # Invariants
//! - Writer and finder must agree on `layout`, or discovery finds nothing.
//! - `header` is always a single line that the index codec reads as
//!   nothing, so it is never read back as an entry.

use crate::index::codec::parse_line;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Relative path of the single-file index.
pub const LEGACY_INDEX_RESOURCE: &str = "META-INF/extensions.idx";
/// Relative directory holding one index file per extension point.
pub const SERVICE_PROVIDER_INDEX_DIR: &str = "META-INF/services";
/// Header written as the first line of every index file.
pub const DEFAULT_HEADER: &str = "# Generated by extindex";

/// Physical layout of the index resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageLayout {
    /// One file; every group is flattened into it.
    #[default]
    Legacy,
    /// One file per extension-point key under a fixed directory.
    ServiceProvider,
}

impl StorageLayout {
    /// Relative path the finder resolves through each scope's loader.
    pub fn resource_path(self) -> &'static str {
        match self {
            Self::Legacy => LEGACY_INDEX_RESOURCE,
            Self::ServiceProvider => SERVICE_PROVIDER_INDEX_DIR,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Legacy => "legacy",
            Self::ServiceProvider => "service_provider",
        }
    }
}

/// Settings for writing and discovering extension indexes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    pub layout: StorageLayout,
    /// Generator header line; must be a comment line.
    pub header: String,
    /// Reads plugin scopes on scoped worker threads when set.
    pub parallel_discovery: bool,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            layout: StorageLayout::default(),
            header: DEFAULT_HEADER.to_string(),
            parallel_discovery: false,
        }
    }
}

impl IndexSettings {
    pub fn with_layout(mut self, layout: StorageLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Validates settings invariants.
    ///
    /// The header is checked with the same line normalizer the reader uses,
    /// so whatever passes here is ignored on read.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.header.contains(['\n', '\r']) {
            return Err(SettingsError::MultiLineHeader);
        }
        if parse_line(&self.header).is_some() {
            return Err(SettingsError::HeaderNotComment(self.header.clone()));
        }
        Ok(())
    }

    pub fn resource_path(&self) -> &'static str {
        self.layout.resource_path()
    }
}

/// Settings validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    HeaderNotComment(String),
    MultiLineHeader,
}

impl Display for SettingsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HeaderNotComment(value) => {
                write!(f, "index header must be a comment line: {value:?}")
            }
            Self::MultiLineHeader => write!(f, "index header must be a single line"),
        }
    }
}

impl Error for SettingsError {}
