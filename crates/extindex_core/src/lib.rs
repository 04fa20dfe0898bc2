//! Extension index core.
//!
//! Build time writes a small text index of extension entries into a build
//! output; run time finds every copy of that index visible to the host and
//! to each plugin scope, and merges them into one bucket per scope.

pub mod build;
pub mod config;
pub mod diagnostics;
pub mod finder;
pub mod index;
pub mod logging;
pub mod scope;

pub use build::filer::{Filer, FilerError};
pub use build::processor::{ExtensionClassifier, IndexProcessor, StaticClassifier};
pub use build::storage::{IndexStorage, SkipReason, WriteOutcome};
pub use config::{IndexSettings, SettingsError, StorageLayout};
pub use diagnostics::{CollectingDiagnostics, Diagnostics, LogDiagnostics};
pub use finder::ExtensionFinder;
pub use index::model::{Bucket, Entry, ExtensionGroups, ExtensionIndex, ScopeKey};
pub use logging::{default_log_level, init_logging, logging_status, LogTarget};
pub use scope::loader::{ClassPath, ClassPathEntry, ResourceLoader, ResourceLocation};
pub use scope::locator::{Root, ScopeResourceLocator, Visibility};
pub use scope::registry::{ScopeRegistry, ScopeRegistryError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
