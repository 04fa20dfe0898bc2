//! Code-loading scopes and resource resolution.
//!
//! # Responsibility
//! - Model what a scope's loader can see (directories and archives).
//! - Resolve a relative resource path into openable roots per scope.
//! - Hold the caller-owned, ordered set of plugin scopes.
//!
//! # Invariants
//! - A plugin scope's own resources are resolved separately from the
//!   aggregate host view, so entries are never attributed across scopes.
//! - Missing resources resolve to zero roots, never to an error.

pub mod loader;
pub mod locator;
pub mod registry;
