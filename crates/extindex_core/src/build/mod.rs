//! Build-time index production.
//!
//! # Responsibility
//! - Give build code guarded access to resources under a build output root.
//! - Persist classifier output as index resources, and read a previous
//!   index back for incremental builds.
//!
//! # Invariants
//! - Benign filer conditions (missing, already opened, cycle closed) never
//!   reach diagnostics and never abort the build.
//! - Every other I/O failure is reported and the build continues.

pub mod filer;
pub mod processor;
pub mod storage;
