//! Index resource format and per-root reading.
//!
//! # Responsibility
//! - Define the persisted line format shared by build time and run time.
//! - Decode physical index resources into deduplicated buckets.
//! - Hold the scope-keyed result shape returned by discovery.
//!
//! # Invariants
//! - Decoding is total: malformed lines degrade to "no entry", never an error.
//! - Buckets have set semantics; duplicates across files collapse silently.

pub mod codec;
pub mod model;
pub mod reader;
