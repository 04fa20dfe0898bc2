//! Diagnostics sink for unexpected failures.
//!
//! # Responsibility
//! - Give build and discovery code one place to report unexpected I/O
//!   failures without aborting the surrounding pass.
//!
//! # Invariants
//! - Benign conditions (missing resource, already-open resource, scope
//!   without extensions) are never reported here.
//! - Reported messages are single-line and length-capped.

use crate::logging::sanitize_message;
use log::error;
use std::sync::{Mutex, PoisonError};

const MAX_DIAGNOSTIC_CHARS: usize = 512;

/// Receives unexpected-failure messages.
pub trait Diagnostics: Send + Sync {
    fn report(&self, message: &str);
}

/// Forwards reports to the `log` facade at error level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogDiagnostics;

impl Diagnostics for LogDiagnostics {
    fn report(&self, message: &str) {
        error!(
            "event=diagnostic module=core status=error message={}",
            sanitize_message(message, MAX_DIAGNOSTIC_CHARS)
        );
    }
}

/// Keeps every report in memory, for callers that surface them later.
#[derive(Debug, Default)]
pub struct CollectingDiagnostics {
    messages: Mutex<Vec<String>>,
}

impl CollectingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of reported messages in report order.
    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_empty(&self) -> bool {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }
}

impl Diagnostics for CollectingDiagnostics {
    fn report(&self, message: &str) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sanitize_message(message, MAX_DIAGNOSTIC_CHARS));
    }
}

#[cfg(test)]
mod tests {
    use super::{CollectingDiagnostics, Diagnostics};

    #[test]
    fn collects_sanitized_messages_in_order() {
        let diagnostics = CollectingDiagnostics::new();
        assert!(diagnostics.is_empty());

        diagnostics.report("first\nline");
        diagnostics.report("second");

        assert_eq!(diagnostics.messages(), vec!["first line", "second"]);
    }
}
