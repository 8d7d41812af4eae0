//! Pass-scoped diagnostics
//!
//! Every message is recorded in the pass report and mirrored to `tracing`
//! so hosts can route it through their own subscriber.

use tracing::{debug, error, info, warn};

/// Diagnostic severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
}

/// A single recorded message
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
}

/// Collected diagnostics for one pass
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn debug(&mut self, message: impl Into<String>) {
        let message = message.into();
        debug!(target: "latchkey", "{message}");
        self.push(Severity::Debug, message);
    }

    pub fn info(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!(target: "latchkey", "{message}");
        self.push(Severity::Info, message);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!(target: "latchkey", "{message}");
        self.push(Severity::Warning, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        error!(target: "latchkey", "{message}");
        self.push(Severity::Error, message);
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn into_entries(self) -> Vec<Diagnostic> {
        self.entries
    }

    fn push(&mut self, severity: Severity, message: String) {
        self.entries.push(Diagnostic { severity, message });
    }
}
