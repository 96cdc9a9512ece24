//! The result shape every user-facing deck operation returns.

use serde::{Deserialize, Serialize};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The outcome of an operation, as shown to the user.
///
/// `hints` are advisory commands (usually the engine-equivalent of what deck just did, or a way
/// to fix what went wrong). They are meant to be printed, not parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationReport {
    /// Whether the operation achieved what was asked.
    pub success: bool,

    /// A human-readable description of what happened.
    pub message: String,

    /// Follow-up commands the user may want to run.
    pub hints: Vec<String>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl OperationReport {
    /// Creates a successful report.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            hints: Vec::new(),
        }
    }

    /// Creates a failed report.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            hints: Vec::new(),
        }
    }

    /// Appends a hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hints.push(hint.into());
        self
    }

    /// Appends several hints.
    pub fn with_hints(mut self, hints: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.hints.extend(hints.into_iter().map(Into::into));
        self
    }
}
