//! Error types for merge inspection.
//!
//! Two kinds of failure leave the engine: usage errors (bad configuration,
//! join primitive errors, calls made in the wrong state) and diagnostic
//! failures, which carry the complete report so callers can inspect every
//! metric even when the merge is rejected.

use thiserror::Error;

use crate::inspection::{ErrorFlag, InspectionState, MergeReport};
use crate::join::JoinError;

/// Main error type for mergesurveyor operations.
#[derive(Debug, Error)]
pub enum MergeInspectError {
    /// Invalid configuration or input shape
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Error raised by the join primitive, passed through unchanged
    #[error(transparent)]
    Join(#[from] JoinError),

    /// The report was requested before the merge was evaluated
    #[error("Report not available: the merge has not been evaluated yet")]
    ReportNotReady,

    /// An operation was called in a state that does not allow it
    #[error("Invalid inspector state: cannot perform merge from state {state}")]
    InvalidState { state: InspectionState },

    /// One or more flags listed in `raise_on_errors` evaluated to true
    #[error(transparent)]
    Diagnostic(Box<MergeDiagnosticFailure>),

    /// Serialization or deserialization failed
    #[error("Serialization failed: {context}")]
    Serialization {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Convenience type alias for Results with `MergeInspectError`
pub type Result<T> = std::result::Result<T, MergeInspectError>;

/// Structured failure raised when a configured error flag fires.
///
/// The joined dataset is not handed back on this path; the full report is.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct MergeDiagnosticFailure {
    /// Human-readable summary followed by the full report
    pub message: String,
    /// Flags from the raise-set that evaluated to true, in report order
    pub triggered: Vec<ErrorFlag>,
    /// The complete report
    pub report: MergeReport,
}

impl MergeDiagnosticFailure {
    /// Builds the failure for the given triggered flags.
    pub fn new(triggered: Vec<ErrorFlag>, report: MergeReport) -> Self {
        let flags = triggered
            .iter()
            .map(|flag| format!("{} is true", flag))
            .collect::<Vec<_>>()
            .join("; ");

        let message = format!(
            "Errors detected during merge analysis:\n{}\n\nFull Report:\n{}",
            flags, report
        );

        Self {
            message,
            triggered,
            report,
        }
    }
}

impl MergeInspectError {
    /// Creates a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a serialization error with context
    pub fn serialization(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Serialization {
            context: context.into(),
            source,
        }
    }

    /// Wraps a diagnostic failure.
    pub fn diagnostic(failure: MergeDiagnosticFailure) -> Self {
        Self::Diagnostic(Box::new(failure))
    }

    /// Returns the report attached to a diagnostic failure, if any.
    pub fn report(&self) -> Option<&MergeReport> {
        match self {
            Self::Diagnostic(failure) => Some(&failure.report),
            _ => None,
        }
    }

    /// True for usage errors, false for diagnostic failures.
    pub fn is_usage_error(&self) -> bool {
        !matches!(self, Self::Diagnostic(_))
    }
}
