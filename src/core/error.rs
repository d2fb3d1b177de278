use thiserror::Error;

use super::keys::{BookKey, CommunicationType, ReportState};

/// Errors raised by the SII report workflow, the invoice mapper and the gateway.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SiiError {
    /// Unsupported book / operation-type combination. Never retried.
    #[error("configuration error: no SII operation for book {book:?} with {operation:?}")]
    Configuration {
        book: BookKey,
        operation: CommunicationType,
    },

    /// Other configuration problems (endpoints, credentials, versions).
    #[error("configuration error: {0}")]
    Config(String),

    /// The report state machine has no such edge.
    #[error("invalid report transition from {from} to {to}")]
    InvalidTransition { from: ReportState, to: ReportState },

    /// A report field cannot be changed in the current state.
    #[error("field '{0}' is read-only in the current report state")]
    ReadOnly(&'static str),

    /// The invoice lacks data required by the AEAT schema.
    #[error("mapping error on invoice {invoice}: {message}")]
    Mapping { invoice: String, message: String },

    /// Transport, SOAP fault or schema error reported by the gateway.
    #[error("AEAT gateway error: {0}")]
    Gateway(String),

    /// The operator asked for something the workflow forbids.
    #[error("{0}")]
    Workflow(String),

    /// Dismissible warning: retry with the key acknowledged to proceed.
    #[error("warning [{key}]: {message}")]
    Warning { key: String, message: String },

    /// A referenced record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// One or more validation rules failed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// XML generation or parsing error.
    #[error("XML error: {0}")]
    Xml(String),
}

impl SiiError {
    pub(crate) fn mapping(invoice: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Mapping {
            invoice: invoice.into(),
            message: message.into(),
        }
    }

    /// True for [`SiiError::Warning`], which the caller may acknowledge.
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::Warning { .. })
    }
}

/// A single validation error with field path and message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dot-separated path to the invalid field (e.g. "lines[2].invoice").
    pub field: String,
    /// Human-readable error description.
    pub message: String,
    /// AEAT error code when the rule mirrors a server-side check (e.g. "1100").
    pub rule: Option<String>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(rule) = &self.rule {
            write!(f, "[{}] {}: {}", rule, self.field, self.message)
        } else {
            write!(f, "{}: {}", self.field, self.message)
        }
    }
}

impl ValidationError {
    /// Create a validation error without a rule code.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            rule: None,
        }
    }

    /// Create a validation error carrying an AEAT rule code.
    pub fn with_rule(
        field: impl Into<String>,
        message: impl Into<String>,
        rule: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            rule: Some(rule.into()),
        }
    }
}

/// Join a list of validation errors into one [`SiiError::Validation`].
pub fn validation_failure(errors: &[ValidationError]) -> SiiError {
    let msg = errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ");
    SiiError::Validation(msg)
}
