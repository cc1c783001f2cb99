//! Error taxonomy for binding setup and marshal/unmarshal calls.
//!
//! One tagged error type carries a stable numeric code plus enough context
//! (class name, path string, schema type) to localize the fault without a
//! debugger. Setup-time errors are fatal to binding construction; per-call
//! errors propagate to the caller with no partial retry.

use thiserror::Error;

use crate::value::Value;

/// All failures surfaced by the binding engine.
#[derive(Debug, Error)]
pub enum BindError {
    /// A required argument was null/absent at a public entry point.
    #[error("error 25001: argument '{0}' must not be null")]
    NullArgument(&'static str),

    /// A field path string does not conform to the path grammar.
    /// Fatal to binding construction.
    #[error("error 25002: invalid path expression '{path}': {reason}")]
    PathCompilation { path: String, reason: String },

    /// No type descriptor is registered for the named class.
    #[error("error 25003: no descriptor found for class '{class}'")]
    DescriptorNotFound { class: String },

    /// A prefixed name could not be resolved: either no namespace resolver
    /// is available, or the prefix has no binding in it.
    #[error("error 25004: namespace resolution failed for '{name}': {reason}")]
    NamespaceResolution { name: String, reason: String },

    /// No schema-type/host-type conversion exists, or every schema type of a
    /// union field was tried and failed (the last attempt's detail is kept).
    #[error("error 25005: cannot convert {value} to {target}")]
    UnsupportedConversion { value: String, target: String },

    /// Schema validation failure. Routed through the installed error handler
    /// by the validator rather than raised directly.
    #[error("error 25006: validation failed for class '{class}': {reason}")]
    Validation { class: String, reason: String },

    /// The input document is not well-formed XML.
    #[error("error 25007: malformed document at byte {offset}: {reason}")]
    MalformedDocument { reason: String, offset: usize },

    /// An I/O failure on a byte-stream sink.
    #[error("error 25008: output error: {0}")]
    Io(#[from] std::io::Error),
}

impl BindError {
    /// Stable numeric code, also embedded in the display form.
    pub fn code(&self) -> u16 {
        match self {
            BindError::NullArgument(_) => 25001,
            BindError::PathCompilation { .. } => 25002,
            BindError::DescriptorNotFound { .. } => 25003,
            BindError::NamespaceResolution { .. } => 25004,
            BindError::UnsupportedConversion { .. } => 25005,
            BindError::Validation { .. } => 25006,
            BindError::MalformedDocument { .. } => 25007,
            BindError::Io(_) => 25008,
        }
    }
}

/// Outcome chosen by an [`ErrorHandler`] for a recoverable failure.
#[derive(Debug, Clone)]
pub enum ErrorResolution {
    /// Propagate the error to the caller.
    Rethrow,
    /// Attempt the failed conversion once more, then propagate on failure.
    Retry,
    /// Use the given value in place of the one that failed to convert.
    Substitute(Value),
}

/// Caller-installed sink consulted when a field value fails to convert or a
/// validation event is reported. The default behavior is [`ErrorResolution::Rethrow`].
pub trait ErrorHandler: Send + Sync {
    fn handle(&self, error: &BindError) -> ErrorResolution;
}

/// Handler that always rethrows. Installed when the caller supplies none.
#[derive(Debug, Default, Clone, Copy)]
pub struct RethrowHandler;

impl ErrorHandler for RethrowHandler {
    fn handle(&self, _error: &BindError) -> ErrorResolution {
        ErrorResolution::Rethrow
    }
}
