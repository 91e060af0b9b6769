//! Error types for ntup

use thiserror::Error;

/// ntup error type.
///
/// Every failure is either a fatal construction-time rejection or an
/// uncaught propagation from the per-row filler callback; nothing in this
/// workspace retries.
#[derive(Error, Debug)]
pub enum TreeError {
    /// A declaration is not a recognized variable type, a name collides
    /// with another field, or a declaration string does not parse.
    /// Raised while compiling the schema, fatal to construction.
    #[error("schema error: {0}")]
    Schema(String),

    /// Sink name mismatch when reusing a compiled layout against an
    /// external sink. Fatal, raised before any mutation, never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Propagated verbatim from the filler callback. The row is not
    /// committed and the row cursor is not advanced; the caller decides
    /// abort-vs-continue.
    #[error("filler callback failed: {0}")]
    Callback(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Operation against a sink that has already been destroyed.
    #[error("resource error: {0}")]
    Resource(String),

    /// Per-row consistency violation caught at fill or commit time:
    /// unknown field, type mismatch on a slot, or an array index/counter
    /// beyond the declared capacity.
    #[error("fill error: {0}")]
    Fill(String),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, TreeError>;
