use thiserror::Error;

/// Engine-level failures. Every variant leaves the row store in its
/// last-known-good state; none is treated as globally fatal by callers.
#[derive(Debug, Error)]
pub enum PicklistError {
    /// CSV structurally invalid: missing identity column, too few lines,
    /// or an update with no valid rows. Surfaced verbatim, operation aborted.
    #[error("{0}")]
    Format(String),
    /// A computed-column definition was rejected at authoring time.
    #[error("{0}")]
    Validation(String),
    /// Persisted state could not be read or written. Logged and reported;
    /// in-memory state remains authoritative.
    #[error("{0}")]
    Persistence(String),
}

/// A single row's formula evaluation failed. Callers degrade this to an
/// unset cell; it never aborts a batch.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ComputeError(pub String);
