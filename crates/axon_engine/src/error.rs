//! Transduction error taxonomy.
//!
//! Every failure a contract can produce is one of these variants - a valid
//! input yields either a valid target instance or one of them, never an
//! unhandled fault.

use axon_backend::BackendError;
use axon_schema::SchemaViolation;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TransductionError>;

#[derive(Debug, Clone, Error)]
pub enum TransductionError {
    /// Input or output instance does not conform to its declared schema
    #[error("validation failed: {0}")]
    Validation(#[from] SchemaViolation),

    /// The delegated backend call failed
    #[error("backend failure: {0}")]
    Backend(#[from] BackendError),

    /// An intermediate stage of a composed contract produced output the
    /// next stage cannot accept. Always fatal to that single call.
    #[error("composition failed entering stage '{stage}': {violation}")]
    Composition {
        stage: String,
        violation: SchemaViolation,
    },

    /// An algorithmic mapping reported a domain failure of its own
    #[error("mapping failed: {0}")]
    Mapping(String),
}

impl TransductionError {
    /// Whether this failure came from the backend (as opposed to a local
    /// validation or composition problem).
    pub fn is_backend(&self) -> bool {
        matches!(self, TransductionError::Backend(_))
    }
}
