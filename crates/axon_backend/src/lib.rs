//! Generative Backend Adapter
//!
//! The adapter boundary between the transduction engine and whatever
//! generative model actually fills target instances. The engine treats a
//! backend as an opaque, slow, fallible collaborator:
//!
//! - **Injectable**: everything downstream takes `&dyn GenerativeBackend`,
//!   so tests run against [`MockBackend`] with zero network access
//! - **Typed failures**: a backend call either returns a structured
//!   instance or a [`BackendError`] - nothing else escapes
//! - **Retry lives here**: transient-failure retry is adapter
//!   configuration ([`http::HttpBackendConfig::max_retries`]); the engine
//!   core never retries on its own

pub mod http;
pub mod mock;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

pub use http::{HttpBackend, HttpBackendConfig};
pub use mock::{MockBackend, MockReply};

// ============================================================================
// Error Types
// ============================================================================

/// Errors surfaced by a generative backend call.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// The call did not complete within the requested timeout
    #[error("backend request timed out after {0:?}")]
    Timeout(Duration),

    /// Transport-level failure (connection refused, server error, ...)
    #[error("backend transport error: {0}")]
    Http(String),

    /// The backend answered, but not with a parseable structured instance
    #[error("malformed backend response: {0}")]
    Malformed(String),

    /// The backend explicitly declined the request
    #[error("backend refused the request: {0}")]
    Refused(String),

    /// The backend is not configured/ready to serve requests
    #[error("backend not ready: {0}")]
    NotReady(String),
}

impl BackendError {
    /// Whether a retry could plausibly succeed.
    ///
    /// Mirrors the transient/permanent split used for job errors: timeouts
    /// and transport failures are transient, refusals and malformed
    /// responses are not.
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Timeout(_) | BackendError::Http(_))
    }
}

// ============================================================================
// Request / Response Types
// ============================================================================

/// One backend invocation: a source instance, the shape it should produce,
/// and how to produce it.
#[derive(Debug, Clone)]
pub struct BackendRequest {
    /// The source instance, rendered with absent slots as null
    pub source: JsonValue,

    /// JSON-Schema-style description of the source type
    pub source_schema: JsonValue,

    /// JSON-Schema-style description of the target type to fill
    pub target_schema: JsonValue,

    /// Task instructions for the model
    pub instructions: String,

    /// Ask the backend for a structured justification alongside the instance
    pub want_explanation: bool,

    /// Per-call deadline, enforced by the adapter
    pub timeout: Duration,
}

/// A structured backend answer.
#[derive(Debug, Clone)]
pub struct BackendResponse {
    /// Candidate target instance (validated by the engine, not here)
    pub instance: JsonValue,

    /// Optional slot-level attribution: target slot -> source slots.
    /// When absent, the engine falls back to whole-instance attribution.
    pub provenance: Option<BTreeMap<String, Vec<String>>>,

    /// Optional structured justification payload
    pub explanation: Option<JsonValue>,
}

impl BackendResponse {
    /// A plain instance response
    pub fn instance(instance: JsonValue) -> Self {
        Self {
            instance,
            provenance: None,
            explanation: None,
        }
    }

    /// Attach slot-level provenance
    pub fn with_provenance(mut self, provenance: BTreeMap<String, Vec<String>>) -> Self {
        self.provenance = Some(provenance);
        self
    }

    /// Attach an explanation payload
    pub fn with_explanation(mut self, explanation: JsonValue) -> Self {
        self.explanation = Some(explanation);
        self
    }
}

// ============================================================================
// Backend Trait
// ============================================================================

/// A generative backend capable of filling a target instance from a source
/// instance and instructions.
///
/// Implementations must be thread-safe: one backend is shared read-only
/// across all concurrent batch tasks.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Adapter name for logs and diagnostics
    fn name(&self) -> &str;

    /// Whether the adapter is configured and able to serve requests
    fn is_ready(&self) -> bool {
        true
    }

    /// Execute one transduction request.
    async fn transduce(&self, request: BackendRequest)
        -> Result<BackendResponse, BackendError>;
}
