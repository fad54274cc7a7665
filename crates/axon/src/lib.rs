//! Axon: typed, evidence-tracked transduction of structured records.
//!
//! A *transduction* maps instances of one record type into instances of
//! another - either with local deterministic logic or by delegating to a
//! generative backend - under three guarantees:
//!
//! - **Totality**: a valid input yields a valid, validated output or a
//!   typed error; nothing partially populated escapes
//! - **Local evidence**: every present output slot is linked to the input
//!   slots that justified it; provenance stays transitive across
//!   composed contracts
//! - **Scale without compromise**: the batch executor runs contracts over
//!   collections with bounded concurrency, positional ordering, per-element
//!   failure isolation and cooperative cancellation
//!
//! ```no_run
//! use axon::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let input = Arc::new(RecordSchema::new(
//!     "GenericInput",
//!     vec![FieldSlot::text("content")],
//! )?);
//! let email = Arc::new(RecordSchema::new(
//!     "Email",
//!     vec![FieldSlot::text("to"), FieldSlot::text("subject"), FieldSlot::text("body")],
//! )?);
//!
//! let write_email = derive(&email)
//!     << With::new(&input, "Write an email about the provided content.");
//!
//! let backend = HttpBackend::from_env().expect("backend configured");
//! let source = Record::builder(input).text("content", "release shipped").build()?;
//! let result = write_email.apply(&backend, &source).await?;
//! println!("{}", result.record.to_json());
//! # Ok(())
//! # }
//! ```

pub mod config;

pub use config::AxonConfig;

/// The working vocabulary, one import away.
pub mod prelude {
    pub use crate::config::AxonConfig;

    pub use axon_schema::{
        validate, FieldKind, FieldSlot, Record, RecordBuilder, RecordSchema, SchemaId,
        SchemaViolation, Value,
    };

    pub use axon_engine::{
        derive, explanation_schema, ContractId, Derive, EvidenceGraph, EvidenceLink, Mode,
        Route, Transduction, TransductionError, TransductionOptions, TransductionResult, With,
    };

    pub use axon_backend::{
        BackendError, BackendRequest, BackendResponse, GenerativeBackend, HttpBackend,
        HttpBackendConfig, MockBackend, MockReply,
    };

    pub use axon_batch::{
        map, reduce, reduce_windowed, BatchResult, CancellationToken, ExecutionPolicy, Outcome,
    };

    pub use axon_logging::{init_logging, LogConfig};
}
