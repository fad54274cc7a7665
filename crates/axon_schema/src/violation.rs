//! Schema violation taxonomy.
//!
//! A violation is a FAILURE, not a warning. Instances that do not conform
//! to their declared schema are rejected before anything downstream can
//! observe them.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A schema contract violation.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "violation", rename_all = "snake_case")]
pub enum SchemaViolation {
    /// Instance carries a slot the schema does not declare
    #[error("unknown slot '{slot}' for schema '{schema}'")]
    UnknownSlot { schema: String, slot: String },

    /// Value kind does not match the declared slot kind
    #[error("slot '{slot}' expects {expected}, got {got}")]
    KindMismatch {
        slot: String,
        expected: String,
        got: String,
    },

    /// Schema declares the same slot name twice
    #[error("duplicate slot '{slot}' in schema '{schema}'")]
    DuplicateSlot { schema: String, slot: String },

    /// Schema declares no slots at all
    #[error("schema '{schema}' declares no slots")]
    EmptySchema { schema: String },

    /// Instance payload is not a JSON object
    #[error("expected a JSON object for schema '{schema}', got {got}")]
    NotAnObject { schema: String, got: String },

    /// Two schemas cannot be merged because a shared slot disagrees on kind
    #[error(
        "cannot merge '{left}' and '{right}': slot '{slot}' is {left_kind} vs {right_kind}"
    )]
    SlotConflict {
        left: String,
        right: String,
        slot: String,
        left_kind: String,
        right_kind: String,
    },

    /// Projection references a slot the schema does not have
    #[error("schema '{schema}' has no slot '{slot}' to project")]
    NoSuchSlot { schema: String, slot: String },

    /// Instance was built against a different schema than expected
    #[error("instance belongs to schema '{got}', expected '{expected}'")]
    SchemaMismatch { expected: String, got: String },
}
