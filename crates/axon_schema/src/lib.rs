//! Record Schema System
//!
//! # Philosophy: absence is a value, violations are failures
//!
//! Every slot in a record schema is optional. A missing slot means
//! "no evidence for this field" and is distinct from a present-but-empty
//! value. Everything else is strict:
//!
//! 1. **Declaration**: a schema is built once, validated, and never mutated
//! 2. **Derivation**: merge/narrow/inference produce *new* schemas with
//!    their own identity - existing schemas are never edited in place
//! 3. **Enforcement**: an instance either conforms to its schema or it is
//!    rejected. No guessing. No coercion on the strict path.
//!
//! # Modules
//!
//! - [`schema`]: schema declaration and derivation (`RecordSchema`,
//!   `FieldSlot`, `FieldKind`)
//! - [`record`]: instances and values (`Record`, `Value`, `RecordBuilder`)
//! - [`violation`]: the violation taxonomy (`SchemaViolation`)

pub mod record;
pub mod schema;
pub mod violation;

pub use record::{Record, RecordBuilder, Value};
pub use schema::{FieldKind, FieldSlot, RecordSchema, SchemaId};
pub use violation::SchemaViolation;

/// Validate a raw JSON value against a schema without keeping the instance.
///
/// Pure check: accepts missing or null slots as absent, rejects unknown
/// slots and kind mismatches.
pub fn validate(
    schema: &std::sync::Arc<RecordSchema>,
    value: &serde_json::Value,
) -> Result<(), SchemaViolation> {
    Record::from_json(schema.clone(), value).map(|_| ())
}
