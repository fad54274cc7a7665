//! Schema declaration and derivation.
//!
//! A `RecordSchema` is an immutable, named set of optional slots. Derived
//! schemas (merge, narrow, inference) are fresh objects with their own
//! identity - a derivation never mutates its operands.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

use crate::violation::SchemaViolation;

/// Unique identifier for a declared schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaId(Uuid);

impl SchemaId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SchemaId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Semantic kind of a slot value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    /// Free text
    Text,
    /// Numeric value (stored as f64)
    Number,
    /// Boolean flag
    Boolean,
    /// Nested record of the given schema
    Record(Box<RecordSchema>),
    /// List of records of the given schema
    RecordList(Box<RecordSchema>),
}

impl FieldKind {
    /// Short human-readable label for diagnostics.
    pub fn label(&self) -> String {
        match self {
            FieldKind::Text => "text".to_string(),
            FieldKind::Number => "number".to_string(),
            FieldKind::Boolean => "boolean".to_string(),
            FieldKind::Record(schema) => format!("record<{}>", schema.name),
            FieldKind::RecordList(schema) => format!("list<{}>", schema.name),
        }
    }

    /// Structural equality, ignoring schema identity.
    ///
    /// Two kinds have the same shape when their hash representations match,
    /// so independently derived but identical nested schemas compare equal.
    pub fn same_shape(&self, other: &FieldKind) -> bool {
        self.hash_repr() == other.hash_repr()
    }

    /// Stable structural representation used for content hashing.
    fn hash_repr(&self) -> String {
        match self {
            FieldKind::Text => "text".to_string(),
            FieldKind::Number => "number".to_string(),
            FieldKind::Boolean => "boolean".to_string(),
            FieldKind::Record(schema) => format!("record({})", schema.structure_repr()),
            FieldKind::RecordList(schema) => format!("list({})", schema.structure_repr()),
        }
    }
}

/// A single named, optional slot within a record schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSlot {
    /// Slot name (unique within its schema)
    pub name: String,

    /// Semantic kind of the slot value
    pub kind: FieldKind,

    /// Optional description, forwarded to the backend as guidance
    pub description: Option<String>,
}

impl FieldSlot {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            description: None,
        }
    }

    /// Create a text slot
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Text)
    }

    /// Create a numeric slot
    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Number)
    }

    /// Create a boolean slot
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Boolean)
    }

    /// Create a nested-record slot
    pub fn record(name: impl Into<String>, schema: RecordSchema) -> Self {
        Self::new(name, FieldKind::Record(Box::new(schema)))
    }

    /// Create a record-list slot
    pub fn record_list(name: impl Into<String>, schema: RecordSchema) -> Self {
        Self::new(name, FieldKind::RecordList(Box::new(schema)))
    }

    /// Attach a description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// An immutable record schema: a named set of optional slots.
///
/// Once declared, a schema never changes. Deriving a new shape (merge,
/// narrow, inference) always produces a fresh `RecordSchema` with a new
/// `schema_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSchema {
    /// Unique identity of this declaration
    pub schema_id: SchemaId,

    /// Human-readable type name (e.g., "Email", "Invoice")
    pub name: String,

    /// The slots of this schema, in declaration order
    pub slots: Vec<FieldSlot>,

    /// SHA-256 hash of the structure (name + slots), for quick comparison
    pub content_hash: String,
}

impl RecordSchema {
    /// Declare a new schema.
    ///
    /// Rejects empty schemas and duplicate slot names.
    pub fn new(
        name: impl Into<String>,
        slots: Vec<FieldSlot>,
    ) -> Result<Self, SchemaViolation> {
        let name = name.into();
        if slots.is_empty() {
            return Err(SchemaViolation::EmptySchema { schema: name });
        }
        for (i, slot) in slots.iter().enumerate() {
            if slots[..i].iter().any(|s| s.name == slot.name) {
                return Err(SchemaViolation::DuplicateSlot {
                    schema: name,
                    slot: slot.name.clone(),
                });
            }
        }
        let content_hash = Self::compute_hash(&name, &slots);
        Ok(Self {
            schema_id: SchemaId::new(),
            name,
            slots,
            content_hash,
        })
    }

    /// Look up a slot by name
    pub fn slot(&self, name: &str) -> Option<&FieldSlot> {
        self.slots.iter().find(|s| s.name == name)
    }

    /// Check whether a slot exists
    pub fn has_slot(&self, name: &str) -> bool {
        self.slot(name).is_some()
    }

    /// Slot names in declaration order
    pub fn slot_names(&self) -> Vec<&str> {
        self.slots.iter().map(|s| s.name.as_str()).collect()
    }

    /// Merge with another schema into a fresh one (auto-named).
    ///
    /// Union of slots; this schema wins on overlap. Shared slot names with
    /// differing kinds are a conflict, not a silent override.
    pub fn merge(&self, other: &RecordSchema) -> Result<RecordSchema, SchemaViolation> {
        self.merge_named(other, format!("{}And{}", self.name, other.name))
    }

    /// Merge with an explicit name for the derived schema.
    pub fn merge_named(
        &self,
        other: &RecordSchema,
        name: impl Into<String>,
    ) -> Result<RecordSchema, SchemaViolation> {
        for slot in &self.slots {
            if let Some(theirs) = other.slot(&slot.name) {
                if !slot.kind.same_shape(&theirs.kind) {
                    return Err(SchemaViolation::SlotConflict {
                        left: self.name.clone(),
                        right: other.name.clone(),
                        slot: slot.name.clone(),
                        left_kind: slot.kind.label(),
                        right_kind: theirs.kind.label(),
                    });
                }
            }
        }

        let mut slots = self.slots.clone();
        for theirs in &other.slots {
            if !self.has_slot(&theirs.name) {
                slots.push(theirs.clone());
            }
        }
        RecordSchema::new(name, slots)
    }

    /// Project onto a subset of slots, producing a fresh narrowed schema.
    pub fn narrow(&self, keep: &[&str]) -> Result<RecordSchema, SchemaViolation> {
        let mut slots = Vec::with_capacity(keep.len());
        for name in keep {
            let slot = self
                .slot(name)
                .ok_or_else(|| SchemaViolation::NoSuchSlot {
                    schema: self.name.clone(),
                    slot: (*name).to_string(),
                })?;
            slots.push(slot.clone());
        }
        RecordSchema::new(format!("{}Projection", self.name), slots)
    }

    /// Wrapper schema with a single `items` slot holding a list of `item`
    /// records. Used as the source type of aggregate contracts.
    pub fn list_of(item: &RecordSchema) -> RecordSchema {
        let name = format!("{}List", item.name);
        let slots = vec![FieldSlot::record_list("items", item.clone())];
        let content_hash = Self::compute_hash(&name, &slots);
        Self {
            schema_id: SchemaId::new(),
            name,
            slots,
            content_hash,
        }
    }

    /// Infer a schema from a sample JSON object.
    ///
    /// String/number/boolean values map to the matching kind; objects
    /// become nested records; arrays of objects become record lists.
    /// Nulls, empty arrays and scalar arrays default to text.
    pub fn infer_from_json(
        name: impl Into<String>,
        sample: &JsonValue,
    ) -> Result<RecordSchema, SchemaViolation> {
        let name = name.into();
        let object = sample.as_object().ok_or_else(|| SchemaViolation::NotAnObject {
            schema: name.clone(),
            got: json_kind_label(sample).to_string(),
        })?;

        let mut slots = Vec::with_capacity(object.len());
        for (key, value) in object {
            slots.push(FieldSlot::new(
                key.clone(),
                Self::infer_kind(&name, key, value)?,
            ));
        }
        RecordSchema::new(name, slots)
    }

    fn infer_kind(
        parent: &str,
        key: &str,
        value: &JsonValue,
    ) -> Result<FieldKind, SchemaViolation> {
        Ok(match value {
            JsonValue::Number(_) => FieldKind::Number,
            JsonValue::Bool(_) => FieldKind::Boolean,
            JsonValue::Object(_) => {
                let nested =
                    Self::infer_from_json(format!("{}_{}", parent, key), value)?;
                FieldKind::Record(Box::new(nested))
            }
            JsonValue::Array(items) => match items.first() {
                Some(first @ JsonValue::Object(_)) => {
                    let nested =
                        Self::infer_from_json(format!("{}_{}", parent, key), first)?;
                    FieldKind::RecordList(Box::new(nested))
                }
                _ => FieldKind::Text,
            },
            // Strings, nulls and anything without a better guess
            _ => FieldKind::Text,
        })
    }

    /// Render as a JSON-Schema-style object description for the backend.
    pub fn to_json_schema(&self) -> JsonValue {
        let mut properties = serde_json::Map::new();
        for slot in &self.slots {
            properties.insert(slot.name.clone(), slot_schema(slot));
        }
        json!({
            "type": "object",
            "title": self.name,
            "properties": JsonValue::Object(properties),
        })
    }

    /// Structural representation (recursive, identity-free) for hashing.
    fn structure_repr(&self) -> String {
        let slots: Vec<String> = self
            .slots
            .iter()
            .map(|s| format!("{}:{}", s.name, s.kind.hash_repr()))
            .collect();
        format!("{}[{}]", self.name, slots.join(","))
    }

    /// Compute the content hash for a schema structure.
    fn compute_hash(name: &str, slots: &[FieldSlot]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(name.as_bytes());
        for slot in slots {
            hasher.update(slot.name.as_bytes());
            hasher.update(slot.kind.hash_repr().as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }
}

fn slot_schema(slot: &FieldSlot) -> JsonValue {
    let mut schema = match &slot.kind {
        FieldKind::Text => json!({"type": "string"}),
        FieldKind::Number => json!({"type": "number"}),
        FieldKind::Boolean => json!({"type": "boolean"}),
        FieldKind::Record(nested) => nested.to_json_schema(),
        FieldKind::RecordList(nested) => json!({
            "type": "array",
            "items": nested.to_json_schema(),
        }),
    };
    if let Some(description) = &slot.description {
        if let Some(map) = schema.as_object_mut() {
            map.insert("description".to_string(), json!(description));
        }
    }
    schema
}

/// Label for a JSON value's kind, used in violation messages.
pub(crate) fn json_kind_label(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email_schema() -> RecordSchema {
        RecordSchema::new(
            "Email",
            vec![
                FieldSlot::text("to"),
                FieldSlot::text("subject"),
                FieldSlot::text("body").with_description("Main message content"),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_create_schema() {
        let schema = email_schema();
        assert_eq!(schema.name, "Email");
        assert_eq!(schema.slots.len(), 3);
        assert!(!schema.content_hash.is_empty());
        assert!(schema.has_slot("body"));
        assert!(!schema.has_slot("cc"));
    }

    #[test]
    fn test_duplicate_slot_rejected() {
        let err = RecordSchema::new(
            "Bad",
            vec![FieldSlot::text("a"), FieldSlot::number("a")],
        )
        .unwrap_err();
        assert!(matches!(err, SchemaViolation::DuplicateSlot { .. }));
    }

    #[test]
    fn test_empty_schema_rejected() {
        let err = RecordSchema::new("Empty", vec![]).unwrap_err();
        assert!(matches!(err, SchemaViolation::EmptySchema { .. }));
    }

    #[test]
    fn test_merge_union_left_wins() {
        let a = RecordSchema::new(
            "A",
            vec![
                FieldSlot::text("shared").with_description("from A"),
                FieldSlot::text("only_a"),
            ],
        )
        .unwrap();
        let b = RecordSchema::new(
            "B",
            vec![FieldSlot::text("shared"), FieldSlot::number("only_b")],
        )
        .unwrap();

        let merged = a.merge(&b).unwrap();
        assert_eq!(merged.name, "AAndB");
        assert_eq!(merged.slots.len(), 3);
        // Left operand's slot definition wins on overlap
        assert_eq!(
            merged.slot("shared").unwrap().description.as_deref(),
            Some("from A")
        );
        // Operands untouched
        assert_eq!(a.slots.len(), 2);
        assert_eq!(b.slots.len(), 2);
        assert_ne!(merged.schema_id, a.schema_id);
    }

    #[test]
    fn test_merge_kind_conflict() {
        let a = RecordSchema::new("A", vec![FieldSlot::text("x")]).unwrap();
        let b = RecordSchema::new("B", vec![FieldSlot::number("x")]).unwrap();
        let err = a.merge(&b).unwrap_err();
        assert!(matches!(err, SchemaViolation::SlotConflict { .. }));
    }

    #[test]
    fn test_narrow() {
        let schema = email_schema();
        let narrowed = schema.narrow(&["to", "body"]).unwrap();
        assert_eq!(narrowed.slots.len(), 2);
        assert!(narrowed.has_slot("to"));
        assert!(!narrowed.has_slot("subject"));

        let err = schema.narrow(&["missing"]).unwrap_err();
        assert!(matches!(err, SchemaViolation::NoSuchSlot { .. }));
    }

    #[test]
    fn test_list_of() {
        let schema = email_schema();
        let list = RecordSchema::list_of(&schema);
        assert_eq!(list.name, "EmailList");
        assert!(matches!(
            list.slot("items").unwrap().kind,
            FieldKind::RecordList(_)
        ));
    }

    #[test]
    fn test_infer_from_json() {
        let sample = serde_json::json!({
            "title": "Q3 report",
            "pages": 12,
            "draft": false,
            "author": {"name": "Ada", "email": "ada@example.com"},
            "sections": [{"heading": "Intro"}],
            "notes": null,
        });
        let schema = RecordSchema::infer_from_json("Report", &sample).unwrap();

        assert!(matches!(schema.slot("title").unwrap().kind, FieldKind::Text));
        assert!(matches!(schema.slot("pages").unwrap().kind, FieldKind::Number));
        assert!(matches!(schema.slot("draft").unwrap().kind, FieldKind::Boolean));
        assert!(matches!(schema.slot("author").unwrap().kind, FieldKind::Record(_)));
        assert!(matches!(
            schema.slot("sections").unwrap().kind,
            FieldKind::RecordList(_)
        ));
        // Null samples default to text
        assert!(matches!(schema.slot("notes").unwrap().kind, FieldKind::Text));
    }

    #[test]
    fn test_infer_rejects_non_object() {
        let err = RecordSchema::infer_from_json("X", &serde_json::json!([1, 2])).unwrap_err();
        assert!(matches!(err, SchemaViolation::NotAnObject { .. }));
    }

    #[test]
    fn test_content_hash_is_structural() {
        let a = RecordSchema::new("T", vec![FieldSlot::text("x")]).unwrap();
        let b = RecordSchema::new("T", vec![FieldSlot::text("x")]).unwrap();
        assert_ne!(a.schema_id, b.schema_id);
        assert_eq!(a.content_hash, b.content_hash);

        let c = RecordSchema::new("T", vec![FieldSlot::number("x")]).unwrap();
        assert_ne!(a.content_hash, c.content_hash);
    }

    #[test]
    fn test_json_schema_rendering() {
        let schema = email_schema();
        let rendered = schema.to_json_schema();
        assert_eq!(rendered["type"], "object");
        assert_eq!(rendered["title"], "Email");
        assert_eq!(rendered["properties"]["to"]["type"], "string");
        assert_eq!(
            rendered["properties"]["body"]["description"],
            "Main message content"
        );
    }
}
