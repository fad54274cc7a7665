//! Record instances and values.
//!
//! A `Record` is a validated instance of a `RecordSchema`. A slot that is
//! not present in the value map is *absent* - first-class "no evidence",
//! distinct from an empty string or zero.

use serde_json::{Map as JsonMap, Value as JsonValue};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::schema::{json_kind_label, FieldKind, RecordSchema};
use crate::violation::SchemaViolation;

/// A concrete slot value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Number(f64),
    Boolean(bool),
    Record(Record),
    RecordList(Vec<Record>),
}

impl Value {
    /// Short label for diagnostics.
    pub fn kind_label(&self) -> String {
        match self {
            Value::Text(_) => "text".to_string(),
            Value::Number(_) => "number".to_string(),
            Value::Boolean(_) => "boolean".to_string(),
            Value::Record(r) => format!("record<{}>", r.schema().name),
            Value::RecordList(_) => "list".to_string(),
        }
    }

    /// Check conformance against a declared slot kind.
    ///
    /// Nested records compare by content hash, so structurally identical
    /// schemas conform regardless of identity.
    pub fn conforms_to(&self, kind: &FieldKind) -> bool {
        match (self, kind) {
            (Value::Text(_), FieldKind::Text) => true,
            (Value::Number(_), FieldKind::Number) => true,
            (Value::Boolean(_), FieldKind::Boolean) => true,
            (Value::Record(r), FieldKind::Record(schema)) => {
                r.schema().content_hash == schema.content_hash
            }
            (Value::RecordList(items), FieldKind::RecordList(schema)) => items
                .iter()
                .all(|r| r.schema().content_hash == schema.content_hash),
            _ => false,
        }
    }

    /// Render as JSON.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Text(s) => JsonValue::String(s.clone()),
            Value::Number(n) => serde_json::json!(n),
            Value::Boolean(b) => JsonValue::Bool(*b),
            Value::Record(r) => r.to_json(),
            Value::RecordList(items) => {
                JsonValue::Array(items.iter().map(Record::to_json).collect())
            }
        }
    }

    /// Parse a JSON value for a slot of the given kind.
    ///
    /// Returns `Ok(None)` for JSON null (absent).
    fn from_json(
        slot: &str,
        kind: &FieldKind,
        value: &JsonValue,
    ) -> Result<Option<Value>, SchemaViolation> {
        if value.is_null() {
            return Ok(None);
        }
        let mismatch = || SchemaViolation::KindMismatch {
            slot: slot.to_string(),
            expected: kind.label(),
            got: json_kind_label(value).to_string(),
        };
        match kind {
            FieldKind::Text => value
                .as_str()
                .map(|s| Some(Value::Text(s.to_string())))
                .ok_or_else(mismatch),
            FieldKind::Number => value
                .as_f64()
                .map(|n| Some(Value::Number(n)))
                .ok_or_else(mismatch),
            FieldKind::Boolean => value
                .as_bool()
                .map(|b| Some(Value::Boolean(b)))
                .ok_or_else(mismatch),
            FieldKind::Record(schema) => {
                if !value.is_object() {
                    return Err(mismatch());
                }
                let nested = Record::from_json(Arc::new((**schema).clone()), value)?;
                Ok(Some(Value::Record(nested)))
            }
            FieldKind::RecordList(schema) => {
                let items = value.as_array().ok_or_else(mismatch)?;
                let item_schema = Arc::new((**schema).clone());
                let mut records = Vec::with_capacity(items.len());
                for item in items {
                    if !item.is_object() {
                        return Err(SchemaViolation::KindMismatch {
                            slot: slot.to_string(),
                            expected: kind.label(),
                            got: format!("array of {}", json_kind_label(item)),
                        });
                    }
                    records.push(Record::from_json(item_schema.clone(), item)?);
                }
                Ok(Some(Value::RecordList(records)))
            }
        }
    }
}

/// A validated instance of a record schema.
#[derive(Debug, Clone)]
pub struct Record {
    schema: Arc<RecordSchema>,
    values: BTreeMap<String, Value>,
}

/// Structural equality: same schema shape (by content hash, not identity)
/// and same slot values.
impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.schema.content_hash == other.schema.content_hash && self.values == other.values
    }
}

impl Record {
    /// Build a record from a prepared value map, validating every entry.
    pub fn new(
        schema: Arc<RecordSchema>,
        values: BTreeMap<String, Value>,
    ) -> Result<Self, SchemaViolation> {
        for (name, value) in &values {
            let slot = schema
                .slot(name)
                .ok_or_else(|| SchemaViolation::UnknownSlot {
                    schema: schema.name.clone(),
                    slot: name.clone(),
                })?;
            if !value.conforms_to(&slot.kind) {
                return Err(SchemaViolation::KindMismatch {
                    slot: name.clone(),
                    expected: slot.kind.label(),
                    got: value.kind_label(),
                });
            }
        }
        Ok(Self { schema, values })
    }

    /// A record with every slot absent.
    pub fn empty(schema: Arc<RecordSchema>) -> Self {
        Self {
            schema,
            values: BTreeMap::new(),
        }
    }

    /// Start building a record slot by slot.
    pub fn builder(schema: Arc<RecordSchema>) -> RecordBuilder {
        RecordBuilder {
            schema,
            values: BTreeMap::new(),
        }
    }

    /// Parse and validate a JSON object against the schema.
    ///
    /// Missing and null slots become absent; unknown slots and kind
    /// mismatches are violations.
    pub fn from_json(
        schema: Arc<RecordSchema>,
        value: &JsonValue,
    ) -> Result<Self, SchemaViolation> {
        let object = value.as_object().ok_or_else(|| SchemaViolation::NotAnObject {
            schema: schema.name.clone(),
            got: json_kind_label(value).to_string(),
        })?;

        let mut values = BTreeMap::new();
        for (key, raw) in object {
            let slot = schema
                .slot(key)
                .ok_or_else(|| SchemaViolation::UnknownSlot {
                    schema: schema.name.clone(),
                    slot: key.clone(),
                })?;
            if let Some(parsed) = Value::from_json(key, &slot.kind, raw)? {
                values.insert(key.clone(), parsed);
            }
        }
        Ok(Self { schema, values })
    }

    /// Best-effort parse: unknown slots are dropped, non-conforming values
    /// become absent. Never invents values, never fails on an object.
    ///
    /// Non-object payloads produce a fully absent record.
    pub fn from_json_lossy(schema: Arc<RecordSchema>, value: &JsonValue) -> Self {
        let mut values = BTreeMap::new();
        if let Some(object) = value.as_object() {
            for (key, raw) in object {
                if let Some(slot) = schema.slot(key) {
                    if let Ok(Some(parsed)) = Value::from_json(key, &slot.kind, raw) {
                        values.insert(key.clone(), parsed);
                    }
                }
            }
        }
        Self { schema, values }
    }

    /// The schema this instance conforms to.
    pub fn schema(&self) -> &Arc<RecordSchema> {
        &self.schema
    }

    /// Get a slot value, if present.
    pub fn get(&self, slot: &str) -> Option<&Value> {
        self.values.get(slot)
    }

    /// Get a text slot, if present and textual.
    pub fn text(&self, slot: &str) -> Option<&str> {
        match self.values.get(slot) {
            Some(Value::Text(s)) => Some(s),
            _ => None,
        }
    }

    /// Get a numeric slot, if present and numeric.
    pub fn number(&self, slot: &str) -> Option<f64> {
        match self.values.get(slot) {
            Some(Value::Number(n)) => Some(*n),
            _ => None,
        }
    }

    /// Get a boolean slot, if present and boolean.
    pub fn boolean(&self, slot: &str) -> Option<bool> {
        match self.values.get(slot) {
            Some(Value::Boolean(b)) => Some(*b),
            _ => None,
        }
    }

    /// Whether a slot holds a value.
    pub fn is_present(&self, slot: &str) -> bool {
        self.values.contains_key(slot)
    }

    /// Names of the slots that hold a value.
    pub fn present_slots(&self) -> BTreeSet<String> {
        self.values.keys().cloned().collect()
    }

    /// Fraction of declared slots that hold a value (0.0 - 1.0).
    pub fn fill_ratio(&self) -> f64 {
        if self.schema.slots.is_empty() {
            return 0.0;
        }
        self.values.len() as f64 / self.schema.slots.len() as f64
    }

    /// Render as a JSON object. Every declared slot is emitted; absent
    /// slots render as null so consumers see the full shape.
    pub fn to_json(&self) -> JsonValue {
        let mut object = JsonMap::new();
        for slot in &self.schema.slots {
            let rendered = match self.values.get(&slot.name) {
                Some(value) => value.to_json(),
                None => JsonValue::Null,
            };
            object.insert(slot.name.clone(), rendered);
        }
        JsonValue::Object(object)
    }

    /// Merge two instances into an instance of the merged schema.
    ///
    /// This record wins on slot overlap; the operands are untouched.
    pub fn merge(&self, other: &Record) -> Result<Record, SchemaViolation> {
        let merged_schema = Arc::new(self.schema.merge(&other.schema)?);
        let mut values = self.values.clone();
        for (name, value) in &other.values {
            values.entry(name.clone()).or_insert_with(|| value.clone());
        }
        Record::new(merged_schema, values)
    }
}

/// Slot-by-slot record construction; validation happens at `build`.
pub struct RecordBuilder {
    schema: Arc<RecordSchema>,
    values: BTreeMap<String, Value>,
}

impl RecordBuilder {
    /// Set a raw value
    pub fn value(mut self, slot: impl Into<String>, value: Value) -> Self {
        self.values.insert(slot.into(), value);
        self
    }

    /// Set a text slot
    pub fn text(self, slot: impl Into<String>, value: impl Into<String>) -> Self {
        self.value(slot, Value::Text(value.into()))
    }

    /// Set a numeric slot
    pub fn number(self, slot: impl Into<String>, value: f64) -> Self {
        self.value(slot, Value::Number(value))
    }

    /// Set a boolean slot
    pub fn boolean(self, slot: impl Into<String>, value: bool) -> Self {
        self.value(slot, Value::Boolean(value))
    }

    /// Set a nested-record slot
    pub fn record(self, slot: impl Into<String>, value: Record) -> Self {
        self.value(slot, Value::Record(value))
    }

    /// Set a record-list slot
    pub fn record_list(self, slot: impl Into<String>, items: Vec<Record>) -> Self {
        self.value(slot, Value::RecordList(items))
    }

    /// Validate and produce the record.
    pub fn build(self) -> Result<Record, SchemaViolation> {
        Record::new(self.schema, self.values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldSlot;

    fn email_schema() -> Arc<RecordSchema> {
        Arc::new(
            RecordSchema::new(
                "Email",
                vec![
                    FieldSlot::text("to"),
                    FieldSlot::text("subject"),
                    FieldSlot::text("body"),
                ],
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_builder_and_accessors() {
        let record = Record::builder(email_schema())
            .text("to", "Lisa")
            .text("body", "progress update")
            .build()
            .unwrap();

        assert_eq!(record.text("to"), Some("Lisa"));
        assert_eq!(record.text("subject"), None);
        assert!(record.is_present("body"));
        assert!(!record.is_present("subject"));
        assert_eq!(
            record.present_slots(),
            ["body", "to"].iter().map(|s| s.to_string()).collect()
        );
    }

    #[test]
    fn test_builder_rejects_unknown_slot() {
        let err = Record::builder(email_schema())
            .text("cc", "nobody")
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaViolation::UnknownSlot { .. }));
    }

    #[test]
    fn test_builder_rejects_kind_mismatch() {
        let err = Record::builder(email_schema())
            .number("to", 42.0)
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaViolation::KindMismatch { .. }));
    }

    #[test]
    fn test_from_json_absent_vs_null() {
        let schema = email_schema();
        let record = Record::from_json(
            schema,
            &serde_json::json!({"to": "Lisa", "subject": null}),
        )
        .unwrap();

        // Null and missing both mean absent
        assert!(record.is_present("to"));
        assert!(!record.is_present("subject"));
        assert!(!record.is_present("body"));
    }

    #[test]
    fn test_from_json_unknown_slot_is_violation() {
        let err = Record::from_json(email_schema(), &serde_json::json!({"cc": "x"}))
            .unwrap_err();
        assert!(matches!(err, SchemaViolation::UnknownSlot { .. }));
    }

    #[test]
    fn test_from_json_non_object_is_violation() {
        let err = Record::from_json(email_schema(), &serde_json::json!("just text"))
            .unwrap_err();
        assert!(matches!(err, SchemaViolation::NotAnObject { .. }));
    }

    #[test]
    fn test_from_json_lossy_drops_bad_slots() {
        let schema = email_schema();
        let record = Record::from_json_lossy(
            schema,
            &serde_json::json!({"to": "Lisa", "subject": 99, "cc": "dropped"}),
        );
        assert_eq!(record.text("to"), Some("Lisa"));
        assert!(!record.is_present("subject"));
        assert!(!record.is_present("cc"));
    }

    #[test]
    fn test_to_json_emits_absent_as_null() {
        let record = Record::builder(email_schema())
            .text("to", "Lisa")
            .build()
            .unwrap();
        let json = record.to_json();
        assert_eq!(json["to"], "Lisa");
        assert!(json["subject"].is_null());
        assert!(json["body"].is_null());
    }

    #[test]
    fn test_nested_record_validation() {
        let author = RecordSchema::new("Author", vec![FieldSlot::text("name")]).unwrap();
        let post = Arc::new(
            RecordSchema::new(
                "Post",
                vec![
                    FieldSlot::text("title"),
                    FieldSlot::record("author", author.clone()),
                    FieldSlot::record_list("reviewers", author),
                ],
            )
            .unwrap(),
        );

        let record = Record::from_json(
            post.clone(),
            &serde_json::json!({
                "title": "Hello",
                "author": {"name": "Ada"},
                "reviewers": [{"name": "Grace"}, {"name": "Edsger"}],
            }),
        )
        .unwrap();

        match record.get("reviewers") {
            Some(Value::RecordList(items)) => assert_eq!(items.len(), 2),
            other => panic!("expected record list, got {:?}", other),
        }

        // Scalar where a nested record is declared
        let err = Record::from_json(post, &serde_json::json!({"author": "Ada"}))
            .unwrap_err();
        assert!(matches!(err, SchemaViolation::KindMismatch { .. }));
    }

    #[test]
    fn test_instance_merge() {
        let a_schema = Arc::new(
            RecordSchema::new(
                "Profile",
                vec![FieldSlot::text("name"), FieldSlot::text("city")],
            )
            .unwrap(),
        );
        let b_schema = Arc::new(
            RecordSchema::new(
                "Contact",
                vec![FieldSlot::text("name"), FieldSlot::text("email")],
            )
            .unwrap(),
        );

        let a = Record::builder(a_schema)
            .text("name", "Ada")
            .text("city", "London")
            .build()
            .unwrap();
        let b = Record::builder(b_schema)
            .text("name", "Lovelace")
            .text("email", "ada@example.com")
            .build()
            .unwrap();

        let merged = a.merge(&b).unwrap();
        assert_eq!(merged.schema().name, "ProfileAndContact");
        // Left instance wins on overlap
        assert_eq!(merged.text("name"), Some("Ada"));
        assert_eq!(merged.text("email"), Some("ada@example.com"));
    }

    #[test]
    fn test_fill_ratio() {
        let schema = email_schema();
        let empty = Record::empty(schema.clone());
        assert_eq!(empty.fill_ratio(), 0.0);

        let partial = Record::builder(schema)
            .text("to", "Lisa")
            .text("body", "update")
            .build()
            .unwrap();
        assert!((partial.fill_ratio() - 2.0 / 3.0).abs() < 1e-9);
    }
}
