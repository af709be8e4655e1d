//! Hierarchical document model shared by every `BaseDocumentStore` backend.
//!
//! Paths alternate collection and document segments:
//! `rooms/{room}/instances/{instance}/messages/{message}`.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

use crate::common::timestamps::to_store_timestamp;

pub const ROOMS: &str = "rooms";
pub const INSTANCES: &str = "instances";
pub const MESSAGES: &str = "messages";

// =============================================================================
// Paths
// =============================================================================

/// Path to a collection (odd number of segments).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionPath(Vec<String>);

/// Path to a single document (even number of segments).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentPath(Vec<String>);

impl CollectionPath {
    pub fn rooms() -> Self {
        Self(vec![ROOMS.to_string()])
    }

    pub fn doc(&self, id: impl Into<String>) -> DocumentPath {
        let mut segments = self.0.clone();
        segments.push(id.into());
        DocumentPath(segments)
    }
}

impl DocumentPath {
    pub fn room(room_id: &str) -> Self {
        CollectionPath::rooms().doc(room_id)
    }

    pub fn instance(room_id: &str, instance_id: &str) -> Self {
        Self::room(room_id).collection(INSTANCES).doc(instance_id)
    }

    pub fn collection(&self, name: &str) -> CollectionPath {
        let mut segments = self.0.clone();
        segments.push(name.to_string());
        CollectionPath(segments)
    }

    /// Last segment: the document identifier.
    pub fn id(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or_default()
    }

    pub fn parent(&self) -> CollectionPath {
        CollectionPath(self.0[..self.0.len().saturating_sub(1)].to_vec())
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

// =============================================================================
// Documents and writes
// =============================================================================

/// A stored document: its identifier and field map.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Map<String, Value>,
}

/// A single field write.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Value(Value),
    /// Replaced by the store's clock at write time
    ServerTimestamp,
    /// Append each element not already present in the stored array
    ArrayUnion(Vec<Value>),
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        FieldValue::Value(value)
    }
}

pub type Fields = BTreeMap<String, FieldValue>;

/// Lift a plain JSON object into a write.
pub fn fields_from(object: Map<String, Value>) -> Fields {
    object
        .into_iter()
        .map(|(key, value)| (key, FieldValue::Value(value)))
        .collect()
}

/// Apply a write to the current document state.
///
/// Without `merge` the document is replaced. With `merge` nested objects are
/// merged key by key and untouched fields survive.
pub fn apply_write(
    existing: Option<Map<String, Value>>,
    fields: Fields,
    merge: bool,
    now: DateTime<Utc>,
) -> Map<String, Value> {
    let mut data = if merge {
        existing.unwrap_or_default()
    } else {
        Map::new()
    };

    for (key, field) in fields {
        match field {
            FieldValue::Value(value) => {
                if merge {
                    if let Some(current) = data.get_mut(&key) {
                        deep_merge(current, value);
                        continue;
                    }
                }
                data.insert(key, value);
            }
            FieldValue::ServerTimestamp => {
                data.insert(key, Value::String(to_store_timestamp(now)));
            }
            FieldValue::ArrayUnion(elements) => {
                let mut array = match data.remove(&key) {
                    Some(Value::Array(array)) => array,
                    _ => Vec::new(),
                };
                for element in elements {
                    if !array.contains(&element) {
                        array.push(element);
                    }
                }
                data.insert(key, Value::Array(array));
            }
        }
    }

    data
}

fn deep_merge(current: &mut Value, incoming: Value) {
    match (current, incoming) {
        (Value::Object(current), Value::Object(incoming)) => {
            for (key, value) in incoming {
                match current.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        current.insert(key, value);
                    }
                }
            }
        }
        (current, incoming) => *current = incoming,
    }
}

// =============================================================================
// Queries
// =============================================================================

/// Field predicate for `query_collection`.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldFilter {
    All,
    /// `data[field] == value`
    Equals { field: String, value: Value },
    /// `data[field]` is an array holding `value`
    ArrayContains { field: String, value: Value },
}

impl FieldFilter {
    pub fn equals(field: &str, value: impl Into<Value>) -> Self {
        FieldFilter::Equals {
            field: field.to_string(),
            value: value.into(),
        }
    }

    pub fn array_contains(field: &str, value: impl Into<Value>) -> Self {
        FieldFilter::ArrayContains {
            field: field.to_string(),
            value: value.into(),
        }
    }

    pub fn matches(&self, data: &Map<String, Value>) -> bool {
        match self {
            FieldFilter::All => true,
            FieldFilter::Equals { field, value } => data.get(field) == Some(value),
            FieldFilter::ArrayContains { field, value } => data
                .get(field)
                .and_then(Value::as_array)
                .is_some_and(|array| array.contains(value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn paths_render_as_slash_separated_segments() {
        let path = DocumentPath::instance("r1", "i1")
            .collection(MESSAGES)
            .doc("m1");
        assert_eq!(path.to_string(), "rooms/r1/instances/i1/messages/m1");
        assert_eq!(path.id(), "m1");
        assert_eq!(path.parent().to_string(), "rooms/r1/instances/i1/messages");
    }

    #[test]
    fn overwrite_drops_previous_fields() {
        let existing = object(json!({ "a": 1, "b": 2 }));
        let data = apply_write(
            Some(existing),
            fields_from(object(json!({ "a": 3 }))),
            false,
            Utc::now(),
        );
        assert_eq!(Value::Object(data), json!({ "a": 3 }));
    }

    #[test]
    fn merge_keeps_untouched_nested_fields() {
        let existing = object(json!({
            "name": "Launch",
            "configuration": { "mode": "direct", "operators": ["u1"] }
        }));
        let data = apply_write(
            Some(existing),
            fields_from(object(json!({ "configuration": { "moderation": "pre-moderate" } }))),
            true,
            Utc::now(),
        );
        assert_eq!(
            Value::Object(data),
            json!({
                "name": "Launch",
                "configuration": {
                    "mode": "direct",
                    "moderation": "pre-moderate",
                    "operators": ["u1"]
                }
            })
        );
    }

    #[test]
    fn array_union_is_idempotent() {
        let mut fields = Fields::new();
        fields.insert(
            "participants".into(),
            FieldValue::ArrayUnion(vec![json!("u2")]),
        );

        let once = apply_write(
            Some(object(json!({ "participants": ["u1"] }))),
            fields.clone(),
            true,
            Utc::now(),
        );
        let twice = apply_write(Some(once.clone()), fields, true, Utc::now());

        assert_eq!(once, twice);
        assert_eq!(twice["participants"], json!(["u1", "u2"]));
    }

    #[test]
    fn server_timestamp_uses_store_clock() {
        let now = DateTime::parse_from_rfc3339("2024-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let mut fields = Fields::new();
        fields.insert("addedAt".into(), FieldValue::ServerTimestamp);

        let data = apply_write(None, fields, false, now);

        assert_eq!(data["addedAt"], "2024-03-01T12:00:00.000Z");
    }

    #[test]
    fn filters_match_scalar_and_array_fields() {
        let data = object(json!({ "addedBy": "u1", "participants": ["u1", "u2"] }));
        assert!(FieldFilter::All.matches(&data));
        assert!(FieldFilter::equals("addedBy", "u1").matches(&data));
        assert!(!FieldFilter::equals("addedBy", "u2").matches(&data));
        assert!(FieldFilter::array_contains("participants", "u2").matches(&data));
        assert!(!FieldFilter::array_contains("participants", "u3").matches(&data));
        assert!(!FieldFilter::array_contains("addedBy", "u1").matches(&data));
    }
}
