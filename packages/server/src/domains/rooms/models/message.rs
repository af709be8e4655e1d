use serde_json::{Map, Value};

use crate::common::{EngineError, EngineResult};
use crate::kernel::document::MESSAGES;
use crate::kernel::{
    fields_from, BaseDocumentStore, CollectionPath, DocumentPath, FieldFilter, FieldValue, Fields,
};

/// Message - leaf content unit owned by a room or an instance.
///
/// Content is free-form; the engine only reads `private`, `parent`,
/// `removed`, `from.id` and `requester.id`.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: String,
    pub data: Map<String, Value>,
}

/// Owner of a message collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageScope {
    Room { room_id: String },
    Instance { room_id: String, instance_id: String },
}

impl MessageScope {
    /// Instance scope when an instance is named, room scope otherwise
    pub fn new(room_id: &str, instance_id: Option<&str>) -> Self {
        match instance_id {
            Some(instance_id) => MessageScope::Instance {
                room_id: room_id.to_string(),
                instance_id: instance_id.to_string(),
            },
            None => MessageScope::Room {
                room_id: room_id.to_string(),
            },
        }
    }

    pub fn collection(&self) -> CollectionPath {
        match self {
            MessageScope::Room { room_id } => DocumentPath::room(room_id).collection(MESSAGES),
            MessageScope::Instance {
                room_id,
                instance_id,
            } => DocumentPath::instance(room_id, instance_id).collection(MESSAGES),
        }
    }

    pub fn message(&self, message_id: &str) -> DocumentPath {
        self.collection().doc(message_id)
    }
}

impl Message {
    /// Explicit `private` flag, `None` when the sender left it out
    pub fn private_flag(&self) -> Option<bool> {
        self.data.get("private").and_then(Value::as_bool)
    }

    /// Only an explicit `private: false` makes a message public
    pub fn is_public(&self) -> bool {
        self.private_flag() == Some(false)
    }

    pub fn is_removed(&self) -> bool {
        self.data.get("removed").and_then(Value::as_bool) == Some(true)
    }

    /// Id of the message this one replies to
    pub fn parent(&self) -> Option<&str> {
        self.data
            .get("parent")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
    }

    /// Author identity (`from.id`)
    pub fn author_id(&self) -> Option<&str> {
        nested_id(&self.data, "from")
    }

    /// Identity a reply is directed at (`requester.id`)
    pub fn requester_id(&self) -> Option<&str> {
        nested_id(&self.data, "requester")
    }
}

fn nested_id<'a>(data: &'a Map<String, Value>, field: &str) -> Option<&'a str> {
    data.get(field)
        .and_then(|value| value.get("id"))
        .and_then(Value::as_str)
}

/// `{id → data}` map as returned in `get`/`activate` payloads
pub fn messages_to_value<'a>(messages: impl IntoIterator<Item = &'a Message>) -> Value {
    Value::Object(
        messages
            .into_iter()
            .map(|message| (message.id.clone(), Value::Object(message.data.clone())))
            .collect(),
    )
}

// =============================================================================
// Message Queries
// =============================================================================

impl Message {
    /// Find message by ID
    pub async fn find_by_id(
        scope: &MessageScope,
        message_id: &str,
        store: &dyn BaseDocumentStore,
    ) -> EngineResult<Option<Self>> {
        let doc = store.get_document(&scope.message(message_id)).await?;
        Ok(doc.map(|doc| Self {
            id: doc.id,
            data: doc.data,
        }))
    }

    /// Find message by ID, failing with `message not found` when absent
    pub async fn require(
        scope: &MessageScope,
        message_id: &str,
        store: &dyn BaseDocumentStore,
    ) -> EngineResult<Self> {
        Self::find_by_id(scope, message_id, store)
            .await?
            .ok_or_else(|| EngineError::not_found("message"))
    }

    /// Every message in scope, removed ones included, ordered by id
    pub async fn list(scope: &MessageScope, store: &dyn BaseDocumentStore) -> EngineResult<Vec<Self>> {
        let docs = store
            .query_collection(&scope.collection(), &FieldFilter::All)
            .await?;
        Ok(docs
            .into_iter()
            .map(|doc| Self {
                id: doc.id,
                data: doc.data,
            })
            .collect())
    }

    /// Write a new message with caller-supplied content
    pub async fn create(
        scope: &MessageScope,
        message_id: &str,
        data: Map<String, Value>,
        actor: &str,
        store: &dyn BaseDocumentStore,
    ) -> EngineResult<()> {
        let mut write = fields_from(data);
        write.insert("addedBy".into(), Value::String(actor.to_string()).into());
        write.insert("addedAt".into(), FieldValue::ServerTimestamp);

        store
            .set_document(&scope.message(message_id), write, false)
            .await?;
        Ok(())
    }

    /// Force a message public (thread-visibility cascade)
    pub async fn make_public(
        scope: &MessageScope,
        message_id: &str,
        actor: &str,
        store: &dyn BaseDocumentStore,
    ) -> EngineResult<()> {
        let mut write = Fields::new();
        write.insert("private".into(), Value::Bool(false).into());
        write.insert("updatedBy".into(), Value::String(actor.to_string()).into());
        write.insert("updatedAt".into(), FieldValue::ServerTimestamp);

        store
            .set_document(&scope.message(message_id), write, true)
            .await?;
        Ok(())
    }

    /// Logical delete: the document stays, flagged `removed`
    pub async fn mark_removed(
        scope: &MessageScope,
        message_id: &str,
        actor: &str,
        store: &dyn BaseDocumentStore,
    ) -> EngineResult<()> {
        let mut write = Fields::new();
        write.insert("removed".into(), Value::Bool(true).into());
        write.insert("updatedBy".into(), Value::String(actor.to_string()).into());
        write.insert("updatedAt".into(), FieldValue::ServerTimestamp);

        store
            .set_document(&scope.message(message_id), write, true)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(id: &str, data: Value) -> Message {
        Message {
            id: id.into(),
            data: data.as_object().cloned().unwrap(),
        }
    }

    #[test]
    fn scope_selects_collection() {
        assert_eq!(
            MessageScope::new("r1", None).message("m1").to_string(),
            "rooms/r1/messages/m1"
        );
        assert_eq!(
            MessageScope::new("r1", Some("i1")).message("m1").to_string(),
            "rooms/r1/instances/i1/messages/m1"
        );
    }

    #[test]
    fn reads_visibility_fields() {
        let reply = message(
            "m2",
            json!({
                "private": false,
                "parent": "m1",
                "from": { "id": "u1" },
                "requester": { "id": "u2" }
            }),
        );

        assert!(reply.is_public());
        assert_eq!(reply.parent(), Some("m1"));
        assert_eq!(reply.author_id(), Some("u1"));
        assert_eq!(reply.requester_id(), Some("u2"));
        assert!(!reply.is_removed());
    }

    #[test]
    fn missing_private_flag_is_not_public() {
        let m = message("m1", json!({ "text": "hi", "parent": "" }));
        assert_eq!(m.private_flag(), None);
        assert!(!m.is_public());
        assert_eq!(m.parent(), None);
    }

    #[test]
    fn messages_render_as_id_keyed_map() {
        let value = messages_to_value(&[
            message("a", json!({ "text": "1" })),
            message("b", json!({ "text": "2" })),
        ]);
        assert_eq!(value, json!({ "a": { "text": "1" }, "b": { "text": "2" } }));
    }
}
