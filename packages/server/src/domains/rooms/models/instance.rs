use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

use super::room::string_list;
use crate::common::{EngineError, EngineResult, User};
use crate::kernel::document::INSTANCES;
use crate::kernel::{BaseDocumentStore, DocumentPath, FieldFilter, FieldValue, Fields};

/// Instance - routed sub-conversation inside a room.
#[derive(Debug, Clone)]
pub struct Instance {
    pub id: String,
    pub data: Map<String, Value>,
}

/// Instance lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    /// Waiting for an operator to `activate` it
    Pending,
    Active,
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstanceStatus::Pending => write!(f, "pending"),
            InstanceStatus::Active => write!(f, "active"),
        }
    }
}

impl std::str::FromStr for InstanceStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "pending" => Ok(InstanceStatus::Pending),
            "active" => Ok(InstanceStatus::Active),
            _ => Err(anyhow::anyhow!("Invalid instance status: {}", s)),
        }
    }
}

/// Values for a freshly started instance
#[derive(Debug, Clone)]
pub struct NewInstance {
    pub participants: Vec<String>,
    pub status: InstanceStatus,
    /// Triggering identity, only recorded for round-robin rooms
    pub audience: Option<User>,
}

impl Instance {
    pub fn participants(&self) -> Vec<String> {
        string_list(self.data.get("participants"))
    }

    pub fn status(&self) -> Option<InstanceStatus> {
        self.data
            .get("status")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
    }

    pub fn has_participant(&self, user_id: &str) -> bool {
        self.participants().iter().any(|id| id == user_id)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.data)
    }
}

// =============================================================================
// Instance Queries
// =============================================================================

impl Instance {
    /// Find instance by ID within a room
    pub async fn find_by_id(
        room_id: &str,
        instance_id: &str,
        store: &dyn BaseDocumentStore,
    ) -> EngineResult<Option<Self>> {
        let doc = store
            .get_document(&DocumentPath::instance(room_id, instance_id))
            .await?;
        Ok(doc.map(|doc| Self {
            id: doc.id,
            data: doc.data,
        }))
    }

    /// Find instance by ID, failing with `instance not found` when absent
    pub async fn require(
        room_id: &str,
        instance_id: &str,
        store: &dyn BaseDocumentStore,
    ) -> EngineResult<Self> {
        Self::find_by_id(room_id, instance_id, store)
            .await?
            .ok_or_else(|| EngineError::not_found("instance"))
    }

    /// All instances of a room, ordered by id
    pub async fn list(room_id: &str, store: &dyn BaseDocumentStore) -> EngineResult<Vec<Self>> {
        Self::query(room_id, &FieldFilter::All, store).await
    }

    /// Instances the user started or has joined, without duplicates
    pub async fn find_for_member(
        room_id: &str,
        user_id: &str,
        store: &dyn BaseDocumentStore,
    ) -> EngineResult<Vec<Self>> {
        let own = Self::query(room_id, &FieldFilter::equals("addedBy", user_id), store).await?;
        let joined = Self::query(
            room_id,
            &FieldFilter::array_contains("participants", user_id),
            store,
        )
        .await?;

        let mut seen = HashSet::new();
        Ok(own
            .into_iter()
            .chain(joined)
            .filter(|instance| seen.insert(instance.id.clone()))
            .collect())
    }

    async fn query(
        room_id: &str,
        filter: &FieldFilter,
        store: &dyn BaseDocumentStore,
    ) -> EngineResult<Vec<Self>> {
        let docs = store
            .query_collection(&DocumentPath::room(room_id).collection(INSTANCES), filter)
            .await?;
        Ok(docs
            .into_iter()
            .map(|doc| Self {
                id: doc.id,
                data: doc.data,
            })
            .collect())
    }

    /// Create (or replace) an instance
    pub async fn create(
        room_id: &str,
        instance_id: &str,
        new: NewInstance,
        actor: &str,
        store: &dyn BaseDocumentStore,
    ) -> EngineResult<()> {
        let mut write = Fields::new();
        write.insert("participants".into(), string_array(&new.participants).into());
        write.insert(
            "audience".into(),
            new.audience.map(|user| user.to_value()).unwrap_or(Value::Null).into(),
        );
        write.insert("status".into(), Value::String(new.status.to_string()).into());
        write.insert("addedBy".into(), Value::String(actor.to_string()).into());
        write.insert("addedAt".into(), FieldValue::ServerTimestamp);

        store
            .set_document(&DocumentPath::instance(room_id, instance_id), write, false)
            .await?;
        Ok(())
    }

    /// Replace the participant list (merge write; other fields untouched)
    pub async fn set_participants(
        room_id: &str,
        instance_id: &str,
        participants: &[String],
        actor: &str,
        store: &dyn BaseDocumentStore,
    ) -> EngineResult<()> {
        let mut write = Fields::new();
        write.insert("participants".into(), string_array(participants).into());
        write.insert("updatedBy".into(), Value::String(actor.to_string()).into());
        write.insert("updatedAt".into(), FieldValue::ServerTimestamp);

        store
            .set_document(&DocumentPath::instance(room_id, instance_id), write, true)
            .await?;
        Ok(())
    }

    /// Mark active and union `joining` into the participants.
    ///
    /// The union is applied by the store inside its per-document merge, so two
    /// concurrent activations both end up in the list.
    pub async fn activate(
        room_id: &str,
        instance_id: &str,
        joining: &[String],
        actor: &str,
        store: &dyn BaseDocumentStore,
    ) -> EngineResult<()> {
        let mut write = Fields::new();
        write.insert(
            "status".into(),
            Value::String(InstanceStatus::Active.to_string()).into(),
        );
        write.insert(
            "participants".into(),
            FieldValue::ArrayUnion(joining.iter().cloned().map(Value::String).collect()),
        );
        write.insert("updatedBy".into(), Value::String(actor.to_string()).into());
        write.insert("updatedAt".into(), FieldValue::ServerTimestamp);

        store
            .set_document(&DocumentPath::instance(room_id, instance_id), write, true)
            .await?;
        Ok(())
    }
}

fn string_array(items: &[String]) -> Value {
    Value::Array(items.iter().cloned().map(Value::String).collect())
}
