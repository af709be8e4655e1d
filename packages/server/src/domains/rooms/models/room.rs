use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::common::{EngineError, EngineResult};
use crate::kernel::{fields_from, BaseDocumentStore, CollectionPath, DocumentPath, FieldValue};

/// Room - top-level container for an event or channel.
#[derive(Debug, Clone)]
pub struct Room {
    pub id: String,
    pub data: Map<String, Value>,
    /// Parsed once per request from `data.configuration`
    pub config: RoomConfig,
}

/// Routing policy for instances
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoutingMode {
    /// No instances; messages live on the room (unset or unknown mode)
    #[default]
    Broadcast,
    RoundRobin,
    Direct,
}

impl RoutingMode {
    /// Unknown or missing modes fall back to broadcast.
    pub fn from_config(mode: Option<&str>) -> Self {
        match mode {
            Some("round-robin") => RoutingMode::RoundRobin,
            Some("direct") => RoutingMode::Direct,
            _ => RoutingMode::Broadcast,
        }
    }

    /// Whether messages and participants are scoped to instances
    pub fn is_instanced(&self) -> bool {
        !matches!(self, RoutingMode::Broadcast)
    }
}

impl std::fmt::Display for RoutingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoutingMode::Broadcast => write!(f, "broadcast"),
            RoutingMode::RoundRobin => write!(f, "round-robin"),
            RoutingMode::Direct => write!(f, "direct"),
        }
    }
}

/// Moderation policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Moderation {
    #[default]
    None,
    PreModerate,
}

impl Moderation {
    pub fn from_config(moderation: Option<&str>) -> Self {
        match moderation {
            Some("pre-moderate") => Moderation::PreModerate,
            _ => Moderation::None,
        }
    }
}

/// Immutable view of a room's `configuration` object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomConfig {
    pub mode: RoutingMode,
    pub moderation: Moderation,
    pub moderators: Vec<String>,
    pub operators: Vec<String>,
}

impl RoomConfig {
    /// Read `configuration` from room data. Missing or malformed entries take defaults.
    pub fn from_room_data(data: &Map<String, Value>) -> Self {
        let Some(configuration) = data.get("configuration").and_then(Value::as_object) else {
            return Self::default();
        };

        Self {
            mode: RoutingMode::from_config(configuration.get("mode").and_then(Value::as_str)),
            moderation: Moderation::from_config(
                configuration.get("moderation").and_then(Value::as_str),
            ),
            moderators: string_list(configuration.get("moderators")),
            operators: string_list(configuration.get("operators")),
        }
    }

    pub fn is_moderator(&self, user_id: &str) -> bool {
        self.moderators.iter().any(|id| id == user_id)
    }

    pub fn is_operator(&self, user_id: &str) -> bool {
        self.operators.iter().any(|id| id == user_id)
    }
}

/// Strings out of an optional JSON array; anything else is ignored.
pub(crate) fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

// =============================================================================
// Room Queries
// =============================================================================

impl Room {
    fn from_document(id: String, data: Map<String, Value>) -> Self {
        let config = RoomConfig::from_room_data(&data);
        Self { id, data, config }
    }

    /// Find room by ID
    pub async fn find_by_id(id: &str, store: &dyn BaseDocumentStore) -> EngineResult<Option<Self>> {
        let doc = store.get_document(&DocumentPath::room(id)).await?;
        Ok(doc.map(|doc| Self::from_document(doc.id, doc.data)))
    }

    /// Find room by ID, failing with `item not found` when absent
    pub async fn require(id: &str, store: &dyn BaseDocumentStore) -> EngineResult<Self> {
        Self::find_by_id(id, store)
            .await?
            .ok_or_else(|| EngineError::not_found("item"))
    }

    /// Create a new room from caller fields, returning the assigned identifier
    pub async fn create(
        mut fields: Map<String, Value>,
        actor: &str,
        store: &dyn BaseDocumentStore,
    ) -> EngineResult<String> {
        let id = store.new_document_id();
        fields.remove("id");
        fields.insert("messages".into(), Value::Array(Vec::new()));
        fields.insert("addedBy".into(), Value::String(actor.to_string()));

        let mut write = fields_from(fields);
        write.insert("addedAt".into(), FieldValue::ServerTimestamp);

        store
            .set_document(&CollectionPath::rooms().doc(&id), write, false)
            .await?;
        Ok(id)
    }

    /// Merge caller fields into an existing room. Existence is not checked.
    pub async fn merge_update(
        id: &str,
        mut fields: Map<String, Value>,
        actor: &str,
        store: &dyn BaseDocumentStore,
    ) -> EngineResult<()> {
        fields.insert("updatedBy".into(), Value::String(actor.to_string()));

        let mut write = fields_from(fields);
        write.insert("updatedAt".into(), FieldValue::ServerTimestamp);

        store
            .set_document(&DocumentPath::room(id), write, true)
            .await?;
        Ok(())
    }
}
