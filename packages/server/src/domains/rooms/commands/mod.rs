//! Typed command requests.
//!
//! The envelope `command` selects a `CommandKind`; the free-form payload is
//! then validated into that command's request struct. By convention the
//! payload carries the room in `id` and everything else under `data`
//! (`instance`, `uuid`, `participants`, message content).

use serde_json::{Map, Value};

use crate::common::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Create,
    Update,
    Read,
    Get,
    Start,
    Activate,
    Send,
    Remove,
    Ban,
    Add,
    Leave,
}

impl CommandKind {
    /// `None` for commands this engine does not handle
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "create" => CommandKind::Create,
            "update" => CommandKind::Update,
            "read" => CommandKind::Read,
            "get" => CommandKind::Get,
            "start" => CommandKind::Start,
            "activate" => CommandKind::Activate,
            "send" => CommandKind::Send,
            "remove" => CommandKind::Remove,
            "ban" => CommandKind::Ban,
            "add" => CommandKind::Add,
            "leave" => CommandKind::Leave,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            CommandKind::Create => "create",
            CommandKind::Update => "update",
            CommandKind::Read => "read",
            CommandKind::Get => "get",
            CommandKind::Start => "start",
            CommandKind::Activate => "activate",
            CommandKind::Send => "send",
            CommandKind::Remove => "remove",
            CommandKind::Ban => "ban",
            CommandKind::Add => "add",
            CommandKind::Leave => "leave",
        }
    }

    /// Commands only the client caller class may issue
    pub fn requires_client(&self) -> bool {
        matches!(self, CommandKind::Activate | CommandKind::Ban)
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Request types
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct CreateRoom {
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRoom {
    pub room_id: String,
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoomRef {
    pub room_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GetRoom {
    pub room_id: String,
    pub instance_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StartInstance {
    pub room_id: String,
    pub instance_id: String,
    /// Participant list sent by the caller; only `direct` rooms use it
    pub requested: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstanceRef {
    pub room_id: String,
    pub instance_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SendMessage {
    pub room_id: String,
    pub instance_id: Option<String>,
    pub message_id: String,
    /// Message document content (the whole `payload.data`)
    pub data: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageRef {
    pub room_id: String,
    pub instance_id: Option<String>,
    pub message_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AddParticipants {
    pub room_id: String,
    pub instance_id: String,
    pub requested: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Create(CreateRoom),
    Update(UpdateRoom),
    Read(RoomRef),
    Get(GetRoom),
    Start(StartInstance),
    Activate(InstanceRef),
    Send(SendMessage),
    Remove(MessageRef),
    Ban(MessageRef),
    Add(AddParticipants),
    Leave(InstanceRef),
}

impl Command {
    /// Validate a payload into the request for `kind`.
    pub fn decode(kind: CommandKind, payload: &Value) -> EngineResult<Self> {
        let payload = PayloadFields::new(payload);

        Ok(match kind {
            CommandKind::Create => Command::Create(CreateRoom {
                fields: payload.object.clone(),
            }),
            CommandKind::Update => Command::Update(UpdateRoom {
                room_id: payload.room_id()?,
                fields: payload.object.clone(),
            }),
            CommandKind::Read => Command::Read(RoomRef {
                room_id: payload.room_id()?,
            }),
            CommandKind::Get => Command::Get(GetRoom {
                room_id: payload.room_id()?,
                instance_id: payload.instance_id()?,
            }),
            CommandKind::Start => Command::Start(StartInstance {
                room_id: payload.room_id()?,
                instance_id: payload.required_instance_id()?,
                requested: payload.participants(),
            }),
            CommandKind::Activate => Command::Activate(payload.instance_ref()?),
            CommandKind::Send => Command::Send(SendMessage {
                room_id: payload.room_id()?,
                instance_id: payload.instance_id()?,
                message_id: payload.message_id()?,
                data: payload.data(),
            }),
            CommandKind::Remove => Command::Remove(payload.message_ref()?),
            CommandKind::Ban => Command::Ban(payload.message_ref()?),
            CommandKind::Add => Command::Add(AddParticipants {
                room_id: payload.room_id()?,
                instance_id: payload.required_instance_id()?,
                requested: payload.participants(),
            }),
            CommandKind::Leave => Command::Leave(payload.instance_ref()?),
        })
    }

    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Create(_) => CommandKind::Create,
            Command::Update(_) => CommandKind::Update,
            Command::Read(_) => CommandKind::Read,
            Command::Get(_) => CommandKind::Get,
            Command::Start(_) => CommandKind::Start,
            Command::Activate(_) => CommandKind::Activate,
            Command::Send(_) => CommandKind::Send,
            Command::Remove(_) => CommandKind::Remove,
            Command::Ban(_) => CommandKind::Ban,
            Command::Add(_) => CommandKind::Add,
            Command::Leave(_) => CommandKind::Leave,
        }
    }
}

// =============================================================================
// Payload field access
// =============================================================================

struct PayloadFields {
    object: Map<String, Value>,
}

impl PayloadFields {
    fn new(payload: &Value) -> Self {
        Self {
            object: payload.as_object().cloned().unwrap_or_default(),
        }
    }

    fn data(&self) -> Map<String, Value> {
        self.object
            .get("data")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default()
    }

    fn room_id(&self) -> EngineResult<String> {
        identifier(self.object.get("id"), "id")?.ok_or_else(|| EngineError::required("id"))
    }

    fn instance_id(&self) -> EngineResult<Option<String>> {
        identifier(self.object.get("data").and_then(|d| d.get("instance")), "instance")
    }

    fn required_instance_id(&self) -> EngineResult<String> {
        self.instance_id()?
            .ok_or_else(|| EngineError::required("instance"))
    }

    fn message_id(&self) -> EngineResult<String> {
        identifier(self.object.get("data").and_then(|d| d.get("uuid")), "uuid")?
            .ok_or_else(|| EngineError::required("uuid"))
    }

    fn instance_ref(&self) -> EngineResult<InstanceRef> {
        Ok(InstanceRef {
            room_id: self.room_id()?,
            instance_id: self.required_instance_id()?,
        })
    }

    fn message_ref(&self) -> EngineResult<MessageRef> {
        Ok(MessageRef {
            room_id: self.room_id()?,
            instance_id: self.instance_id()?,
            message_id: self.message_id()?,
        })
    }

    /// `data.participants` as identity ids; entries may be ids or `{id}` objects.
    fn participants(&self) -> Vec<String> {
        self.object
            .get("data")
            .and_then(|d| d.get("participants"))
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| match item {
                        Value::String(id) => Some(id.clone()),
                        Value::Object(user) => user.get("id").and_then(Value::as_str).map(str::to_string),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// A document identifier: absent/empty is `None`, anything that is not a
/// plain path segment is rejected.
fn identifier(value: Option<&Value>, field: &str) -> EngineResult<Option<String>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) if !s.contains('/') => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(_) => Err(EngineError::PreconditionFailed(format!(
            "{} is not a valid identifier",
            field
        ))),
    }
}
