//! Rooms domain actions
//!
//! One async function per command. Each reads and writes through the
//! document store in `ServerDeps` and returns the payload to publish; the
//! router owns publishing and error envelopes.

mod instance_actions;
mod message_actions;
mod room_actions;

use serde_json::{Map, Value};
use tracing::debug;

use super::commands::Command;
use crate::common::{CallerClass, EngineResult, User};
use crate::kernel::ServerDeps;

pub use instance_actions::{activate_instance, add_participants, leave_instance, start_instance};
pub use message_actions::{remove_message, send_message};
pub use room_actions::{create_room, get_room, read_room, update_room};

/// Everything a handler knows about the invocation besides its request.
pub struct CommandContext<'a> {
    pub deps: &'a ServerDeps,
    pub caller: CallerClass,
    pub user: &'a User,
    /// Inbound payload after date normalization
    pub payload: &'a Value,
}

impl CommandContext<'_> {
    pub fn actor(&self) -> &str {
        &self.user.id
    }

    /// Inbound payload as an object, the base of most responses
    pub(crate) fn echo(&self) -> Map<String, Value> {
        self.payload.as_object().cloned().unwrap_or_default()
    }
}

/// Successful handler result.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub payload: Value,
    /// Also publish on the management channel
    pub manage_copy: bool,
}

impl Reply {
    pub fn new(payload: impl Into<Value>) -> Self {
        Self {
            payload: payload.into(),
            manage_copy: false,
        }
    }

    pub fn with_manage_copy(payload: impl Into<Value>) -> Self {
        Self {
            payload: payload.into(),
            manage_copy: true,
        }
    }
}

/// Run a decoded command to completion.
pub async fn execute(command: Command, ctx: &CommandContext<'_>) -> EngineResult<Reply> {
    debug!(command = %command.kind(), actor = %ctx.actor(), "Executing command");

    match command {
        Command::Create(request) => create_room(request, ctx).await,
        Command::Update(request) => update_room(request, ctx).await,
        Command::Read(request) => read_room(request, ctx).await,
        Command::Get(request) => get_room(request, ctx).await,
        Command::Start(request) => start_instance(request, ctx).await,
        Command::Activate(request) => activate_instance(request, ctx).await,
        Command::Send(request) => send_message(request, ctx).await,
        Command::Remove(request) | Command::Ban(request) => remove_message(request, ctx).await,
        Command::Add(request) => add_participants(request, ctx).await,
        Command::Leave(request) => leave_instance(request, ctx).await,
    }
}

/// Set `payload.data.<key>`, creating `data` when missing or not an object
pub(crate) fn set_data_field(payload: &mut Map<String, Value>, key: &str, value: Value) {
    let mut data = match payload.remove("data") {
        Some(Value::Object(data)) => data,
        _ => Map::new(),
    };
    data.insert(key.to_string(), value);
    payload.insert("data".into(), Value::Object(data));
}
