use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::{CommandContext, Reply};
use crate::common::{EngineError, EngineResult};
use crate::domains::rooms::commands::{MessageRef, SendMessage};
use crate::domains::rooms::models::{Instance, Message, MessageScope, Moderation, Room};

// ============================================================================
// Action: Send
// ============================================================================

/// Store a message in the room, or in the named instance.
///
/// Missing `private` defaults to private only under pre-moderation, and a
/// missing `from` to the caller. A public reply makes its parent public
/// before the reply itself is written. Message ids are never reused, so a
/// `uuid` already present in scope (removed or not) is rejected.
pub async fn send_message(request: SendMessage, ctx: &CommandContext<'_>) -> EngineResult<Reply> {
    let store = ctx.deps.store.as_ref();
    let room = Room::require(&request.room_id, store).await?;
    if let Some(instance_id) = &request.instance_id {
        Instance::require(&room.id, instance_id, store).await?;
    }

    let scope = MessageScope::new(&room.id, request.instance_id.as_deref());
    if Message::find_by_id(&scope, &request.message_id, store)
        .await?
        .is_some()
    {
        return Err(EngineError::PreconditionFailed("uuid already exists".into()));
    }

    let mut data = request.data;
    if !data.get("private").is_some_and(Value::is_boolean) {
        let private = room.config.moderation == Moderation::PreModerate;
        data.insert("private".into(), Value::Bool(private));
    }
    if !data.get("from").is_some_and(Value::is_object) {
        data.insert("from".into(), json!({ "id": ctx.actor() }));
    }

    let message = Message {
        id: request.message_id,
        data,
    };

    if message.is_public() {
        if let Some(parent_id) = message.parent() {
            match Message::find_by_id(&scope, parent_id, store).await? {
                Some(parent) if !parent.is_public() => {
                    Message::make_public(&scope, &parent.id, ctx.actor(), store).await?;
                    info!(
                        room_id = %room.id,
                        message_id = %message.id,
                        parent_id = %parent.id,
                        "Parent message made public by reply"
                    );
                }
                Some(_) => {}
                None => {
                    warn!(
                        room_id = %room.id,
                        message_id = %message.id,
                        parent_id = %parent_id,
                        "Reply parent not found; cascade skipped"
                    );
                }
            }
        }
    }

    let stored = message.data.clone();
    Message::create(&scope, &message.id, message.data, ctx.actor(), store).await?;

    info!(
        room_id = %room.id,
        instance_id = ?request.instance_id,
        message_id = %message.id,
        "Message sent"
    );

    let mut payload = ctx.echo();
    payload.insert("data".into(), Value::Object(stored));
    Ok(Reply::new(payload))
}

// ============================================================================
// Action: Remove / Ban
// ============================================================================

/// Logically delete a message. `ban` is the same write, restricted to client
/// callers by the router.
pub async fn remove_message(request: MessageRef, ctx: &CommandContext<'_>) -> EngineResult<Reply> {
    let store = ctx.deps.store.as_ref();
    let scope = MessageScope::new(&request.room_id, request.instance_id.as_deref());

    let message = Message::require(&scope, &request.message_id, store).await?;
    if message.is_removed() {
        debug!(
            room_id = %request.room_id,
            message_id = %message.id,
            "Message already removed"
        );
        return Ok(Reply::new(ctx.echo()));
    }
    Message::mark_removed(&scope, &message.id, ctx.actor(), store).await?;

    info!(
        room_id = %request.room_id,
        instance_id = ?request.instance_id,
        message_id = %message.id,
        actor = %ctx.actor(),
        "Message removed"
    );

    Ok(Reply::new(ctx.echo()))
}
