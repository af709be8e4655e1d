use serde_json::{Map, Value};
use tracing::{debug, info};

use super::{CommandContext, Reply};
use crate::common::{CallerClass, EngineResult};
use crate::domains::rooms::commands::{CreateRoom, GetRoom, RoomRef, UpdateRoom};
use crate::domains::rooms::models::{messages_to_value, Instance, Message, MessageScope, Room};
use crate::domains::rooms::visibility::filter_visible;

// ============================================================================
// Action: Create / Update / Read
// ============================================================================

/// Create a room from the whole payload. The reply carries the new id and is
/// also copied to the management channel.
pub async fn create_room(request: CreateRoom, ctx: &CommandContext<'_>) -> EngineResult<Reply> {
    let room_id = Room::create(request.fields, ctx.actor(), ctx.deps.store.as_ref()).await?;

    info!(room_id = %room_id, actor = %ctx.actor(), "Room created");

    let mut payload = ctx.echo();
    payload.insert("id".into(), Value::String(room_id));
    Ok(Reply::with_manage_copy(payload))
}

pub async fn update_room(request: UpdateRoom, ctx: &CommandContext<'_>) -> EngineResult<Reply> {
    Room::merge_update(
        &request.room_id,
        request.fields,
        ctx.actor(),
        ctx.deps.store.as_ref(),
    )
    .await?;

    info!(room_id = %request.room_id, actor = %ctx.actor(), "Room updated");

    Ok(Reply::new(ctx.echo()))
}

pub async fn read_room(request: RoomRef, ctx: &CommandContext<'_>) -> EngineResult<Reply> {
    let room = Room::require(&request.room_id, ctx.deps.store.as_ref()).await?;
    Ok(Reply::new(room.data))
}

// ============================================================================
// Action: Get
// ============================================================================

/// Room snapshot shaped for the caller.
///
/// Client callers get every instance, with messages attached when they are
/// one of the room's operators. Other callers get either their instance(s)
/// or, for broadcast rooms, the room-level messages. Messages always pass
/// through the visibility filter for the requesting identity.
pub async fn get_room(request: GetRoom, ctx: &CommandContext<'_>) -> EngineResult<Reply> {
    let store = ctx.deps.store.as_ref();
    let room = Room::require(&request.room_id, store).await?;
    let actor = ctx.actor();

    let mut payload = Map::new();
    payload.insert("id".into(), Value::String(room.id.clone()));
    payload.extend(room.data.clone());

    match ctx.caller {
        CallerClass::Client => {
            let with_messages = room.config.is_operator(actor);
            let mut instances = Map::new();

            for instance in Instance::list(&room.id, store).await? {
                let instance_id = instance.id.clone();
                let mut data = instance.data;
                if with_messages {
                    let scope = MessageScope::new(&room.id, Some(&instance_id));
                    let messages = Message::list(&scope, store).await?;
                    let visible = filter_visible(&messages, &room.config, actor);
                    data.insert("messages".into(), messages_to_value(visible));
                }
                instances.insert(instance_id, Value::Object(data));
            }

            debug!(
                room_id = %room.id,
                instance_count = instances.len(),
                with_messages,
                "Room fetched for client"
            );
            payload.insert("instances".into(), Value::Object(instances));
        }
        CallerClass::Other if room.config.mode.is_instanced() => match request.instance_id {
            Some(instance_id) => {
                let instance = Instance::require(&room.id, &instance_id, store).await?;
                if instance.has_participant(actor) {
                    let scope = MessageScope::new(&room.id, Some(&instance_id));
                    let messages = Message::list(&scope, store).await?;
                    let visible = filter_visible(&messages, &room.config, actor);
                    payload.insert("messages".into(), messages_to_value(visible));
                }
                payload.insert("instance".into(), instance.into_value());
            }
            None => {
                let instances: Map<String, Value> = Instance::find_for_member(&room.id, actor, store)
                    .await?
                    .into_iter()
                    .map(|instance| (instance.id.clone(), instance.into_value()))
                    .collect();
                payload.insert("instances".into(), Value::Object(instances));
            }
        },
        CallerClass::Other => {
            let scope = MessageScope::new(&room.id, None);
            let messages = Message::list(&scope, store).await?;
            let visible = filter_visible(&messages, &room.config, actor);
            payload.insert("messages".into(), messages_to_value(visible));
        }
    }

    Ok(Reply::new(payload))
}
