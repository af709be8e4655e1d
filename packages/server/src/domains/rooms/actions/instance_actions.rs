use serde_json::Value;
use tracing::{debug, info};

use super::{set_data_field, CommandContext, Reply};
use crate::common::EngineResult;
use crate::domains::rooms::commands::{AddParticipants, InstanceRef, StartInstance};
use crate::domains::rooms::models::{
    messages_to_value, Instance, InstanceStatus, Message, MessageScope, NewInstance, Room,
    RoutingMode,
};
use crate::domains::rooms::participants::{resolve, ParticipantAction};

// ============================================================================
// Action: Start
// ============================================================================

/// Open an instance in a room. Participants and status come from the room's
/// routing mode; the reply lists the room operators for assignment.
pub async fn start_instance(
    request: StartInstance,
    ctx: &CommandContext<'_>,
) -> EngineResult<Reply> {
    let store = ctx.deps.store.as_ref();
    let room = Room::require(&request.room_id, store).await?;
    let mode = room.config.mode;

    let resolution = resolve(
        mode,
        &[],
        ParticipantAction::Start,
        ctx.actor(),
        &request.requested,
    );
    // start always resolves a status
    let status = resolution.status.unwrap_or(InstanceStatus::Active);

    let audience = (mode == RoutingMode::RoundRobin).then(|| ctx.user.clone());

    Instance::create(
        &room.id,
        &request.instance_id,
        NewInstance {
            participants: resolution.participants,
            status,
            audience,
        },
        ctx.actor(),
        store,
    )
    .await?;

    info!(
        room_id = %room.id,
        instance_id = %request.instance_id,
        mode = %mode,
        status = %status,
        "Instance started"
    );

    let operators = room
        .config
        .operators
        .iter()
        .cloned()
        .map(Value::String)
        .collect();
    let mut payload = ctx.echo();
    set_data_field(&mut payload, "operators", Value::Array(operators));
    Ok(Reply::new(payload))
}

// ============================================================================
// Action: Activate
// ============================================================================

/// Claim an instance: mark it active and add the caller to its participants.
/// The reply is the payload merged with the instance and all its messages.
pub async fn activate_instance(
    request: InstanceRef,
    ctx: &CommandContext<'_>,
) -> EngineResult<Reply> {
    let store = ctx.deps.store.as_ref();
    let room = Room::require(&request.room_id, store).await?;
    let instance = Instance::require(&room.id, &request.instance_id, store).await?;

    let current = instance.participants();
    let resolution = resolve(
        room.config.mode,
        &current,
        ParticipantAction::Activate,
        ctx.actor(),
        &[],
    );
    let joining = resolution.joined_since(&current);

    Instance::activate(&room.id, &instance.id, &joining, ctx.actor(), store).await?;

    let activated = Instance::require(&room.id, &instance.id, store).await?;

    info!(
        room_id = %room.id,
        instance_id = %instance.id,
        actor = %ctx.actor(),
        joined = !joining.is_empty(),
        previous_status = ?instance.status(),
        status = ?activated.status(),
        "Instance activated"
    );

    let scope = MessageScope::new(&room.id, Some(&instance.id));
    let messages = Message::list(&scope, store).await?;

    let mut payload = ctx.echo();
    payload.extend(activated.data);
    payload.insert("messages".into(), messages_to_value(&messages));
    Ok(Reply::new(payload))
}

// ============================================================================
// Action: Add / Leave
// ============================================================================

/// Add participants to a `direct` instance; a no-op for other modes.
/// The reply carries the instance `topic` and `route` under `payload.data`.
pub async fn add_participants(
    request: AddParticipants,
    ctx: &CommandContext<'_>,
) -> EngineResult<Reply> {
    let store = ctx.deps.store.as_ref();
    let room = Room::require(&request.room_id, store).await?;
    let instance = Instance::require(&room.id, &request.instance_id, store).await?;

    let current = instance.participants();
    let resolution = resolve(
        room.config.mode,
        &current,
        ParticipantAction::Add,
        ctx.actor(),
        &request.requested,
    );

    if resolution.changes(&current) {
        Instance::set_participants(&room.id, &instance.id, &resolution.participants, ctx.actor(), store)
            .await?;
        info!(
            room_id = %room.id,
            instance_id = %instance.id,
            added = request.requested.len(),
            "Participants added"
        );
    } else {
        debug!(room_id = %room.id, mode = %room.config.mode, "Add ignored for routing mode");
    }

    let mut payload = ctx.echo();
    for field in ["topic", "route"] {
        if let Some(value) = instance.data.get(field) {
            set_data_field(&mut payload, field, value.clone());
        }
    }
    Ok(Reply::new(payload))
}

/// Remove the caller from a `direct` instance; a no-op for other modes.
pub async fn leave_instance(request: InstanceRef, ctx: &CommandContext<'_>) -> EngineResult<Reply> {
    let store = ctx.deps.store.as_ref();
    let room = Room::require(&request.room_id, store).await?;
    let instance = Instance::require(&room.id, &request.instance_id, store).await?;

    let current = instance.participants();
    let resolution = resolve(
        room.config.mode,
        &current,
        ParticipantAction::Leave,
        ctx.actor(),
        &[],
    );

    if resolution.changes(&current) {
        Instance::set_participants(&room.id, &instance.id, &resolution.participants, ctx.actor(), store)
            .await?;
        info!(room_id = %room.id, instance_id = %instance.id, actor = %ctx.actor(), "Participant left");
    } else {
        debug!(room_id = %room.id, mode = %room.config.mode, "Leave ignored");
    }

    Ok(Reply::new(ctx.echo()))
}
