//! Test fixtures for creating envelopes and seeding documents.
//!
//! Seeding writes straight through the store, bypassing the router.

use manage_core::common::{Envelope, User};
use manage_core::kernel::{fields_from, BaseDocumentStore, DocumentPath, MemoryDocumentStore};
use serde_json::{json, Value};

use super::TEST_SOURCE;

/// Inbound envelope from `user_id` with the fixture source and socket.
pub fn envelope(domain: &str, command: &str, user_id: &str, payload: Value) -> Envelope {
    Envelope {
        domain: domain.to_string(),
        action: "chat".to_string(),
        command: command.to_string(),
        payload,
        user: User::new(user_id),
        socket_id: Some(format!("socket-{}", user_id)),
        source: Some(TEST_SOURCE.to_string()),
        event_id: None,
    }
}

/// Same as `envelope` with extra profile attributes on the user.
pub fn envelope_with_user(domain: &str, command: &str, user: Value, payload: Value) -> Envelope {
    let user: User = serde_json::from_value(user).expect("fixture user must be an object");
    Envelope {
        socket_id: Some(format!("socket-{}", user.id)),
        user,
        ..envelope(domain, command, "", payload)
    }
}

async fn seed(store: &MemoryDocumentStore, path: DocumentPath, data: Value) {
    let object = data.as_object().cloned().expect("fixture data must be an object");
    store
        .set_document(&path, fields_from(object), false)
        .await
        .expect("seeding the memory store failed");
}

/// Room with the given `configuration`
pub async fn seed_room(store: &MemoryDocumentStore, room_id: &str, configuration: Value) {
    seed(
        store,
        DocumentPath::room(room_id),
        json!({ "name": room_id, "messages": [], "configuration": configuration }),
    )
    .await;
}

pub async fn seed_instance(
    store: &MemoryDocumentStore,
    room_id: &str,
    instance_id: &str,
    data: Value,
) {
    seed(store, DocumentPath::instance(room_id, instance_id), data).await;
}

/// Room-level message
pub async fn seed_room_message(
    store: &MemoryDocumentStore,
    room_id: &str,
    message_id: &str,
    data: Value,
) {
    let path = DocumentPath::room(room_id).collection("messages").doc(message_id);
    seed(store, path, data).await;
}

pub async fn seed_instance_message(
    store: &MemoryDocumentStore,
    room_id: &str,
    instance_id: &str,
    message_id: &str,
    data: Value,
) {
    let path = DocumentPath::instance(room_id, instance_id)
        .collection("messages")
        .doc(message_id);
    seed(store, path, data).await;
}

pub fn room_message_path(room_id: &str, message_id: &str) -> DocumentPath {
    DocumentPath::room(room_id).collection("messages").doc(message_id)
}

pub fn instance_message_path(room_id: &str, instance_id: &str, message_id: &str) -> DocumentPath {
    DocumentPath::instance(room_id, instance_id)
        .collection("messages")
        .doc(message_id)
}
