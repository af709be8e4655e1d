//! NATS event publisher for production and testing.
//!
//! Provides a `BaseEventPublisher` backed by a real NATS connection and a
//! recording mock that tests inspect instead of a live server.

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use std::sync::{RwLock, RwLockReadGuard};
use uuid::Uuid;

use super::traits::BaseEventPublisher;
use crate::common::OutboundEnvelope;

/// A published message.
#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub subject: String,
    pub payload: Bytes,
}

impl PublishedMessage {
    /// Decode the payload as a result envelope.
    pub fn envelope(&self) -> std::result::Result<OutboundEnvelope, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }
}

/// Real NATS client publisher.
pub struct NatsClientPublisher {
    client: async_nats::Client,
}

impl NatsClientPublisher {
    pub fn new(client: async_nats::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BaseEventPublisher for NatsClientPublisher {
    async fn publish(&self, channel: &str, payload: &Value) -> Result<String> {
        let bytes = Bytes::from(serde_json::to_vec(payload)?);
        self.client
            .publish(channel.to_string(), bytes)
            .await
            .with_context(|| format!("failed to publish to {}", channel))?;
        // Core NATS has no broker-side id; flush so the message has left the client.
        self.client
            .flush()
            .await
            .with_context(|| format!("failed to flush publish to {}", channel))?;
        Ok(Uuid::new_v4().to_string())
    }
}

/// Recording publisher for tests and the `manage_dev` runner.
///
/// Nothing leaves the process; every publish is kept in order so callers can
/// assert on channels and decoded envelopes.
#[derive(Default)]
pub struct TestNats {
    published: RwLock<Vec<PublishedMessage>>,
}

impl TestNats {
    pub fn new() -> Self {
        Self::default()
    }

    fn recorded(&self) -> RwLockReadGuard<'_, Vec<PublishedMessage>> {
        self.published.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn record_publish(&self, subject: String, payload: Bytes) {
        self.published
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(PublishedMessage { subject, payload });
    }

    /// Everything published so far, in order.
    pub fn published_messages(&self) -> Vec<PublishedMessage> {
        self.recorded().clone()
    }

    pub fn messages_for_subject(&self, subject: &str) -> Vec<PublishedMessage> {
        self.recorded()
            .iter()
            .filter(|m| m.subject == subject)
            .cloned()
            .collect()
    }

    /// Decoded envelopes published to a subject, in publish order.
    /// Payloads that are not envelopes are skipped.
    pub fn envelopes_for(&self, subject: &str) -> Vec<OutboundEnvelope> {
        self.recorded()
            .iter()
            .filter(|m| m.subject == subject)
            .filter_map(|m| m.envelope().ok())
            .collect()
    }

    pub fn was_published_to(&self, subject: &str) -> bool {
        self.recorded().iter().any(|m| m.subject == subject)
    }

    pub fn publish_count(&self) -> usize {
        self.recorded().len()
    }

    pub fn clear(&self) {
        self.published
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

#[async_trait]
impl BaseEventPublisher for TestNats {
    async fn publish(&self, channel: &str, payload: &Value) -> Result<String> {
        let bytes = Bytes::from(serde_json::to_vec(payload)?);
        self.record_publish(channel.to_string(), bytes);
        Ok(self.publish_count().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn records_publishes_per_subject() {
        let nats = TestNats::new();

        nats.record_publish(
            "ex-gateway-app".to_string(),
            Bytes::from(r#"{"id":"123"}"#),
        );

        assert_eq!(nats.publish_count(), 1);
        assert!(nats.was_published_to("ex-gateway-app"));
        assert!(!nats.was_published_to("ex-gateway"));
    }

    #[tokio::test]
    async fn publish_returns_distinct_delivery_ids() {
        let nats = TestNats::new();

        let first = nats.publish("ex-manage", &json!({ "a": 1 })).await.unwrap();
        let second = nats.publish("ex-gateway", &json!({ "b": 2 })).await.unwrap();

        assert_ne!(first, second);
        assert_eq!(nats.messages_for_subject("ex-manage").len(), 1);
        assert_eq!(nats.published_messages()[1].subject, "ex-gateway");
    }

    #[tokio::test]
    async fn envelopes_for_decodes_payloads() {
        let nats = TestNats::new();
        nats.publish(
            "ex-gateway",
            &json!({
                "domain": "admin",
                "action": "event",
                "command": "read",
                "payload": { "id": "r1" },
                "user": { "id": "u1" }
            }),
        )
        .await
        .unwrap();

        let envelopes = nats.envelopes_for("ex-gateway");
        assert_eq!(envelopes.len(), 1);
        assert_eq!(envelopes[0].payload["id"], "r1");
        assert!(!envelopes[0].is_error());
    }

    #[test]
    fn clear_forgets_recorded_messages() {
        let nats = TestNats::new();

        nats.record_publish("test".to_string(), Bytes::new());
        assert_eq!(nats.publish_count(), 1);

        nats.clear();

        assert_eq!(nats.publish_count(), 0);
    }
}
