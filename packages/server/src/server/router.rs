//! Command router.
//!
//! Decodes inbound envelopes, dispatches them to the rooms actions and
//! publishes exactly one outcome per handled command: the success envelope
//! (plus the management copy for `create`) or a single error envelope.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::common::timestamps::normalize_payload_dates;
use crate::common::{CallerClass, EngineError, EngineResult, Envelope, OutboundEnvelope};
use crate::domains::rooms::actions::{self, CommandContext, Reply};
use crate::domains::rooms::{Command, CommandKind};
use crate::kernel::ServerDeps;

/// What happened to one inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Absent or undecodable envelope; nothing published
    Dropped,
    /// Command this engine does not handle; nothing published
    Ignored,
    /// Handler succeeded and the result was published
    Completed,
    /// An error envelope was published (or attempted)
    Failed,
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed)
    }
}

#[derive(Clone)]
pub struct CommandRouter {
    deps: Arc<ServerDeps>,
}

impl CommandRouter {
    pub fn new(deps: Arc<ServerDeps>) -> Self {
        Self { deps }
    }

    /// Handle raw bytes from the inbound subject (base64-encoded JSON).
    pub async fn handle_raw(&self, data: Option<&[u8]>) -> Outcome {
        let Some(data) = data else {
            debug!("Dropping inbound message without data");
            return Outcome::Dropped;
        };

        match Envelope::decode(data) {
            Ok(envelope) => self.handle(envelope).await,
            Err(err) => {
                debug!(error = %err, "Dropping undecodable envelope");
                Outcome::Dropped
            }
        }
    }

    pub async fn handle(&self, mut envelope: Envelope) -> Outcome {
        let Some(kind) = CommandKind::from_name(&envelope.command) else {
            debug!(command = %envelope.command, "No handler for command");
            return Outcome::Ignored;
        };

        debug!(
            command = %kind,
            domain = %envelope.domain,
            user_id = %envelope.user.id,
            source = ?envelope.source(),
            "Dispatching command"
        );

        let result = match self.dispatch(kind, &mut envelope).await {
            Ok(reply) => self.publish_reply(&envelope, reply).await,
            Err(err) => Err(err),
        };

        match result {
            Ok(()) => Outcome::Completed,
            Err(err) => {
                self.publish_failure(kind, &envelope, &err).await;
                Outcome::Failed
            }
        }
    }

    async fn dispatch(&self, kind: CommandKind, envelope: &mut Envelope) -> EngineResult<Reply> {
        let caller = envelope.caller();
        if kind.requires_client() && caller != CallerClass::Client {
            return Err(EngineError::Unauthorized(format!(
                "{} is restricted to the client domain",
                kind
            )));
        }

        normalize_payload_dates(&mut envelope.payload)?;
        let command = Command::decode(kind, &envelope.payload)?;

        let ctx = CommandContext {
            deps: &self.deps,
            caller,
            user: &envelope.user,
            payload: &envelope.payload,
        };
        actions::execute(command, &ctx).await
    }

    async fn publish_reply(&self, envelope: &Envelope, reply: Reply) -> EngineResult<()> {
        let outbound = OutboundEnvelope::success(envelope, reply.payload);
        let body = serde_json::to_value(&outbound).map_err(anyhow::Error::from)?;
        let gateway = self.deps.channels.gateway_for(envelope.source());
        let publisher = &self.deps.publisher;

        if reply.manage_copy {
            let manage = self.deps.channels.manage_channel();
            futures::try_join!(
                publisher.publish(&manage, &body),
                publisher.publish(&gateway, &body)
            )?;
            info!(command = %envelope.command, channel = %gateway, manage_channel = %manage, "Published result");
        } else {
            publisher.publish(&gateway, &body).await?;
            info!(command = %envelope.command, channel = %gateway, "Published result");
        }
        Ok(())
    }

    async fn publish_failure(&self, kind: CommandKind, envelope: &Envelope, err: &EngineError) {
        warn!(command = %kind, user_id = %envelope.user.id, error = %err, "Command failed");

        let outbound = OutboundEnvelope::failure(envelope, err.to_string());
        let body = match serde_json::to_value(&outbound) {
            Ok(body) => body,
            Err(serialize_err) => {
                error!(error = %serialize_err, "Failed to serialize error envelope");
                return;
            }
        };

        let gateway = self.deps.channels.gateway_for(envelope.source());
        if let Err(publish_err) = self.deps.publisher.publish(&gateway, &body).await {
            error!(
                command = %kind,
                channel = %gateway,
                error = %publish_err,
                "Failed to publish error envelope"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::User;
    use crate::kernel::{ChannelConfig, MemoryDocumentStore, TestNats};
    use serde_json::{json, Value};

    fn router() -> (CommandRouter, Arc<TestNats>) {
        let nats = Arc::new(TestNats::new());
        let deps = ServerDeps::new(
            Arc::new(MemoryDocumentStore::new()),
            nats.clone(),
            ChannelConfig::default(),
        );
        (CommandRouter::new(Arc::new(deps)), nats)
    }

    fn envelope(domain: &str, command: &str, payload: Value) -> Envelope {
        Envelope {
            domain: domain.into(),
            action: "chat".into(),
            command: command.into(),
            payload,
            user: User::new("u1"),
            socket_id: Some("sock-1".into()),
            source: Some("app".into()),
            event_id: None,
        }
    }

    #[tokio::test]
    async fn missing_data_is_dropped() {
        let (router, nats) = router();
        assert_eq!(router.handle_raw(None).await, Outcome::Dropped);
        assert_eq!(router.handle_raw(Some(&b"%%%"[..])).await, Outcome::Dropped);
        assert_eq!(nats.publish_count(), 0);
    }

    #[tokio::test]
    async fn unknown_command_publishes_nothing() {
        let (router, nats) = router();
        let outcome = router
            .handle(envelope("consumer", "spammer", json!({ "id": "r1" })))
            .await;
        assert_eq!(outcome, Outcome::Ignored);
        assert_eq!(nats.publish_count(), 0);
    }

    #[tokio::test]
    async fn ban_from_non_client_is_unauthorized() {
        let (router, nats) = router();
        let payload = json!({ "id": "r1", "data": { "uuid": "m1" } });

        let outcome = router.handle(envelope("consumer", "ban", payload.clone())).await;

        assert_eq!(outcome, Outcome::Failed);
        let sent = nats.envelopes_for("ex-gateway-app");
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].error.as_deref(),
            Some("Unauthorized: ban is restricted to the client domain")
        );
        assert_eq!(sent[0].payload, payload);
        assert_eq!(sent[0].socket_id.as_deref(), Some("sock-1"));
    }

    #[tokio::test]
    async fn read_of_missing_room_fails_with_item_not_found() {
        let (router, nats) = router();
        let outcome = router
            .handle(envelope("consumer", "read", json!({ "id": "nope" })))
            .await;

        assert!(outcome.is_failure());
        let sent = nats.envelopes_for("ex-gateway-app");
        assert_eq!(sent[0].error.as_deref(), Some("item not found"));
    }

    #[tokio::test]
    async fn invalid_start_date_fails_before_dispatch() {
        let (router, nats) = router();
        let outcome = router
            .handle(envelope("admin", "create", json!({ "start_date": "soon" })))
            .await;

        assert_eq!(outcome, Outcome::Failed);
        assert_eq!(nats.publish_count(), 1);
        assert!(!nats.was_published_to("ex-manage"));
    }

    #[tokio::test]
    async fn create_publishes_management_and_gateway_copies() {
        let (router, nats) = router();
        let outcome = router
            .handle(envelope("admin", "create", json!({ "name": "Launch" })))
            .await;

        assert_eq!(outcome, Outcome::Completed);
        let manage = nats.envelopes_for("ex-manage");
        let gateway = nats.envelopes_for("ex-gateway-app");
        assert_eq!(manage.len(), 1);
        assert_eq!(gateway.len(), 1);
        assert_eq!(manage[0], gateway[0]);
        assert!(gateway[0].payload.get("id").is_some());
    }
}
