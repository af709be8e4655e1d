//! Test harness for router-level integration tests.
//!
//! Wires a `CommandRouter` to the in-memory document store and the recording
//! `TestNats` publisher, so tests can dispatch envelopes and inspect both the
//! stored documents and every published envelope.

use std::sync::Arc;

use manage_core::common::{Envelope, OutboundEnvelope};
use manage_core::kernel::{
    BaseDocumentStore, BaseEventPublisher, ChannelConfig, DocumentPath, MemoryDocumentStore,
    ServerDeps, TestNats,
};
use manage_core::server::{CommandRouter, Outcome};
use serde_json::{Map, Value};

/// Envelope `source` used by fixtures; results land on `ex-gateway-test`.
pub const TEST_SOURCE: &str = "test";
pub const GATEWAY_SUBJECT: &str = "ex-gateway-test";
pub const MANAGE_SUBJECT: &str = "ex-manage";

pub struct TestHarness {
    /// Backing store - use this for fixtures and assertions.
    pub store: Arc<MemoryDocumentStore>,
    /// Records every published envelope.
    pub nats: Arc<TestNats>,
    pub router: CommandRouter,
}

impl TestHarness {
    pub fn new() -> Self {
        init_tracing();

        let store = Arc::new(MemoryDocumentStore::new());
        let nats = Arc::new(TestNats::new());
        let router = router_with(store.clone(), nats.clone());

        Self {
            store,
            nats,
            router,
        }
    }

    /// Harness whose router uses substitute adapters (failure injection).
    /// `store` and `nats` are still the in-memory ones behind them.
    pub fn with_router(
        store: Arc<MemoryDocumentStore>,
        nats: Arc<TestNats>,
        router_store: Arc<dyn BaseDocumentStore>,
        router_publisher: Arc<dyn BaseEventPublisher>,
    ) -> Self {
        init_tracing();

        Self {
            store,
            nats,
            router: router_with(router_store, router_publisher),
        }
    }

    pub async fn dispatch(&self, envelope: Envelope) -> Outcome {
        self.router.handle(envelope).await
    }

    /// Envelopes published on the gateway channel, in order.
    pub fn replies(&self) -> Vec<OutboundEnvelope> {
        self.nats.envelopes_for(GATEWAY_SUBJECT)
    }

    /// The most recent gateway envelope.
    pub fn last_reply(&self) -> OutboundEnvelope {
        self.replies()
            .pop()
            .expect("expected a published gateway envelope")
    }

    pub async fn document(&self, path: &DocumentPath) -> Option<Map<String, Value>> {
        self.store
            .get_document(path)
            .await
            .expect("memory store read failed")
            .map(|doc| doc.data)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

fn router_with(
    store: Arc<dyn BaseDocumentStore>,
    publisher: Arc<dyn BaseEventPublisher>,
) -> CommandRouter {
    let deps = ServerDeps::new(store, publisher, ChannelConfig::default());
    CommandRouter::new(Arc::new(deps))
}

/// Respect RUST_LOG in tests. Run with: RUST_LOG=debug cargo test -- --nocapture
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
