//! Server dependencies for command handlers (using traits for testability)
//!
//! This module provides the dependency container every handler receives.
//! The document store and event publisher are trait objects so tests can
//! swap in the in-memory store and `TestNats`.

use std::sync::Arc;

use crate::common::channel_for;
use crate::config::Config;
use crate::kernel::{BaseDocumentStore, BaseEventPublisher};

// =============================================================================
// Channels
// =============================================================================

/// Base names of the outbound channels.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Caller-facing results, suffixed with the envelope `source`
    pub gateway: String,
    /// Administrative copy of `create` results
    pub manage: String,
}

impl ChannelConfig {
    pub fn new(gateway: impl Into<String>, manage: impl Into<String>) -> Self {
        Self {
            gateway: gateway.into(),
            manage: manage.into(),
        }
    }

    pub fn gateway_for(&self, source: Option<&str>) -> String {
        channel_for(&self.gateway, source)
    }

    pub fn manage_channel(&self) -> String {
        channel_for(&self.manage, None)
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self::new("ex-gateway", "ex-manage")
    }
}

impl From<&Config> for ChannelConfig {
    fn from(config: &Config) -> Self {
        Self::new(&config.gateway_channel, &config.manage_channel)
    }
}

// =============================================================================
// ServerDeps
// =============================================================================

/// Server dependencies accessible to handlers (using traits for testability)
#[derive(Clone)]
pub struct ServerDeps {
    pub store: Arc<dyn BaseDocumentStore>,
    pub publisher: Arc<dyn BaseEventPublisher>,
    pub channels: ChannelConfig,
}

impl ServerDeps {
    /// Create new ServerDeps with the given dependencies
    pub fn new(
        store: Arc<dyn BaseDocumentStore>,
        publisher: Arc<dyn BaseEventPublisher>,
        channels: ChannelConfig,
    ) -> Self {
        Self {
            store,
            publisher,
            channels,
        }
    }
}
