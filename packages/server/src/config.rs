use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub nats_url: String,
    /// Subject the worker subscribes to for inbound command envelopes
    pub inbound_subject: String,
    /// Base name of the caller-facing result channel
    pub gateway_channel: String,
    /// Base name of the administrative copy channel (used by `create`)
    pub manage_channel: String,
    /// Postgres document store. When unset the worker keeps documents in memory.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            nats_url: env::var("NATS_URL").unwrap_or_else(|_| "nats://localhost:4222".to_string()),
            inbound_subject: env::var("INBOUND_SUBJECT")
                .unwrap_or_else(|_| "ex-manage-inbound".to_string()),
            gateway_channel: env::var("GATEWAY_CHANNEL")
                .unwrap_or_else(|_| "ex-gateway".to_string()),
            manage_channel: env::var("MANAGE_CHANNEL")
                .unwrap_or_else(|_| "ex-manage".to_string()),
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("DATABASE_MAX_CONNECTIONS must be a valid number")?,
        })
    }
}
