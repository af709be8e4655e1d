// Main entry point for the command worker

use std::sync::Arc;

use anyhow::{Context, Result};
use futures::StreamExt;
use manage_core::kernel::{
    BaseDocumentStore, ChannelConfig, MemoryDocumentStore, NatsClientPublisher, PgDocumentStore,
    ServerDeps,
};
use manage_core::server::CommandRouter;
use manage_core::Config;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,manage_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting conversation command worker");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    let store = connect_store(&config).await?;

    // Connect to NATS
    tracing::info!(url = %config.nats_url, "Connecting to NATS...");
    let client = async_nats::connect(&config.nats_url)
        .await
        .context("Failed to connect to NATS")?;
    tracing::info!("NATS connected");

    let deps = ServerDeps::new(
        store,
        Arc::new(NatsClientPublisher::new(client.clone())),
        ChannelConfig::from(&config),
    );
    let router = CommandRouter::new(Arc::new(deps));

    let mut inbound = client
        .subscribe(config.inbound_subject.clone())
        .await
        .context("Failed to subscribe to inbound subject")?;
    tracing::info!(subject = %config.inbound_subject, "Listening for command envelopes");

    loop {
        tokio::select! {
            message = inbound.next() => {
                let Some(message) = message else {
                    tracing::warn!("Inbound subscription closed");
                    break;
                };
                let router = router.clone();
                tokio::spawn(async move {
                    let data = (!message.payload.is_empty()).then_some(message.payload.as_ref());
                    let outcome = router.handle_raw(data).await;
                    tracing::debug!(?outcome, "Envelope processed");
                });
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received");
                break;
            }
        }
    }

    client.flush().await.context("Failed to flush NATS client")?;
    Ok(())
}

async fn connect_store(config: &Config) -> Result<Arc<dyn BaseDocumentStore>> {
    let Some(database_url) = &config.database_url else {
        tracing::warn!("DATABASE_URL not set; documents are kept in memory");
        return Ok(Arc::new(MemoryDocumentStore::new()));
    };

    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    let store = PgDocumentStore::new(pool);
    tracing::info!("Running database migrations...");
    store.migrate().await?;
    tracing::info!("Migrations complete");

    Ok(Arc::new(store))
}
