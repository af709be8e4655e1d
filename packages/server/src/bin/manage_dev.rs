//! Local driver for the command engine
//!
//! Runs JSON envelope files through the router against an in-memory store,
//! printing every envelope that would have been published. Files run in
//! order and share one store, so a session can be scripted as a sequence.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use manage_core::common::Envelope;
use manage_core::kernel::{ChannelConfig, MemoryDocumentStore, ServerDeps, TestNats};
use manage_core::server::CommandRouter;
use manage_core::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "manage_dev")]
#[command(about = "Run command envelopes against an in-memory store")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode each JSON envelope file and dispatch it, in order
    Run {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Print the base64 form of a JSON envelope file
    Encode { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,manage_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { files } => run(&files).await,
        Commands::Encode { file } => {
            println!("{}", encode_file(&file)?);
            Ok(())
        }
    }
}

async fn run(files: &[PathBuf]) -> Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;
    let nats = Arc::new(TestNats::new());
    let deps = ServerDeps::new(
        Arc::new(MemoryDocumentStore::new()),
        nats.clone(),
        ChannelConfig::from(&config),
    );
    let router = CommandRouter::new(Arc::new(deps));

    for file in files {
        let encoded = encode_file(file)?;
        let outcome = router.handle_raw(Some(encoded.as_bytes())).await;
        println!("# {} -> {:?}", file.display(), outcome);

        for message in nats.published_messages() {
            let body: serde_json::Value = serde_json::from_slice(&message.payload)
                .context("Published payload is not JSON")?;
            println!("{}", message.subject);
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        nats.clear();
    }

    Ok(())
}

fn encode_file(file: &Path) -> Result<String> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let envelope: Envelope = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a valid envelope", file.display()))?;
    envelope.encode().context("Failed to encode envelope")
}
