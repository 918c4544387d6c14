//! trail-admin — one-shot maintenance for a Trail activity-log store.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens the
//! SQLite store, and performs a single administrative action. Scheduling
//! (e.g. a nightly prune) is left to cron or the surrounding deployment.

use std::path::PathBuf;

use anyhow::Context as _;
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use trail_core::{config::AuditConfig, event::EntityRef, store::ActivityStore as _};
use trail_store_sqlite::SqliteStore;

/// Runtime configuration, deserialised from `config.toml`.
#[derive(Deserialize)]
struct TrailConfig {
  store_path: PathBuf,
  #[serde(default)]
  audit: AuditConfig,
}

#[derive(Parser)]
#[command(author, version, about = "Trail activity-log maintenance")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Delete logs (and, by cascade, their details) that are out of
  /// retention.
  Prune {
    /// Override the configured retention window, in days.
    #[arg(long)]
    days: Option<u32>,
  },

  /// Mark a root entity's history as read.
  MarkSeen {
    #[arg(long)]
    entity_type: String,

    #[arg(long)]
    entity_id: String,
  },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("TRAIL"))
    .build()
    .context("failed to read config file")?;

  let trail_cfg: TrailConfig = settings
    .try_deserialize()
    .context("failed to deserialise TrailConfig")?;

  let store = SqliteStore::open(&trail_cfg.store_path, trail_cfg.audit.clone())
    .await
    .with_context(|| format!("failed to open store at {:?}", trail_cfg.store_path))?;

  match cli.command {
    Command::Prune { days } => {
      let mut audit: AuditConfig = trail_cfg.audit;
      if let Some(days) = days {
        audit.retention_days = days;
      }

      let cutoff = audit.retention_cutoff(Utc::now());
      let deleted = store.prune(cutoff).await.context("prune failed")?;
      tracing::info!(%cutoff, deleted, "pruned activity logs");
    }

    Command::MarkSeen { entity_type, entity_id } => {
      let entity = EntityRef::new(entity_type, entity_id);
      let log = store
        .find_log(&entity)
        .await
        .context("log lookup failed")?
        .with_context(|| format!("no activity log for {entity}"))?;

      store.mark_seen(log.log_id).await.context("mark-seen failed")?;
      tracing::info!(%entity, "marked history as read");
    }
  }

  Ok(())
}
