pub mod types;
pub mod error;
pub mod config;
pub mod registry;
pub mod pairing;
pub mod bracket;
pub mod results;
pub mod leaderboard;
pub mod layout;
pub mod commands;

use config::{load_config_inner, load_env_file, log_dir};
use std::fs;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use types::*;

// ── Logging ────────────────────────────────────────────────────────────

/// Install the global subscriber: daily rolling file in the configured log
/// directory, filter from `RUST_LOG` or else `config.log_filter`.
///
/// Keep the returned guard alive for as long as logs should be flushed.
/// Returns `None` when a subscriber is already installed.
pub fn init_logging(config: &EngineConfig) -> Option<WorkerGuard> {
    let logs_dir = log_dir(config);
    fs::create_dir_all(&logs_dir).ok();
    let file_appender = tracing_appender::rolling::daily(&logs_dir, "bracket.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .with_writer(non_blocking)
        .with_ansi(false)
        .try_init()
        .ok()?;
    Some(guard)
}

// ── Entry point ────────────────────────────────────────────────────────

/// Load `.env` and the engine config, start logging, and hand back an
/// empty registry for the host to share between its command handlers.
pub fn start() -> (SharedBracketRegistry, Option<WorkerGuard>) {
    load_env_file();
    let loaded = load_config_inner();
    let config = loaded.clone().unwrap_or_default();
    let guard = init_logging(&config);
    match loaded {
        Ok(_) => info!(
            mode = ?config.default_mode,
            separation = ?config.separation,
            seeded = config.shuffle_seed.is_some(),
            "bracket engine starting"
        ),
        Err(e) => error!("{e}; falling back to default config"),
    }
    (commands::init_registry(config), guard)
}
