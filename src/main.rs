//! PARIMUTUEL — pari-mutuel prediction market wagering engine
//!
//! Entry point. Loads configuration, initialises structured logging,
//! restores the ledger from disk (or seeds a fresh one), and keeps it
//! flushed to disk until shutdown.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use parimutuel::config;
use parimutuel::engine::clock::SystemClock;
use parimutuel::engine::odds;
use parimutuel::engine::wagering::WageringConfig;
use parimutuel::engine::{Engine, PredictionMarket};
use parimutuel::seed;
use parimutuel::storage::{self, ledger::LedgerStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path = std::env::var("PARIMUTUEL_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let cfg = config::AppConfig::load(&config_path)?;

    init_logging();

    info!(
        engine = %cfg.engine.name,
        snapshot_interval_secs = cfg.engine.snapshot_interval_secs,
        enforce_end_time = cfg.wagering.enforce_end_time,
        state_file = %cfg.storage.state_file,
        "Engine starting up"
    );

    // -- Restore or seed the ledger --------------------------------------

    let state_file = cfg.storage.state_file.as_str();
    let (ledger, fresh) = match storage::load_ledger(Some(state_file))? {
        Some(store) => (store, false),
        None => (LedgerStore::new(), true),
    };

    let engine = Engine::new(
        Arc::new(ledger),
        Arc::new(SystemClock),
        WageringConfig::from(&cfg.wagering),
    );

    if fresh {
        seed::seed_ledger(&engine, &cfg.seed).await?;
        storage::flush_ledger(engine.ledger(), Some(state_file)).await?;
    }

    log_market_summary(&engine).await;

    // -- Flush loop ------------------------------------------------------

    let mut interval = tokio::time::interval(Duration::from_secs(cfg.engine.snapshot_interval_secs));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!("Ledger live. Press Ctrl+C to stop.");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = storage::flush_ledger(engine.ledger(), Some(state_file)).await {
                    error!(error = %e, "Failed to flush ledger");
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    storage::flush_ledger(engine.ledger(), Some(state_file)).await?;
    info!(state_file, "Ledger flushed. Shut down cleanly.");

    Ok(())
}

/// Log each market with its current odds.
async fn log_market_summary(engine: &Engine) {
    let markets = engine.list_markets().await;
    info!(count = markets.len(), "Markets loaded");
    for market in &markets {
        info!(
            market_id = %market.id,
            status = %market.status,
            total_pool = format!("${:.2}", market.total_pool()),
            odds = %odds::market_odds(market),
            "{}",
            market.title
        );
    }
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("parimutuel=info"));

    let json_logging = std::env::var("PARIMUTUEL_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
