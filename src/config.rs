//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Every section has defaults so a partial file is enough.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs;

use crate::engine::wagering::WageringConfig;
use crate::storage::DEFAULT_STATE_FILE;
use crate::types::{MarketStatus, Side};

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub wagering: WageringSection,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub seed: SeedConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    pub name: String,
    /// How often the live ledger is flushed to disk.
    pub snapshot_interval_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            name: "parimutuel".to_string(),
            snapshot_interval_secs: 60,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct WageringSection {
    #[serde(default)]
    pub enforce_end_time: bool,
}

impl From<&WageringSection> for WageringConfig {
    fn from(section: &WageringSection) -> Self {
        WageringConfig { enforce_end_time: section.enforce_end_time }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub state_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { state_file: DEFAULT_STATE_FILE.to_string() }
    }
}

/// Initial data created on a fresh start.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SeedConfig {
    pub user_address: Option<String>,
    #[serde(default)]
    pub user_balance: Decimal,
    #[serde(default)]
    pub markets: Vec<SeedMarket>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SeedMarket {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub days_until_end: i64,
    #[serde(default = "default_seed_status")]
    pub status: MarketStatus,
    #[serde(default)]
    pub yes_pool: Decimal,
    #[serde(default)]
    pub no_pool: Decimal,
    /// Required when `status` is Resolved.
    pub result: Option<Side>,
}

fn default_seed_status() -> MarketStatus {
    MarketStatus::Pending
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Parse configuration from TOML text.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.engine.snapshot_interval_secs == 0 {
            anyhow::bail!("engine.snapshot_interval_secs must be positive");
        }
        if self.seed.user_balance.is_sign_negative() {
            anyhow::bail!("seed.user_balance must not be negative");
        }
        for m in &self.seed.markets {
            if m.yes_pool.is_sign_negative() || m.no_pool.is_sign_negative() {
                anyhow::bail!("seed market '{}' has a negative pool", m.title);
            }
            match (m.status, m.result) {
                (MarketStatus::Resolved, None) => {
                    anyhow::bail!("seed market '{}' is Resolved but has no result", m.title)
                }
                (MarketStatus::Pending | MarketStatus::Active, Some(_)) => {
                    anyhow::bail!("seed market '{}' has a result but is not Resolved", m.title)
                }
                _ => {}
            }
        }
        Ok(())
    }
}
