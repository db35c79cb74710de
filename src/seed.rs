//! Demo data for a fresh ledger.
//!
//! Creates the configured wallet and markets, walking each market
//! through the legal lifecycle transitions to its configured status.

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use tracing::info;

use crate::config::{SeedConfig, SeedMarket};
use crate::engine::PredictionMarket;
use crate::types::{Market, MarketStatus, NewMarket, User};

/// What a seeding pass created.
#[derive(Debug, Clone, Default)]
pub struct SeedReport {
    pub user: Option<User>,
    pub markets: Vec<Market>,
}

/// Seed `engine` from configuration.
pub async fn seed_ledger(engine: &dyn PredictionMarket, seed: &SeedConfig) -> Result<SeedReport> {
    let mut report = SeedReport::default();

    if let Some(address) = &seed.user_address {
        let user = engine
            .register_user(address, seed.user_balance)
            .await
            .with_context(|| format!("Failed to seed user {address}"))?;
        report.user = Some(user);
    }

    for entry in &seed.markets {
        let market = seed_market(engine, entry)
            .await
            .with_context(|| format!("Failed to seed market '{}'", entry.title))?;
        report.markets.push(market);
    }

    info!(
        user = report.user.as_ref().map(|u| u.address.as_str()).unwrap_or("-"),
        markets = report.markets.len(),
        "Ledger seeded"
    );
    Ok(report)
}

async fn seed_market(engine: &dyn PredictionMarket, entry: &SeedMarket) -> Result<Market> {
    let params = NewMarket::new(
        entry.title.clone(),
        entry.description.clone(),
        Utc::now() + Duration::days(entry.days_until_end),
    )
    .with_pools(entry.yes_pool, entry.no_pool);

    let mut market = engine.create_market(params).await?;
    if matches!(entry.status, MarketStatus::Active | MarketStatus::Resolved) {
        market = engine.activate(&market.id).await?;
    }
    if entry.status == MarketStatus::Resolved {
        let result = entry
            .result
            .with_context(|| format!("Resolved seed market '{}' has no result", entry.title))?;
        market = engine.resolve(&market.id, result).await?;
    }
    Ok(market)
}
