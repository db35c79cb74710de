//! Core engine — markets, wagers, resolution, and payouts.
//!
//! Defines the `PredictionMarket` trait (the surface the application
//! layer calls) and `Engine`, which implements it over a shared
//! `LedgerStore`.

pub mod clock;
pub mod lifecycle;
pub mod odds;
pub mod settlement;
pub mod wagering;

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

use crate::storage::ledger::LedgerStore;
use crate::types::{Bet, BetId, Market, MarketId, MarketStatus, NewMarket, Side, User, WagerError};
use clock::{Clock, SystemClock};
use lifecycle::MarketLifecycle;
use odds::Odds;
use settlement::SettlementService;
use wagering::{WageringConfig, WageringService};

/// Operations exposed to the surrounding application.
///
/// Every method either applies its whole effect or none of it, and
/// reports failures as a typed `WagerError`.
#[async_trait]
pub trait PredictionMarket: Send + Sync {
    async fn register_user(&self, address: &str, initial_balance: Decimal) -> Result<User, WagerError>;

    async fn get_user(&self, address: &str) -> Result<User, WagerError>;

    /// Snapshot of all markets, oldest first.
    async fn list_markets(&self) -> Vec<Market>;

    async fn get_market(&self, id: &MarketId) -> Result<Market, WagerError>;

    /// Create a Pending market. Initial pools default to zero.
    async fn create_market(&self, params: NewMarket) -> Result<Market, WagerError>;

    /// Open a Pending market for wagers.
    async fn activate(&self, id: &MarketId) -> Result<Market, WagerError>;

    async fn place_bet(&self, id: &MarketId, address: &str, side: Side, amount: Decimal) -> Result<Bet, WagerError>;

    /// Open (unclaimed) bets of a user.
    async fn list_bets(&self, address: &str) -> Result<Vec<Bet>, WagerError>;

    async fn resolve(&self, id: &MarketId, result: Side) -> Result<Market, WagerError>;

    /// Claim every winning open bet the user holds on a market.
    async fn claim(&self, id: &MarketId, address: &str) -> Result<Decimal, WagerError>;

    /// Claim a single bet by identity.
    async fn claim_bet(&self, address: &str, bet_id: BetId) -> Result<Decimal, WagerError>;

    async fn compute_odds(&self, id: &MarketId) -> Result<Odds, WagerError>;

    /// Potential reward of a stake at current odds; `None` when unbounded.
    async fn quote_payout(&self, id: &MarketId, side: Side, amount: Decimal) -> Result<Option<Decimal>, WagerError>;

    /// What `claim` would currently pay, without consuming anything.
    async fn pending_reward(&self, id: &MarketId, address: &str) -> Result<Decimal, WagerError>;
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct Engine {
    ledger: Arc<LedgerStore>,
    clock: Arc<dyn Clock>,
    wagering: WageringService,
    settlement: SettlementService,
}

impl Engine {
    pub fn new(ledger: Arc<LedgerStore>, clock: Arc<dyn Clock>, config: WageringConfig) -> Self {
        Self {
            wagering: WageringService::new(ledger.clone(), clock.clone(), config),
            settlement: SettlementService::new(ledger.clone()),
            ledger,
            clock,
        }
    }

    /// Engine over an empty ledger with wall-clock time and default rules.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(LedgerStore::new()), Arc::new(SystemClock), WageringConfig::default())
    }

    /// The backing ledger, for snapshotting.
    pub fn ledger(&self) -> &Arc<LedgerStore> {
        &self.ledger
    }
}

#[async_trait]
impl PredictionMarket for Engine {
    async fn register_user(&self, address: &str, initial_balance: Decimal) -> Result<User, WagerError> {
        let user = self
            .ledger
            .insert_user(User { address: address.to_string(), balance: initial_balance })
            .await?;
        info!(user = address, balance = format!("${:.2}", initial_balance), "User registered");
        Ok(user)
    }

    async fn get_user(&self, address: &str) -> Result<User, WagerError> {
        self.ledger.user(address).await
    }

    async fn list_markets(&self) -> Vec<Market> {
        self.ledger.markets().await
    }

    async fn get_market(&self, id: &MarketId) -> Result<Market, WagerError> {
        self.ledger.market(id).await
    }

    async fn create_market(&self, params: NewMarket) -> Result<Market, WagerError> {
        for pool in [params.yes_pool, params.no_pool] {
            if pool.is_sign_negative() {
                return Err(WagerError::InvalidAmount(pool));
            }
        }
        if params.yes_pool.checked_add(params.no_pool).is_none() {
            return Err(WagerError::InvalidAmount(params.no_pool));
        }

        let market = Market {
            id: MarketId::generate(),
            title: params.title,
            description: params.description,
            end_time: params.end_time,
            created_at: self.clock.now(),
            status: MarketStatus::Pending,
            yes_pool: params.yes_pool,
            no_pool: params.no_pool,
            result: None,
        };
        let market = self.ledger.insert_market(market).await?;
        info!(
            market_id = %market.id,
            title = %market.title,
            end_time = %market.end_time,
            yes_pool = %market.yes_pool,
            no_pool = %market.no_pool,
            "Market created"
        );
        Ok(market)
    }

    async fn activate(&self, id: &MarketId) -> Result<Market, WagerError> {
        let market = self
            .ledger
            .update_market(id, |market| {
                MarketLifecycle::activate(market)?;
                Ok(market.clone())
            })
            .await?;
        info!(market_id = %id, "Market opened for wagers");
        Ok(market)
    }

    async fn place_bet(&self, id: &MarketId, address: &str, side: Side, amount: Decimal) -> Result<Bet, WagerError> {
        self.wagering.place_bet(id, address, side, amount).await
    }

    async fn list_bets(&self, address: &str) -> Result<Vec<Bet>, WagerError> {
        self.ledger.open_bets(address).await
    }

    async fn resolve(&self, id: &MarketId, result: Side) -> Result<Market, WagerError> {
        self.settlement.resolve(id, result).await
    }

    async fn claim(&self, id: &MarketId, address: &str) -> Result<Decimal, WagerError> {
        self.settlement.claim(id, address).await
    }

    async fn claim_bet(&self, address: &str, bet_id: BetId) -> Result<Decimal, WagerError> {
        self.settlement.claim_bet(address, bet_id).await
    }

    async fn compute_odds(&self, id: &MarketId) -> Result<Odds, WagerError> {
        let market = self.ledger.market(id).await?;
        Ok(odds::market_odds(&market))
    }

    async fn quote_payout(&self, id: &MarketId, side: Side, amount: Decimal) -> Result<Option<Decimal>, WagerError> {
        if amount <= Decimal::ZERO {
            return Err(WagerError::InvalidAmount(amount));
        }
        let market = self.ledger.market(id).await?;
        Ok(odds::potential_payout(&odds::market_odds(&market), side, amount))
    }

    async fn pending_reward(&self, id: &MarketId, address: &str) -> Result<Decimal, WagerError> {
        self.settlement.pending_reward(id, address).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
