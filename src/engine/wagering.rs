//! Wagering service.
//!
//! Validates a bet against its market and the bettor's balance, then
//! applies pool increment, balance debit, and bet record as one unit.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info};

use super::clock::Clock;
use super::lifecycle::{MarketLifecycle, Operation};
use crate::storage::ledger::LedgerStore;
use crate::types::{Bet, BetId, MarketId, Side, WagerError};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct WageringConfig {
    /// Reject bets placed after the market's end-time.
    pub enforce_end_time: bool,
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

pub struct WageringService {
    ledger: Arc<LedgerStore>,
    clock: Arc<dyn Clock>,
    config: WageringConfig,
}

impl WageringService {
    pub fn new(ledger: Arc<LedgerStore>, clock: Arc<dyn Clock>, config: WageringConfig) -> Self {
        Self { ledger, clock, config }
    }

    /// Place a bet of `amount` on `side`.
    ///
    /// Checks run in order: market exists, amount positive, market
    /// active, user exists, balance sufficient. The status and balance
    /// checks are repeated under the ledger locks, so a concurrent
    /// resolve or wager can't slip between check and commit.
    pub async fn place_bet(
        &self,
        market_id: &MarketId,
        address: &str,
        side: Side,
        amount: Decimal,
    ) -> Result<Bet, WagerError> {
        let market = self.ledger.market(market_id).await?;

        if amount <= Decimal::ZERO {
            debug!(%market_id, user = address, %amount, "Rejected non-positive wager");
            return Err(WagerError::InvalidAmount(amount));
        }

        let now = self.clock.now();
        MarketLifecycle::ensure_allowed(market.status, Operation::Wager)?;
        if self.config.enforce_end_time && market.is_past_end(now) {
            debug!(%market_id, end_time = %market.end_time, "Rejected wager after end-time");
            return Err(WagerError::MarketNotActive { status: market.status });
        }

        let result = self
            .ledger
            .update_position(market_id, address, |market, account| {
                MarketLifecycle::ensure_allowed(market.status, Operation::Wager)?;

                let available = account.user.balance;
                if available < amount {
                    return Err(WagerError::InsufficientBalance { needed: amount, available });
                }

                let pool = match side {
                    Side::Yes => &mut market.yes_pool,
                    Side::No => &mut market.no_pool,
                };
                *pool = pool.checked_add(amount).ok_or(WagerError::InvalidAmount(amount))?;
                if market.checked_total_pool().is_none() {
                    return Err(WagerError::InvalidAmount(amount));
                }
                account.user.balance = available - amount;

                let bet = Bet {
                    id: BetId::generate(),
                    user: address.to_string(),
                    market_id: market_id.clone(),
                    side,
                    amount,
                    placed_at: now,
                };
                account.open_bets.push(bet.clone());
                Ok(bet)
            })
            .await;

        match &result {
            Ok(bet) => info!(
                bet_id = %bet.id,
                %market_id,
                user = address,
                %side,
                amount = format!("${:.2}", amount),
                "Bet placed"
            ),
            Err(e) => debug!(%market_id, user = address, error = %e, "Bet rejected"),
        }
        result
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
