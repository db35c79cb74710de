//! Settlement — resolution and pari-mutuel payouts.
//!
//! A winner's reward is their share of the winning pool applied to the
//! total pool. Claimed bets are removed from the open set in the same
//! atomic unit as the balance credit; that removal is what makes a
//! claim pay exactly once.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info};

use super::lifecycle::{MarketLifecycle, Operation};
use crate::storage::ledger::LedgerStore;
use crate::types::{Bet, BetId, Entity, Market, MarketId, Side, WagerError};

/// Reward owed on `stake` for a resolved `market`:
/// `stake / winning_pool * total_pool`, multiplied first unless the
/// product overflows.
pub fn payout(stake: Decimal, market: &Market) -> Result<Decimal, WagerError> {
    let winning = market.winning_pool().ok_or(WagerError::MarketNotResolved { status: market.status })?;
    if winning <= Decimal::ZERO {
        return Err(WagerError::InvariantViolation(format!(
            "market {} has an empty winning pool",
            market.id
        )));
    }
    let total = market
        .checked_total_pool()
        .ok_or_else(|| WagerError::InvariantViolation(format!("total pool overflow on market {}", market.id)))?;
    stake
        .checked_mul(total)
        .and_then(|gross| gross.checked_div(winning))
        .or_else(|| stake.checked_div(winning).and_then(|share| share.checked_mul(total)))
        .ok_or_else(|| WagerError::InvariantViolation(format!("payout overflow on market {}", market.id)))
}

fn credit(balance: Decimal, reward: Decimal) -> Result<Decimal, WagerError> {
    balance.checked_add(reward).ok_or(WagerError::InvalidAmount(reward))
}

fn is_winner(bet: &Bet, market_id: &MarketId, result: Side) -> bool {
    &bet.market_id == market_id && bet.side == result
}

pub struct SettlementService {
    ledger: Arc<LedgerStore>,
}

impl SettlementService {
    pub fn new(ledger: Arc<LedgerStore>) -> Self {
        Self { ledger }
    }

    /// Fix the market's outcome. Legal only from Active.
    pub async fn resolve(&self, market_id: &MarketId, result: Side) -> Result<Market, WagerError> {
        let resolved = self
            .ledger
            .update_market(market_id, |market| {
                MarketLifecycle::resolve(market, result)?;
                Ok(market.clone())
            })
            .await;

        match &resolved {
            Ok(m) => info!(
                %market_id,
                %result,
                yes_pool = %m.yes_pool,
                no_pool = %m.no_pool,
                "Market resolved"
            ),
            Err(e) => debug!(%market_id, error = %e, "Resolve rejected"),
        }
        resolved
    }

    /// Pay out every open winning bet `address` holds on the market and
    /// remove them. A second call finds nothing and fails with
    /// `NoWinningBet`.
    pub async fn claim(&self, market_id: &MarketId, address: &str) -> Result<Decimal, WagerError> {
        let claimed = self
            .ledger
            .update_position(market_id, address, |market, account| {
                MarketLifecycle::ensure_allowed(market.status, Operation::Claim)?;
                let result = market.result.ok_or(WagerError::MarketNotResolved { status: market.status })?;

                let (winners, rest): (Vec<Bet>, Vec<Bet>) = std::mem::take(&mut account.open_bets)
                    .into_iter()
                    .partition(|bet| is_winner(bet, market_id, result));
                if winners.is_empty() {
                    return Err(WagerError::NoWinningBet);
                }

                let mut reward = Decimal::ZERO;
                for bet in &winners {
                    reward = reward
                        .checked_add(payout(bet.amount, market)?)
                        .ok_or(WagerError::InvalidAmount(reward))?;
                }
                account.open_bets = rest;
                account.user.balance = credit(account.user.balance, reward)?;
                Ok((reward, winners.len()))
            })
            .await;

        match claimed {
            Ok((reward, bets)) => {
                info!(
                    %market_id,
                    user = address,
                    bets,
                    reward = format!("${:.2}", reward),
                    "Reward claimed"
                );
                Ok(reward)
            }
            Err(e) => {
                debug!(%market_id, user = address, error = %e, "Claim rejected");
                Err(e)
            }
        }
    }

    /// Pay out one specific open bet.
    pub async fn claim_bet(&self, address: &str, bet_id: BetId) -> Result<Decimal, WagerError> {
        let market_id = self
            .ledger
            .open_bets(address)
            .await?
            .into_iter()
            .find(|b| b.id == bet_id)
            .map(|b| b.market_id)
            .ok_or_else(|| WagerError::NotFound { entity: Entity::Bet, id: bet_id.to_string() })?;

        let claimed = self
            .ledger
            .update_position(&market_id, address, |market, account| {
                MarketLifecycle::ensure_allowed(market.status, Operation::Claim)?;
                let result = market.result.ok_or(WagerError::MarketNotResolved { status: market.status })?;

                // Re-read under the lock: a concurrent claim may have taken it.
                let pos = account
                    .open_bets
                    .iter()
                    .position(|b| b.id == bet_id)
                    .ok_or(WagerError::NoWinningBet)?;
                if account.open_bets[pos].side != result {
                    return Err(WagerError::NoWinningBet);
                }

                let bet = account.open_bets.remove(pos);
                let reward = payout(bet.amount, market)?;
                account.user.balance = credit(account.user.balance, reward)?;
                Ok(reward)
            })
            .await;

        match &claimed {
            Ok(reward) => info!(
                %bet_id,
                %market_id,
                user = address,
                reward = format!("${:.2}", reward),
                "Bet claimed"
            ),
            Err(e) => debug!(%bet_id, user = address, error = %e, "Bet claim rejected"),
        }
        claimed
    }

    /// What `claim` would pay right now, without consuming anything.
    /// Zero when the user holds no winning bet.
    pub async fn pending_reward(&self, market_id: &MarketId, address: &str) -> Result<Decimal, WagerError> {
        let market = self.ledger.market(market_id).await?;
        MarketLifecycle::ensure_allowed(market.status, Operation::Claim)?;
        let result = market.result.ok_or(WagerError::MarketNotResolved { status: market.status })?;

        let mut total = Decimal::ZERO;
        for bet in self.ledger.open_bets(address).await? {
            if is_winner(&bet, market_id, result) {
                total = total
                    .checked_add(payout(bet.amount, &market)?)
                    .ok_or(WagerError::InvalidAmount(total))?;
            }
        }
        Ok(total)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
