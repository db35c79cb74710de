//! Market lifecycle state machine.
//!
//! Pending → Active → Resolved, forward only. Transitions are triggered
//! externally; the end-time never moves a market on its own.

use tracing::debug;

use crate::types::{Market, MarketStatus, Side, WagerError};

/// Operations whose legality depends on market status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Wager,
    Resolve,
    Claim,
}

pub struct MarketLifecycle;

impl MarketLifecycle {
    /// Whether `from → to` is a legal transition.
    pub fn can_transition(from: MarketStatus, to: MarketStatus) -> bool {
        matches!(
            (from, to),
            (MarketStatus::Pending, MarketStatus::Active) | (MarketStatus::Active, MarketStatus::Resolved)
        )
    }

    /// Check that `op` is legal for a market in `status`.
    pub fn ensure_allowed(status: MarketStatus, op: Operation) -> Result<(), WagerError> {
        match (op, status) {
            (Operation::Wager, MarketStatus::Active) => Ok(()),
            (Operation::Wager, status) => Err(WagerError::MarketNotActive { status }),

            (Operation::Resolve, MarketStatus::Active) => Ok(()),
            (Operation::Resolve, MarketStatus::Resolved) => Err(WagerError::AlreadyResolved),
            (Operation::Resolve, status) => Err(WagerError::MarketNotActive { status }),

            (Operation::Claim, MarketStatus::Resolved) => Ok(()),
            (Operation::Claim, status) => Err(WagerError::MarketNotResolved { status }),
        }
    }

    /// Pending → Active.
    pub fn activate(market: &mut Market) -> Result<(), WagerError> {
        Self::transition(market, MarketStatus::Active)?;
        debug!(market_id = %market.id, "Market activated");
        Ok(())
    }

    /// Active → Resolved, fixing the result. Pools are frozen from here on.
    pub fn resolve(market: &mut Market, result: Side) -> Result<(), WagerError> {
        Self::ensure_allowed(market.status, Operation::Resolve)?;
        Self::transition(market, MarketStatus::Resolved)?;
        market.result = Some(result);
        debug!(market_id = %market.id, %result, "Market resolved");
        Ok(())
    }

    fn transition(market: &mut Market, to: MarketStatus) -> Result<(), WagerError> {
        if !Self::can_transition(market.status, to) {
            return Err(WagerError::InvalidTransition { from: market.status, to });
        }
        market.status = to;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
