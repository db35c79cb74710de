//! Pari-mutuel odds quoting.
//!
//! Maps pool sizes to payout multipliers. Pure: no state is read or
//! consumed, so quotes can be taken any number of times.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{Market, Side};

/// Payout multiplier for one side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quote {
    Finite(Decimal),
    /// The quoted side has an empty pool while the other side holds stake.
    Unbounded,
}

impl Quote {
    pub fn multiplier(&self) -> Option<Decimal> {
        match self {
            Quote::Finite(m) => Some(*m),
            Quote::Unbounded => None,
        }
    }

    /// Lossy view for display; unbounded maps to `f64::INFINITY`.
    pub fn as_f64(&self) -> f64 {
        match self {
            Quote::Finite(m) => m.to_f64().unwrap_or(f64::INFINITY),
            Quote::Unbounded => f64::INFINITY,
        }
    }
}

impl fmt::Display for Quote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quote::Finite(m) => write!(f, "{:.2}x", m),
            Quote::Unbounded => write!(f, "∞"),
        }
    }
}

/// Quotes for both sides of a market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Odds {
    pub yes: Quote,
    pub no: Quote,
}

impl Odds {
    pub fn for_side(&self, side: Side) -> Quote {
        match side {
            Side::Yes => self.yes,
            Side::No => self.no,
        }
    }
}

impl fmt::Display for Odds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "YES {} | NO {}", self.yes, self.no)
    }
}

/// Compute odds from raw pool sizes.
///
/// An empty market quotes break-even (1x) on both sides. Otherwise each
/// side pays `total / side_pool`. The total saturates at `Decimal::MAX`.
pub fn compute_odds(yes_pool: Decimal, no_pool: Decimal) -> Odds {
    let total = yes_pool.saturating_add(no_pool);
    if total.is_zero() {
        return Odds {
            yes: Quote::Finite(Decimal::ONE),
            no: Quote::Finite(Decimal::ONE),
        };
    }
    Odds {
        yes: side_quote(total, yes_pool),
        no: side_quote(total, no_pool),
    }
}

/// Compute odds for a market's current pools.
pub fn market_odds(market: &Market) -> Odds {
    compute_odds(market.yes_pool, market.no_pool)
}

/// Potential reward of staking `amount` on `side` at the current quote.
pub fn potential_payout(odds: &Odds, side: Side, amount: Decimal) -> Option<Decimal> {
    odds.for_side(side).multiplier().and_then(|m| amount.checked_mul(m))
}

fn side_quote(total: Decimal, side_pool: Decimal) -> Quote {
    if side_pool.is_zero() {
        return Quote::Unbounded;
    }
    total
        .checked_div(side_pool)
        .map(Quote::Finite)
        .unwrap_or(Quote::Unbounded)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
