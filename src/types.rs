//! Shared types for the wagering engine.
//!
//! These types form the data model used across all modules.
//! They are kept free of locking and I/O so that the ledger, the
//! engine services, and persistence can all depend on them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Opaque, unique market identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarketId(String);

impl MarketId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        MarketId(Uuid::new_v4().to_string())
    }
}

impl From<&str> for MarketId {
    fn from(s: &str) -> Self {
        MarketId(s.to_string())
    }
}

impl From<String> for MarketId {
    fn from(s: String) -> Self {
        MarketId(s)
    }
}

impl fmt::Display for MarketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identity of a single accepted wager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BetId(Uuid);

impl BetId {
    pub fn generate() -> Self {
        BetId(Uuid::new_v4())
    }
}

impl fmt::Display for BetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Bet direction, also used as the resolved outcome of a market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Yes,
    No,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Yes => write!(f, "YES"),
            Side::No => write!(f, "NO"),
        }
    }
}

/// Attempt to parse a string into a Side (case-insensitive).
impl std::str::FromStr for Side {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "yes" | "y" => Ok(Side::Yes),
            "no" | "n" => Ok(Side::No),
            _ => Err(anyhow::anyhow!("Unknown side: {s}")),
        }
    }
}

/// Market lifecycle status. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarketStatus {
    Pending,
    Active,
    Resolved,
}

impl fmt::Display for MarketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketStatus::Pending => write!(f, "Pending"),
            MarketStatus::Active => write!(f, "Active"),
            MarketStatus::Resolved => write!(f, "Resolved"),
        }
    }
}

impl std::str::FromStr for MarketStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(MarketStatus::Pending),
            "active" => Ok(MarketStatus::Active),
            "resolved" => Ok(MarketStatus::Resolved),
            _ => Err(anyhow::anyhow!("Unknown market status: {s}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Market
// ---------------------------------------------------------------------------

/// A binary-outcome pari-mutuel market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    pub id: MarketId,
    pub title: String,
    pub description: String,
    /// Instant after which no new bets are legal (informational unless enforced).
    pub end_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub status: MarketStatus,
    pub yes_pool: Decimal,
    pub no_pool: Decimal,
    /// Present iff `status == Resolved`.
    pub result: Option<Side>,
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} (YES pool: ${:.2} | NO pool: ${:.2} | {})",
            self.status, self.title, self.yes_pool, self.no_pool, self.id,
        )?;
        if let Some(result) = self.result {
            write!(f, " -> {result}")?;
        }
        Ok(())
    }
}

impl Market {
    /// Accumulated stake on one side.
    pub fn pool(&self, side: Side) -> Decimal {
        match side {
            Side::Yes => self.yes_pool,
            Side::No => self.no_pool,
        }
    }

    /// Both pools combined. Saturates; `check_invariants` rejects any
    /// market whose total is not representable.
    pub fn total_pool(&self) -> Decimal {
        self.yes_pool.saturating_add(self.no_pool)
    }

    pub fn checked_total_pool(&self) -> Option<Decimal> {
        self.yes_pool.checked_add(self.no_pool)
    }

    /// The pool matching the result, once resolved.
    pub fn winning_pool(&self) -> Option<Decimal> {
        self.result.map(|side| self.pool(side))
    }

    /// Whether `now` is past the market's end-time.
    pub fn is_past_end(&self, now: DateTime<Utc>) -> bool {
        now > self.end_time
    }

    /// Check the record-level invariants: result iff resolved, pools
    /// non-negative with a representable total.
    pub fn check_invariants(&self) -> Result<(), WagerError> {
        if self.yes_pool.is_sign_negative() || self.no_pool.is_sign_negative() {
            return Err(WagerError::InvariantViolation(format!(
                "market {} has a negative pool",
                self.id
            )));
        }
        if self.checked_total_pool().is_none() {
            return Err(WagerError::InvariantViolation(format!(
                "market {} total pool overflows",
                self.id
            )));
        }
        match (self.status, self.result) {
            (MarketStatus::Resolved, Some(_)) => Ok(()),
            (MarketStatus::Resolved, None) => Err(WagerError::InvariantViolation(format!(
                "market {} is resolved without a result",
                self.id
            ))),
            (_, Some(_)) => Err(WagerError::InvariantViolation(format!(
                "market {} carries a result while {}",
                self.id, self.status
            ))),
            (_, None) => Ok(()),
        }
    }
}

/// Parameters for creating a market.
#[derive(Debug, Clone)]
pub struct NewMarket {
    pub title: String,
    pub description: String,
    pub end_time: DateTime<Utc>,
    pub yes_pool: Decimal,
    pub no_pool: Decimal,
}

impl NewMarket {
    pub fn new(title: impl Into<String>, description: impl Into<String>, end_time: DateTime<Utc>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            end_time,
            yes_pool: Decimal::ZERO,
            no_pool: Decimal::ZERO,
        }
    }

    /// Seed both pools with initial liquidity.
    pub fn with_pools(mut self, yes_pool: Decimal, no_pool: Decimal) -> Self {
        self.yes_pool = yes_pool;
        self.no_pool = no_pool;
        self
    }
}

// ---------------------------------------------------------------------------
// User & Bet
// ---------------------------------------------------------------------------

/// A wallet identity with a spendable balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub address: String,
    pub balance: Decimal,
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (balance: ${:.2})", self.address, self.balance)
    }
}

/// An open (unclaimed) wager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bet {
    pub id: BetId,
    pub user: String,
    pub market_id: MarketId,
    pub side: Side,
    pub amount: Decimal,
    pub placed_at: DateTime<Utc>,
}

impl fmt::Display for Bet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ${:.2} on {} [{}]",
            self.side, self.amount, self.market_id, self.id,
        )
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Record kind named in a `NotFound` failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Market,
    User,
    Bet,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Market => write!(f, "Market"),
            Entity::User => write!(f, "User"),
            Entity::Bet => write!(f, "Bet"),
        }
    }
}

/// Typed, recoverable failures returned by every engine operation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WagerError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: Entity, id: String },

    #[error("Invalid amount: {0}")]
    InvalidAmount(Decimal),

    #[error("Market is not active (status: {status})")]
    MarketNotActive { status: MarketStatus },

    #[error("Market is not resolved yet (status: {status})")]
    MarketNotResolved { status: MarketStatus },

    #[error("Insufficient balance: need ${needed:.2}, have ${available:.2}")]
    InsufficientBalance { needed: Decimal, available: Decimal },

    #[error("Market already resolved")]
    AlreadyResolved,

    #[error("No winning bet found")]
    NoWinningBet,

    #[error("Illegal market transition: {from} -> {to}")]
    InvalidTransition { from: MarketStatus, to: MarketStatus },

    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("Ledger invariant violated: {0}")]
    InvariantViolation(String),
}

impl WagerError {
    pub fn market_not_found(id: &MarketId) -> Self {
        WagerError::NotFound { entity: Entity::Market, id: id.to_string() }
    }

    pub fn user_not_found(address: &str) -> Self {
        WagerError::NotFound { entity: Entity::User, id: address.to_string() }
    }

    /// Stable taxonomy name, suitable for mapping onto a transport's error codes.
    pub fn kind(&self) -> &'static str {
        match self {
            WagerError::NotFound { .. } => "NotFound",
            WagerError::InvalidAmount(_) => "InvalidAmount",
            WagerError::MarketNotActive { .. } => "MarketNotActive",
            WagerError::MarketNotResolved { .. } => "MarketNotResolved",
            WagerError::InsufficientBalance { .. } => "InsufficientBalance",
            WagerError::AlreadyResolved => "AlreadyResolved",
            WagerError::NoWinningBet => "NoWinningBet",
            WagerError::InvalidTransition { .. } => "InvalidTransition",
            WagerError::UserExists(_) => "UserExists",
            WagerError::InvariantViolation(_) => "InvariantViolation",
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
