//! Authoritative ledger for markets, users, and open bets.
//!
//! Every record lives behind its own async mutex. Mutations go through
//! `update_market` / `update_position`, which run the caller's closure
//! against a scratch copy and commit only if the closure succeeds and the
//! result passes the ledger invariants. Nothing outside this module ever
//! holds a reference into a live pool or balance.
//!
//! Lock order is fixed: snapshot gate (shared) → market → account.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::engine::lifecycle::MarketLifecycle;
use crate::types::{Bet, Market, MarketId, MarketStatus, User, WagerError};

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A user together with their open (unclaimed) bets.
///
/// Bets live with the user so that a balance change and the bet set it
/// pays for always commit under the same lock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub user: User,
    pub open_bets: Vec<Bet>,
}

impl Account {
    pub fn new(user: User) -> Self {
        Self { user, open_bets: Vec::new() }
    }
}

/// A consistent, point-in-time copy of the whole ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub taken_at: DateTime<Utc>,
    pub markets: Vec<Market>,
    pub accounts: Vec<Account>,
}

impl LedgerSnapshot {
    pub fn open_bet_count(&self) -> usize {
        self.accounts.iter().map(|a| a.open_bets.len()).sum()
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

pub struct LedgerStore {
    /// Mutations hold this shared; `snapshot` holds it exclusively.
    gate: RwLock<()>,
    markets: RwLock<HashMap<MarketId, Arc<Mutex<Market>>>>,
    accounts: RwLock<HashMap<String, Arc<Mutex<Account>>>>,
}

impl Default for LedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerStore {
    /// An empty ledger.
    pub fn new() -> Self {
        Self {
            gate: RwLock::new(()),
            markets: RwLock::new(HashMap::new()),
            accounts: RwLock::new(HashMap::new()),
        }
    }

    /// Rebuild a ledger from a snapshot, rejecting any record that breaks
    /// the ledger invariants.
    pub fn restore(snapshot: LedgerSnapshot) -> Result<Self, WagerError> {
        let mut markets = HashMap::with_capacity(snapshot.markets.len());
        for market in snapshot.markets {
            market.check_invariants()?;
            let id = market.id.clone();
            if markets.insert(id.clone(), Arc::new(Mutex::new(market))).is_some() {
                return Err(WagerError::InvariantViolation(format!("duplicate market {id}")));
            }
        }

        let mut accounts = HashMap::with_capacity(snapshot.accounts.len());
        let mut seen_bets = HashSet::new();
        for account in snapshot.accounts {
            check_account(&account)?;
            for bet in &account.open_bets {
                if !markets.contains_key(&bet.market_id) {
                    return Err(WagerError::InvariantViolation(format!(
                        "bet {} references unknown market {}",
                        bet.id, bet.market_id
                    )));
                }
                if !seen_bets.insert(bet.id) {
                    return Err(WagerError::InvariantViolation(format!("duplicate bet {}", bet.id)));
                }
            }
            let address = account.user.address.clone();
            if accounts.insert(address.clone(), Arc::new(Mutex::new(account))).is_some() {
                return Err(WagerError::UserExists(address));
            }
        }

        debug!(markets = markets.len(), accounts = accounts.len(), "Ledger restored");

        Ok(Self {
            gate: RwLock::new(()),
            markets: RwLock::new(markets),
            accounts: RwLock::new(accounts),
        })
    }

    /// Take a consistent copy of every record. Waits for in-flight
    /// mutations to finish and holds new ones off while copying.
    pub async fn snapshot(&self) -> LedgerSnapshot {
        let _exclusive = self.gate.write().await;

        let market_cells: Vec<_> = self.markets.read().await.values().cloned().collect();
        let mut markets = Vec::with_capacity(market_cells.len());
        for cell in market_cells {
            markets.push(cell.lock().await.clone());
        }
        markets.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        let account_cells: Vec<_> = self.accounts.read().await.values().cloned().collect();
        let mut accounts = Vec::with_capacity(account_cells.len());
        for cell in account_cells {
            accounts.push(cell.lock().await.clone());
        }
        accounts.sort_by(|a, b| a.user.address.cmp(&b.user.address));

        LedgerSnapshot { taken_at: Utc::now(), markets, accounts }
    }

    // -- Inserts -----------------------------------------------------------

    pub async fn insert_market(&self, market: Market) -> Result<Market, WagerError> {
        market.check_invariants()?;
        let _shared = self.gate.read().await;
        let mut markets = self.markets.write().await;
        if markets.contains_key(&market.id) {
            return Err(WagerError::InvariantViolation(format!("duplicate market {}", market.id)));
        }
        markets.insert(market.id.clone(), Arc::new(Mutex::new(market.clone())));
        Ok(market)
    }

    pub async fn insert_user(&self, user: User) -> Result<User, WagerError> {
        if user.balance.is_sign_negative() {
            return Err(WagerError::InvalidAmount(user.balance));
        }
        let _shared = self.gate.read().await;
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&user.address) {
            return Err(WagerError::UserExists(user.address));
        }
        accounts.insert(user.address.clone(), Arc::new(Mutex::new(Account::new(user.clone()))));
        Ok(user)
    }

    // -- Reads -------------------------------------------------------------

    pub async fn market(&self, id: &MarketId) -> Result<Market, WagerError> {
        let cell = self.market_cell(id).await?;
        let market = cell.lock().await;
        Ok(market.clone())
    }

    /// All markets, oldest first.
    pub async fn markets(&self) -> Vec<Market> {
        let cells: Vec<_> = self.markets.read().await.values().cloned().collect();
        let mut markets = Vec::with_capacity(cells.len());
        for cell in cells {
            markets.push(cell.lock().await.clone());
        }
        markets.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        markets
    }

    pub async fn user(&self, address: &str) -> Result<User, WagerError> {
        let cell = self.account_cell(address).await?;
        let account = cell.lock().await;
        Ok(account.user.clone())
    }

    pub async fn account(&self, address: &str) -> Result<Account, WagerError> {
        let cell = self.account_cell(address).await?;
        let account = cell.lock().await;
        Ok(account.clone())
    }

    pub async fn open_bets(&self, address: &str) -> Result<Vec<Bet>, WagerError> {
        Ok(self.account(address).await?.open_bets)
    }

    // -- Atomic updates ----------------------------------------------------

    /// Apply `f` to one market. The change is committed only if `f`
    /// returns `Ok` and the new record passes the market invariants.
    pub async fn update_market<T, F>(&self, id: &MarketId, f: F) -> Result<T, WagerError>
    where
        F: FnOnce(&mut Market) -> Result<T, WagerError>,
    {
        let _shared = self.gate.read().await;
        let cell = self.market_cell(id).await?;
        let mut market = cell.lock().await;

        let mut draft = market.clone();
        let out = f(&mut draft)?;
        check_market_transition(&market, &draft)?;
        *market = draft;
        Ok(out)
    }

    /// Apply `f` to a market and a user's account as one unit. Both
    /// records are locked (market first) for the duration; either both
    /// drafts are committed or neither is.
    pub async fn update_position<T, F>(&self, id: &MarketId, address: &str, f: F) -> Result<T, WagerError>
    where
        F: FnOnce(&mut Market, &mut Account) -> Result<T, WagerError>,
    {
        let _shared = self.gate.read().await;
        let market_cell = self.market_cell(id).await?;
        let account_cell = self.account_cell(address).await?;

        let mut market = market_cell.lock().await;
        let mut account = account_cell.lock().await;

        let mut market_draft = market.clone();
        let mut account_draft = account.clone();
        let out = f(&mut market_draft, &mut account_draft)?;

        check_market_transition(&market, &market_draft)?;
        check_account_transition(&account, &account_draft, id)?;

        *market = market_draft;
        *account = account_draft;
        Ok(out)
    }

    // -- Internals ---------------------------------------------------------

    async fn market_cell(&self, id: &MarketId) -> Result<Arc<Mutex<Market>>, WagerError> {
        self.markets
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| WagerError::market_not_found(id))
    }

    async fn account_cell(&self, address: &str) -> Result<Arc<Mutex<Account>>, WagerError> {
        self.accounts
            .read()
            .await
            .get(address)
            .cloned()
            .ok_or_else(|| WagerError::user_not_found(address))
    }
}

// ---------------------------------------------------------------------------
// Invariants
// ---------------------------------------------------------------------------

fn violation(msg: String) -> WagerError {
    warn!(reason = %msg, "Rejected mutation that would break ledger invariants");
    WagerError::InvariantViolation(msg)
}

fn check_market_transition(before: &Market, after: &Market) -> Result<(), WagerError> {
    after.check_invariants()?;

    if before.id != after.id {
        return Err(violation(format!("market {} changed identity", before.id)));
    }
    if before.status != after.status && !MarketLifecycle::can_transition(before.status, after.status) {
        return Err(violation(format!(
            "market {} moved {} -> {}",
            before.id, before.status, after.status
        )));
    }
    if after.yes_pool < before.yes_pool || after.no_pool < before.no_pool {
        return Err(violation(format!("market {} pool decreased", before.id)));
    }
    if before.status == MarketStatus::Resolved
        && (after.yes_pool != before.yes_pool || after.no_pool != before.no_pool || after.result != before.result)
    {
        return Err(violation(format!("market {} changed after resolution", before.id)));
    }
    Ok(())
}

fn check_account(account: &Account) -> Result<(), WagerError> {
    if account.user.balance.is_sign_negative() {
        return Err(violation(format!("user {} has a negative balance", account.user.address)));
    }
    for bet in &account.open_bets {
        if bet.amount <= Decimal::ZERO {
            return Err(violation(format!("bet {} has a non-positive stake", bet.id)));
        }
        if bet.user != account.user.address {
            return Err(violation(format!(
                "bet {} belongs to {}, filed under {}",
                bet.id, bet.user, account.user.address
            )));
        }
    }
    Ok(())
}

fn check_account_transition(before: &Account, after: &Account, market_id: &MarketId) -> Result<(), WagerError> {
    check_account(after)?;

    if before.user.address != after.user.address {
        return Err(violation(format!("user {} changed identity", before.user.address)));
    }
    let known: HashSet<_> = before.open_bets.iter().map(|b| b.id).collect();
    for bet in after.open_bets.iter().filter(|b| !known.contains(&b.id)) {
        if &bet.market_id != market_id {
            return Err(violation(format!(
                "bet {} recorded against unlocked market {}",
                bet.id, bet.market_id
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
