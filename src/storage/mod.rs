//! Persistence layer.
//!
//! The live ledger is in memory (`ledger::LedgerStore`). Snapshots of it
//! are saved to and loaded from a JSON file so a restarted process can
//! pick up where it left off.

pub mod ledger;

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, info};

use ledger::{LedgerSnapshot, LedgerStore};

/// Default state file path.
pub const DEFAULT_STATE_FILE: &str = "parimutuel_state.json";

/// Save a ledger snapshot to a JSON file.
///
/// Writes to a sibling temp file first and renames it over the target,
/// so a crash mid-write never leaves a truncated state file.
pub fn save_snapshot(snapshot: &LedgerSnapshot, path: Option<&str>) -> Result<()> {
    let path = path.unwrap_or(DEFAULT_STATE_FILE);
    let json = serde_json::to_string_pretty(snapshot)
        .context("Failed to serialise ledger snapshot")?;

    let tmp = format!("{path}.tmp");
    std::fs::write(&tmp, &json)
        .context(format!("Failed to write snapshot to {tmp}"))?;
    std::fs::rename(&tmp, path)
        .context(format!("Failed to move snapshot into place at {path}"))?;

    debug!(
        path,
        markets = snapshot.markets.len(),
        accounts = snapshot.accounts.len(),
        "Snapshot saved"
    );
    Ok(())
}

/// Load a ledger snapshot from a JSON file.
/// Returns None if the file doesn't exist (fresh start).
pub fn load_snapshot(path: Option<&str>) -> Result<Option<LedgerSnapshot>> {
    let path = path.unwrap_or(DEFAULT_STATE_FILE);

    if !Path::new(path).exists() {
        info!(path, "No saved state found, starting fresh");
        return Ok(None);
    }

    let json = std::fs::read_to_string(path)
        .context(format!("Failed to read snapshot from {path}"))?;

    let snapshot: LedgerSnapshot = serde_json::from_str(&json)
        .context(format!("Failed to parse snapshot from {path}"))?;

    info!(
        path,
        markets = snapshot.markets.len(),
        accounts = snapshot.accounts.len(),
        open_bets = snapshot.open_bet_count(),
        taken_at = %snapshot.taken_at,
        "Snapshot loaded from disk"
    );

    Ok(Some(snapshot))
}

/// Load and validate a ledger from disk. None on a fresh start.
pub fn load_ledger(path: Option<&str>) -> Result<Option<LedgerStore>> {
    match load_snapshot(path)? {
        Some(snapshot) => {
            let store = LedgerStore::restore(snapshot)
                .context("Saved ledger failed validation")?;
            Ok(Some(store))
        }
        None => Ok(None),
    }
}

/// Snapshot the live ledger and write it out.
pub async fn flush_ledger(store: &LedgerStore, path: Option<&str>) -> Result<()> {
    let snapshot = store.snapshot().await;
    save_snapshot(&snapshot, path)
}

/// Delete the state file (for testing or reset).
pub fn delete_snapshot(path: Option<&str>) -> Result<()> {
    let path = path.unwrap_or(DEFAULT_STATE_FILE);
    if Path::new(path).exists() {
        std::fs::remove_file(path)
            .context(format!("Failed to delete state file {path}"))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
