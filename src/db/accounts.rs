//! Account balance and reputation operations
//!
//! Accounts are created lazily: crediting or rewarding an identity
//! that has never appeared before inserts its row first. Reads on a
//! missing identity report zero. Balances are debited only after a
//! sufficiency check, so no sequence of operations can drive a
//! balance below zero.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Account row from database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRow {
    pub identity: String,
    pub balance: u64,
    pub reputation: u64,
    pub created_at: String,
    pub updated_at: String,
}

impl AccountRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        let balance: i64 = row.get("balance")?;
        let reputation: i64 = row.get("reputation")?;
        Ok(Self {
            identity: row.get("identity")?,
            balance: balance as u64,
            reputation: reputation as u64,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Convert an API amount to the stored representation
///
/// The balance column is a SQLite INTEGER, so amounts beyond i64 range
/// cannot be represented and are rejected before any write.
pub(crate) fn to_db_amount(amount: u64, field: &str) -> Result<i64, LedgerError> {
    i64::try_from(amount)
        .map_err(|_| LedgerError::InvalidInput(format!("{} is out of range", field)))
}

/// Get an account by identity
pub fn get_account(conn: &Connection, identity: &str) -> Result<Option<AccountRow>, LedgerError> {
    let mut stmt = conn
        .prepare("SELECT * FROM accounts WHERE identity = ?")
        .map_err(|e| LedgerError::Internal(format!("Prepare failed: {}", e)))?;

    let mut rows = stmt
        .query(params![identity])
        .map_err(|e| LedgerError::Internal(format!("Query failed: {}", e)))?;

    if let Some(row) = rows.next().map_err(|e| LedgerError::Internal(format!("Row fetch failed: {}", e)))? {
        let account = AccountRow::from_row(row)
            .map_err(|e| LedgerError::Internal(format!("Row parse failed: {}", e)))?;
        Ok(Some(account))
    } else {
        Ok(None)
    }
}

/// Insert the account row if the identity has never been seen
pub fn ensure_account(conn: &Connection, identity: &str) -> Result<(), LedgerError> {
    conn.execute(
        "INSERT OR IGNORE INTO accounts (identity) VALUES (?)",
        params![identity],
    ).map_err(|e| LedgerError::Internal(format!("Account insert failed: {}", e)))?;

    Ok(())
}

fn balance_of(conn: &Connection, identity: &str) -> Result<i64, LedgerError> {
    let mut stmt = conn
        .prepare("SELECT balance FROM accounts WHERE identity = ?")
        .map_err(|e| LedgerError::Internal(format!("Prepare failed: {}", e)))?;

    let mut rows = stmt
        .query(params![identity])
        .map_err(|e| LedgerError::Internal(format!("Query failed: {}", e)))?;

    match rows.next().map_err(|e| LedgerError::Internal(format!("Row fetch failed: {}", e)))? {
        Some(row) => row.get(0).map_err(|e| LedgerError::Internal(format!("Row parse failed: {}", e))),
        None => Ok(0),
    }
}

fn reputation_of(conn: &Connection, identity: &str) -> Result<i64, LedgerError> {
    let mut stmt = conn
        .prepare("SELECT reputation FROM accounts WHERE identity = ?")
        .map_err(|e| LedgerError::Internal(format!("Prepare failed: {}", e)))?;

    let mut rows = stmt
        .query(params![identity])
        .map_err(|e| LedgerError::Internal(format!("Query failed: {}", e)))?;

    match rows.next().map_err(|e| LedgerError::Internal(format!("Row fetch failed: {}", e)))? {
        Some(row) => row.get(0).map_err(|e| LedgerError::Internal(format!("Row parse failed: {}", e))),
        None => Ok(0),
    }
}

/// Get the token balance for an identity (0 if never seen)
pub fn get_balance(conn: &Connection, identity: &str) -> Result<u64, LedgerError> {
    Ok(balance_of(conn, identity)? as u64)
}

/// Get the reputation score for an identity (0 if never seen)
pub fn get_reputation(conn: &Connection, identity: &str) -> Result<u64, LedgerError> {
    Ok(reputation_of(conn, identity)? as u64)
}

/// Add tokens to an account, creating it if needed
pub fn credit(conn: &Connection, identity: &str, amount: u64) -> Result<(), LedgerError> {
    let amount = to_db_amount(amount, "amount")?;

    ensure_account(conn, identity)?;

    let current = balance_of(conn, identity)?;
    let next = current
        .checked_add(amount)
        .ok_or_else(|| LedgerError::InvalidInput(format!("credit would overflow balance for {}", identity)))?;

    conn.execute(
        "UPDATE accounts SET balance = ?, updated_at = datetime('now') WHERE identity = ?",
        params![next, identity],
    ).map_err(|e| LedgerError::Internal(format!("Balance update failed: {}", e)))?;

    Ok(())
}

/// Remove tokens from an account
///
/// Fails with `InsufficientBalance` when the account cannot cover the
/// amount, leaving the balance untouched. An identity that has never
/// been seen has balance 0 and fails the same way.
pub fn debit(conn: &Connection, identity: &str, amount: u64) -> Result<(), LedgerError> {
    let db_amount = to_db_amount(amount, "amount")?;

    let current = balance_of(conn, identity)?;
    if current < db_amount {
        return Err(LedgerError::InsufficientBalance {
            required: amount,
            available: current as u64,
        });
    }

    conn.execute(
        "UPDATE accounts SET balance = balance - ?, updated_at = datetime('now') WHERE identity = ?",
        params![db_amount, identity],
    ).map_err(|e| LedgerError::Internal(format!("Balance update failed: {}", e)))?;

    Ok(())
}

/// Add reputation points to an account, creating it if needed
pub fn add_reputation(conn: &Connection, identity: &str, points: u64) -> Result<(), LedgerError> {
    let points = to_db_amount(points, "points")?;

    ensure_account(conn, identity)?;

    conn.execute(
        "UPDATE accounts SET reputation = reputation + ?, updated_at = datetime('now') WHERE identity = ?",
        params![points, identity],
    ).map_err(|e| LedgerError::Internal(format!("Reputation update failed: {}", e)))?;

    Ok(())
}
