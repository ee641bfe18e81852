//! Token movement log
//!
//! Every balance mutation appends one row here, inside the same
//! transaction that moves the tokens. The log is append-only; rows
//! are never updated or deleted.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Movement kinds recorded in the log
pub mod transfer_kinds {
    pub const MINT: &str = "mint";
    pub const TRANSFER: &str = "transfer";
    pub const REWARD: &str = "reward";
    pub const PURCHASE: &str = "purchase";
    pub const FUNDING: &str = "funding";

    pub const ALL: [&str; 5] = [MINT, TRANSFER, REWARD, PURCHASE, FUNDING];

    pub fn is_valid(kind: &str) -> bool {
        ALL.contains(&kind)
    }
}

/// Transfer row from database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRow {
    pub id: u64,
    pub kind: String,
    /// None for movements that create tokens (mint, reward)
    pub sender: Option<String>,
    pub recipient: String,
    pub amount: u64,
    /// Listing or proposal id when the movement settles a purchase or funding
    pub context_id: Option<u64>,
    pub created_at: String,
}

impl TransferRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        let id: i64 = row.get("id")?;
        let amount: i64 = row.get("amount")?;
        let context_id: Option<i64> = row.get("context_id")?;
        Ok(Self {
            id: id as u64,
            kind: row.get("kind")?,
            sender: row.get("sender")?,
            recipient: row.get("recipient")?,
            amount: amount as u64,
            context_id: context_id.map(|v| v as u64),
            created_at: row.get("created_at")?,
        })
    }
}

/// Query parameters for listing transfers
#[derive(Debug, Clone, Deserialize)]
pub struct TransferQuery {
    #[serde(default)]
    pub kind: Option<String>,
    /// Match sender or recipient
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

impl Default for TransferQuery {
    fn default() -> Self {
        Self {
            kind: None,
            account: None,
            limit: default_limit(),
            offset: 0,
        }
    }
}

fn default_limit() -> u32 {
    100
}

/// Append a movement to the log
pub fn record_transfer(
    conn: &Connection,
    kind: &str,
    sender: Option<&str>,
    recipient: &str,
    amount: u64,
    context_id: Option<u64>,
) -> Result<u64, LedgerError> {
    if !transfer_kinds::is_valid(kind) {
        return Err(LedgerError::InvalidInput(format!(
            "transfer kind '{}' is not valid. Valid kinds: {:?}",
            kind,
            transfer_kinds::ALL
        )));
    }

    let amount = super::accounts::to_db_amount(amount, "amount")?;
    let created_at = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();

    conn.execute(
        "INSERT INTO transfers (kind, sender, recipient, amount, context_id, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
        params![
            kind,
            sender,
            recipient,
            amount,
            context_id.map(|v| v as i64),
            created_at,
        ],
    ).map_err(|e| LedgerError::Internal(format!("Transfer insert failed: {}", e)))?;

    Ok(conn.last_insert_rowid() as u64)
}

/// Movements touching an account (as sender or recipient), newest first
pub fn transfers_for_account(
    conn: &Connection,
    identity: &str,
    limit: u32,
) -> Result<Vec<TransferRow>, LedgerError> {
    list_transfers(conn, &TransferQuery {
        account: Some(identity.to_string()),
        limit,
        ..Default::default()
    })
}

/// List movements with optional filters, newest first
pub fn list_transfers(conn: &Connection, query: &TransferQuery) -> Result<Vec<TransferRow>, LedgerError> {
    let mut sql = String::from("SELECT * FROM transfers");
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![];
    let mut conditions = vec![];

    if let Some(ref kind) = query.kind {
        conditions.push("kind = ?".to_string());
        params.push(Box::new(kind.clone()));
    }

    if let Some(ref account) = query.account {
        conditions.push("(sender = ? OR recipient = ?)".to_string());
        params.push(Box::new(account.clone()));
        params.push(Box::new(account.clone()));
    }

    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }

    sql.push_str(" ORDER BY id DESC LIMIT ? OFFSET ?");
    params.push(Box::new(query.limit as i64));
    params.push(Box::new(query.offset as i64));

    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| LedgerError::Internal(format!("Prepare failed: {}", e)))?;

    let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

    let rows = stmt
        .query_map(param_refs.as_slice(), |row| TransferRow::from_row(row))
        .map_err(|e| LedgerError::Internal(format!("Query failed: {}", e)))?;

    let mut results = vec![];
    for row_result in rows {
        results.push(row_result.map_err(|e| LedgerError::Internal(format!("Row parse failed: {}", e)))?);
    }

    Ok(results)
}
