//! Research proposal registry operations

use std::fmt;

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::LedgerError;

/// Proposal lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
    Active,
    Completed,
    Cancelled,
}

impl ProposalStatus {
    pub const ALL: [ProposalStatus; 3] = [
        ProposalStatus::Active,
        ProposalStatus::Completed,
        ProposalStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Active => "active",
            ProposalStatus::Completed => "completed",
            ProposalStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ProposalStatus::Active),
            "completed" => Some(ProposalStatus::Completed),
            "cancelled" => Some(ProposalStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Proposal row from database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposalRow {
    pub id: u64,
    pub researcher: String,
    pub title: String,
    pub description: String,
    pub funding_goal: u64,
    pub current_funding: u64,
    pub status: ProposalStatus,
    pub created_at: String,
    pub updated_at: String,
}

impl ProposalRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        let id: i64 = row.get("id")?;
        let funding_goal: i64 = row.get("funding_goal")?;
        let current_funding: i64 = row.get("current_funding")?;
        let status: String = row.get("status")?;
        let status = ProposalStatus::parse(&status).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                format!("unknown proposal status: {}", status).into(),
            )
        })?;
        Ok(Self {
            id: id as u64,
            researcher: row.get("researcher")?,
            title: row.get("title")?,
            description: row.get("description")?,
            funding_goal: funding_goal as u64,
            current_funding: current_funding as u64,
            status,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Input for submitting a proposal
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitProposalInput {
    pub title: String,
    pub description: String,
    pub funding_goal: u64,
}

/// Query parameters for listing proposals
#[derive(Debug, Clone, Deserialize)]
pub struct ProposalQuery {
    #[serde(default)]
    pub researcher: Option<String>,
    #[serde(default)]
    pub status: Option<ProposalStatus>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

impl Default for ProposalQuery {
    fn default() -> Self {
        Self {
            researcher: None,
            status: None,
            limit: default_limit(),
            offset: 0,
        }
    }
}

fn default_limit() -> u32 {
    100
}

/// Submit a proposal, allocating its id
///
/// Starts active with zero funding.
pub fn create_proposal(
    conn: &Connection,
    researcher: &str,
    input: &SubmitProposalInput,
) -> Result<u64, LedgerError> {
    let id = super::next_id(conn, super::collections::PROPOSALS)?;
    let funding_goal = super::accounts::to_db_amount(input.funding_goal, "funding_goal")?;

    conn.execute(
        "INSERT INTO proposals (id, researcher, title, description, funding_goal)
         VALUES (?, ?, ?, ?, ?)",
        params![
            id as i64,
            researcher,
            input.title,
            input.description,
            funding_goal,
        ],
    ).map_err(|e| LedgerError::Internal(format!("Proposal insert failed: {}", e)))?;

    Ok(id)
}

/// Get a proposal by id
pub fn get_proposal(conn: &Connection, id: u64) -> Result<Option<ProposalRow>, LedgerError> {
    conn.query_row(
        "SELECT * FROM proposals WHERE id = ?",
        params![id as i64],
        |row| ProposalRow::from_row(row),
    )
    .optional()
    .map_err(|e| LedgerError::Internal(format!("Failed to get proposal: {}", e)))
}

/// Total proposals ever submitted
pub fn count_proposals(conn: &Connection) -> Result<u64, LedgerError> {
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM proposals", [], |row| row.get(0))
        .map_err(|e| LedgerError::Internal(format!("Query failed: {}", e)))?;

    Ok(count as u64)
}

/// Add to the running funding total
pub fn add_funding(conn: &Connection, id: u64, amount: u64) -> Result<bool, LedgerError> {
    let amount = super::accounts::to_db_amount(amount, "amount")?;

    let changes = conn
        .execute(
            "UPDATE proposals SET current_funding = current_funding + ?, updated_at = datetime('now')
             WHERE id = ?",
            params![amount, id as i64],
        )
        .map_err(|e| LedgerError::Internal(format!("Proposal update failed: {}", e)))?;

    Ok(changes > 0)
}

/// Change the lifecycle status
pub fn set_proposal_status(
    conn: &Connection,
    id: u64,
    status: ProposalStatus,
) -> Result<bool, LedgerError> {
    let changes = conn
        .execute(
            "UPDATE proposals SET status = ?, updated_at = datetime('now') WHERE id = ?",
            params![status.as_str(), id as i64],
        )
        .map_err(|e| LedgerError::Internal(format!("Proposal update failed: {}", e)))?;

    Ok(changes > 0)
}

/// List proposals with optional filters, newest first
pub fn list_proposals(conn: &Connection, query: &ProposalQuery) -> Result<Vec<ProposalRow>, LedgerError> {
    let mut sql = String::from("SELECT * FROM proposals");
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![];
    let mut conditions = vec![];

    if let Some(ref researcher) = query.researcher {
        conditions.push("researcher = ?".to_string());
        params.push(Box::new(researcher.clone()));
    }

    if let Some(status) = query.status {
        conditions.push("status = ?".to_string());
        params.push(Box::new(status.as_str().to_string()));
    }

    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }

    sql.push_str(" ORDER BY id DESC LIMIT ? OFFSET ?");
    params.push(Box::new(query.limit as i64));
    params.push(Box::new(query.offset as i64));

    debug!("Executing query: {}", sql);

    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| LedgerError::Internal(format!("Prepare failed: {}", e)))?;

    let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

    let rows = stmt
        .query_map(param_refs.as_slice(), |row| ProposalRow::from_row(row))
        .map_err(|e| LedgerError::Internal(format!("Query failed: {}", e)))?;

    let mut results = vec![];
    for row_result in rows {
        results.push(row_result.map_err(|e| LedgerError::Internal(format!("Row parse failed: {}", e)))?);
    }

    Ok(results)
}
