//! Nanotech design registry operations
//!
//! Designs are non-fungible: one owner at a time, with the original
//! creator recorded permanently. Ownership transfers move the design;
//! the patent status stays under the creator's control.

use std::fmt;

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::LedgerError;

/// Patent lifecycle for a design
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatentStatus {
    Pending,
    Filed,
    Granted,
    Rejected,
}

impl PatentStatus {
    pub const ALL: [PatentStatus; 4] = [
        PatentStatus::Pending,
        PatentStatus::Filed,
        PatentStatus::Granted,
        PatentStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PatentStatus::Pending => "pending",
            PatentStatus::Filed => "filed",
            PatentStatus::Granted => "granted",
            PatentStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PatentStatus::Pending),
            "filed" => Some(PatentStatus::Filed),
            "granted" => Some(PatentStatus::Granted),
            "rejected" => Some(PatentStatus::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for PatentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Design row from database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesignRow {
    pub id: u64,
    /// Original creator, never changes after mint
    pub creator: String,
    pub owner: String,
    pub title: String,
    pub description: String,
    pub patent_status: PatentStatus,
    pub created_at: String,
    pub updated_at: String,
}

impl DesignRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        let id: i64 = row.get("id")?;
        let status: String = row.get("patent_status")?;
        let patent_status = PatentStatus::parse(&status).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                format!("unknown patent status: {}", status).into(),
            )
        })?;
        Ok(Self {
            id: id as u64,
            creator: row.get("creator")?,
            owner: row.get("owner")?,
            title: row.get("title")?,
            description: row.get("description")?,
            patent_status,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Input for minting a design
#[derive(Debug, Clone, Deserialize)]
pub struct MintDesignInput {
    pub title: String,
    pub description: String,
}

/// Query parameters for listing designs
#[derive(Debug, Clone, Deserialize)]
pub struct DesignQuery {
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub creator: Option<String>,
    #[serde(default)]
    pub patent_status: Option<PatentStatus>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

impl Default for DesignQuery {
    fn default() -> Self {
        Self {
            owner: None,
            creator: None,
            patent_status: None,
            limit: default_limit(),
            offset: 0,
        }
    }
}

fn default_limit() -> u32 {
    100
}

/// Mint a design, allocating its id
///
/// The creator starts as owner with patent status `pending`.
pub fn create_design(
    conn: &Connection,
    creator: &str,
    input: &MintDesignInput,
) -> Result<u64, LedgerError> {
    let id = super::next_id(conn, super::collections::DESIGNS)?;

    conn.execute(
        "INSERT INTO designs (id, creator, owner, title, description, patent_status)
         VALUES (?, ?, ?, ?, ?, ?)",
        params![
            id as i64,
            creator,
            creator,
            input.title,
            input.description,
            PatentStatus::Pending.as_str(),
        ],
    ).map_err(|e| LedgerError::Internal(format!("Design insert failed: {}", e)))?;

    Ok(id)
}

/// Get a design by id
pub fn get_design(conn: &Connection, id: u64) -> Result<Option<DesignRow>, LedgerError> {
    conn.query_row(
        "SELECT * FROM designs WHERE id = ?",
        params![id as i64],
        |row| DesignRow::from_row(row),
    )
    .optional()
    .map_err(|e| LedgerError::Internal(format!("Failed to get design: {}", e)))
}

/// Total designs ever minted
pub fn count_designs(conn: &Connection) -> Result<u64, LedgerError> {
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM designs", [], |row| row.get(0))
        .map_err(|e| LedgerError::Internal(format!("Query failed: {}", e)))?;

    Ok(count as u64)
}

/// Change the current owner, leaving the creator untouched
pub fn set_design_owner(conn: &Connection, id: u64, owner: &str) -> Result<bool, LedgerError> {
    let changes = conn
        .execute(
            "UPDATE designs SET owner = ?, updated_at = datetime('now') WHERE id = ?",
            params![owner, id as i64],
        )
        .map_err(|e| LedgerError::Internal(format!("Design update failed: {}", e)))?;

    Ok(changes > 0)
}

/// Change the patent status
pub fn set_patent_status(
    conn: &Connection,
    id: u64,
    status: PatentStatus,
) -> Result<bool, LedgerError> {
    let changes = conn
        .execute(
            "UPDATE designs SET patent_status = ?, updated_at = datetime('now') WHERE id = ?",
            params![status.as_str(), id as i64],
        )
        .map_err(|e| LedgerError::Internal(format!("Design update failed: {}", e)))?;

    Ok(changes > 0)
}

/// List designs with optional filters, newest first
pub fn list_designs(conn: &Connection, query: &DesignQuery) -> Result<Vec<DesignRow>, LedgerError> {
    let mut sql = String::from("SELECT * FROM designs");
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![];
    let mut conditions = vec![];

    if let Some(ref owner) = query.owner {
        conditions.push("owner = ?".to_string());
        params.push(Box::new(owner.clone()));
    }

    if let Some(ref creator) = query.creator {
        conditions.push("creator = ?".to_string());
        params.push(Box::new(creator.clone()));
    }

    if let Some(status) = query.patent_status {
        conditions.push("patent_status = ?".to_string());
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
        .query_map(param_refs.as_slice(), |row| DesignRow::from_row(row))
        .map_err(|e| LedgerError::Internal(format!("Query failed: {}", e)))?;

    let mut results = vec![];
    for row_result in rows {
        results.push(row_result.map_err(|e| LedgerError::Internal(format!("Row parse failed: {}", e)))?);
    }

    Ok(results)
}
