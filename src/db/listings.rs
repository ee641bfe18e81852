//! Marketplace listing operations

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::LedgerError;

/// Listing row from database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingRow {
    pub id: u64,
    pub seller: String,
    pub title: String,
    pub description: String,
    pub price: u64,
    pub category: String,
    /// False once sold or cancelled; never flips back
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl ListingRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        let id: i64 = row.get("id")?;
        let price: i64 = row.get("price")?;
        Ok(Self {
            id: id as u64,
            seller: row.get("seller")?,
            title: row.get("title")?,
            description: row.get("description")?,
            price: price as u64,
            category: row.get("category")?,
            active: row.get("active")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Input for creating a listing
#[derive(Debug, Clone, Deserialize)]
pub struct CreateListingInput {
    pub title: String,
    pub description: String,
    pub price: u64,
    pub category: String,
}

/// Query parameters for listing listings
#[derive(Debug, Clone, Deserialize)]
pub struct ListingQuery {
    #[serde(default)]
    pub seller: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub active_only: bool,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

impl Default for ListingQuery {
    fn default() -> Self {
        Self {
            seller: None,
            category: None,
            active_only: false,
            limit: default_limit(),
            offset: 0,
        }
    }
}

fn default_limit() -> u32 {
    100
}

/// Create a listing, allocating its id
pub fn create_listing(
    conn: &Connection,
    seller: &str,
    input: &CreateListingInput,
) -> Result<u64, LedgerError> {
    let id = super::next_id(conn, super::collections::LISTINGS)?;
    let price = super::accounts::to_db_amount(input.price, "price")?;

    conn.execute(
        "INSERT INTO listings (id, seller, title, description, price, category)
         VALUES (?, ?, ?, ?, ?, ?)",
        params![
            id as i64,
            seller,
            input.title,
            input.description,
            price,
            input.category,
        ],
    ).map_err(|e| LedgerError::Internal(format!("Listing insert failed: {}", e)))?;

    Ok(id)
}

/// Get a listing by id
pub fn get_listing(conn: &Connection, id: u64) -> Result<Option<ListingRow>, LedgerError> {
    conn.query_row(
        "SELECT * FROM listings WHERE id = ?",
        params![id as i64],
        |row| ListingRow::from_row(row),
    )
    .optional()
    .map_err(|e| LedgerError::Internal(format!("Failed to get listing: {}", e)))
}

/// Total listings ever created (sold and cancelled included)
pub fn count_listings(conn: &Connection) -> Result<u64, LedgerError> {
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM listings", [], |row| row.get(0))
        .map_err(|e| LedgerError::Internal(format!("Query failed: {}", e)))?;

    Ok(count as u64)
}

/// Flip the active flag
pub fn set_listing_active(conn: &Connection, id: u64, active: bool) -> Result<bool, LedgerError> {
    let changes = conn
        .execute(
            "UPDATE listings SET active = ?, updated_at = datetime('now') WHERE id = ?",
            params![active, id as i64],
        )
        .map_err(|e| LedgerError::Internal(format!("Listing update failed: {}", e)))?;

    Ok(changes > 0)
}

/// List listings with optional filters, newest first
pub fn list_listings(conn: &Connection, query: &ListingQuery) -> Result<Vec<ListingRow>, LedgerError> {
    let mut sql = String::from("SELECT * FROM listings");
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![];
    let mut conditions = vec![];

    if let Some(ref seller) = query.seller {
        conditions.push("seller = ?".to_string());
        params.push(Box::new(seller.clone()));
    }

    if let Some(ref category) = query.category {
        conditions.push("category = ?".to_string());
        params.push(Box::new(category.clone()));
    }

    if query.active_only {
        conditions.push("active = 1".to_string());
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
        .query_map(param_refs.as_slice(), |row| ListingRow::from_row(row))
        .map_err(|e| LedgerError::Internal(format!("Query failed: {}", e)))?;

    let mut results = vec![];
    for row_result in rows {
        results.push(row_result.map_err(|e| LedgerError::Internal(format!("Row parse failed: {}", e)))?);
    }

    Ok(results)
}
