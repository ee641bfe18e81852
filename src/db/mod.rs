//! SQLite database module for the registry ledgers
//!
//! All four registries share one database so that cross-registry
//! mutations (a purchase paying its seller, a funding paying its
//! researcher) commit or roll back as a single unit.
//!
//! ## Tables
//!
//! - `accounts` - Token balances and reputation per identity
//! - `transfers` - Append-only token movement log
//! - `counters` - Per-collection id allocation
//! - `listings` - Marketplace listings
//! - `designs` - Nanotech design registry
//! - `proposals` - Research proposal registry

pub mod schema;
pub mod accounts;
pub mod transfers;
pub mod listings;
pub mod designs;
pub mod proposals;

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection};
use tracing::{debug, info};

use crate::error::LedgerError;

/// Collection names used for id allocation
pub mod collections {
    pub const LISTINGS: &str = "listings";
    pub const DESIGNS: &str = "designs";
    pub const PROPOSALS: &str = "proposals";
}

/// SQLite database holding every registry
///
/// The mutex makes each top-level operation exclusive over the store;
/// there is no partially-applied state visible to a second caller.
pub struct LedgerDb {
    conn: Mutex<Connection>,
}

impl LedgerDb {
    /// Open or create the ledger database
    pub fn open(storage_dir: &Path) -> Result<Self, LedgerError> {
        std::fs::create_dir_all(storage_dir)?;

        let db_path = storage_dir.join("ledger.db");
        info!("Opening SQLite database at {:?}", db_path);

        let conn = Connection::open(&db_path)
            .map_err(|e| LedgerError::Internal(format!("Failed to open SQLite: {}", e)))?;

        // Enable WAL mode for better concurrent read performance
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| LedgerError::Internal(format!("Failed to set PRAGMA: {}", e)))?;

        let db = Self {
            conn: Mutex::new(conn),
        };

        // Initialize schema
        db.init_schema()?;

        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, LedgerError> {
        debug!("Opening in-memory SQLite database");

        let conn = Connection::open_in_memory()
            .map_err(|e| LedgerError::Internal(format!("Failed to open in-memory SQLite: {}", e)))?;

        let db = Self {
            conn: Mutex::new(conn),
        };

        db.init_schema()?;

        Ok(db)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<(), LedgerError> {
        let conn = self.conn.lock()
            .map_err(|e| LedgerError::Internal(format!("Lock poisoned: {}", e)))?;

        schema::init_schema(&conn)?;

        Ok(())
    }

    /// Get a reference to the connection (for reads)
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&Connection) -> Result<T, LedgerError>,
    {
        let conn = self.conn.lock()
            .map_err(|e| LedgerError::Internal(format!("Lock poisoned: {}", e)))?;
        f(&conn)
    }

    /// Execute a write operation with exclusive access
    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&mut Connection) -> Result<T, LedgerError>,
    {
        let mut conn = self.conn.lock()
            .map_err(|e| LedgerError::Internal(format!("Lock poisoned: {}", e)))?;
        f(&mut conn)
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<LedgerStats, LedgerError> {
        self.with_conn(|conn| {
            let account_count: i64 = conn
                .query_row("SELECT COUNT(*) FROM accounts", [], |row| row.get(0))
                .map_err(|e| LedgerError::Internal(format!("Query failed: {}", e)))?;

            let listing_count: i64 = conn
                .query_row("SELECT COUNT(*) FROM listings", [], |row| row.get(0))
                .map_err(|e| LedgerError::Internal(format!("Query failed: {}", e)))?;

            let design_count: i64 = conn
                .query_row("SELECT COUNT(*) FROM designs", [], |row| row.get(0))
                .map_err(|e| LedgerError::Internal(format!("Query failed: {}", e)))?;

            let proposal_count: i64 = conn
                .query_row("SELECT COUNT(*) FROM proposals", [], |row| row.get(0))
                .map_err(|e| LedgerError::Internal(format!("Query failed: {}", e)))?;

            let transfer_count: i64 = conn
                .query_row("SELECT COUNT(*) FROM transfers", [], |row| row.get(0))
                .map_err(|e| LedgerError::Internal(format!("Query failed: {}", e)))?;

            Ok(LedgerStats {
                account_count: account_count as u64,
                listing_count: listing_count as u64,
                design_count: design_count as u64,
                proposal_count: proposal_count as u64,
                transfer_count: transfer_count as u64,
            })
        })
    }
}

/// Database statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct LedgerStats {
    pub account_count: u64,
    pub listing_count: u64,
    pub design_count: u64,
    pub proposal_count: u64,
    pub transfer_count: u64,
}

/// Allocate the next id for a collection
///
/// Pre-increment: the first id handed out is 1. Runs inside the
/// caller's transaction so an aborted mutation releases no id gap
/// into committed state.
pub fn next_id(conn: &Connection, collection: &str) -> Result<u64, LedgerError> {
    conn.execute(
        "INSERT INTO counters (collection, value) VALUES (?, 0)
         ON CONFLICT(collection) DO NOTHING",
        params![collection],
    ).map_err(|e| LedgerError::Internal(format!("Counter init failed: {}", e)))?;

    conn.execute(
        "UPDATE counters SET value = value + 1 WHERE collection = ?",
        params![collection],
    ).map_err(|e| LedgerError::Internal(format!("Counter update failed: {}", e)))?;

    let value: i64 = conn
        .query_row(
            "SELECT value FROM counters WHERE collection = ?",
            params![collection],
            |row| row.get(0),
        )
        .map_err(|e| LedgerError::Internal(format!("Counter read failed: {}", e)))?;

    Ok(value as u64)
}

// Re-exports
pub use accounts::AccountRow;
pub use transfers::{TransferRow, TransferQuery};
pub use listings::{ListingRow, CreateListingInput, ListingQuery};
pub use designs::{DesignRow, MintDesignInput, DesignQuery, PatentStatus};
pub use proposals::{ProposalRow, SubmitProposalInput, ProposalQuery, ProposalStatus};
