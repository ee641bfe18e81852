//! Database schema definitions

use rusqlite::Connection;
use tracing::info;

use crate::error::LedgerError;

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<(), LedgerError> {
    // Check current schema version
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Creating new ledger schema v{}", SCHEMA_VERSION);
        create_tables(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version < SCHEMA_VERSION {
        info!("Migrating schema from v{} to v{}", current_version, SCHEMA_VERSION);
        migrate_schema(conn, current_version)?;
    } else {
        info!("Ledger schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Get current schema version (0 if not initialized)
fn get_schema_version(conn: &Connection) -> Result<i32, LedgerError> {
    // Create schema_version table if it doesn't exist
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    ).map_err(|e| LedgerError::Internal(format!("Failed to create schema_version table: {}", e)))?;

    let version: i32 = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
        .unwrap_or(0);

    Ok(version)
}

/// Set schema version
fn set_schema_version(conn: &Connection, version: i32) -> Result<(), LedgerError> {
    conn.execute("DELETE FROM schema_version", [])
        .map_err(|e| LedgerError::Internal(format!("Failed to clear schema_version: {}", e)))?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?)", [version])
        .map_err(|e| LedgerError::Internal(format!("Failed to set schema_version: {}", e)))?;
    Ok(())
}

/// Create all tables
fn create_tables(conn: &Connection) -> Result<(), LedgerError> {
    conn.execute_batch(TOKEN_SCHEMA)
        .map_err(|e| LedgerError::Internal(format!("Failed to create token tables: {}", e)))?;

    conn.execute_batch(REGISTRY_SCHEMA)
        .map_err(|e| LedgerError::Internal(format!("Failed to create registry tables: {}", e)))?;

    conn.execute_batch(INDEXES_SCHEMA)
        .map_err(|e| LedgerError::Internal(format!("Failed to create indexes: {}", e)))?;

    Ok(())
}

/// Migrate schema from older version
fn migrate_schema(conn: &Connection, from_version: i32) -> Result<(), LedgerError> {
    // Add migration steps here as schema evolves
    match from_version {
        // Example: 1 -> 2 migration would go here
        _ => {}
    }

    set_schema_version(conn, SCHEMA_VERSION)?;
    Ok(())
}

/// Token ledger schema: accounts, id counters, movement log
const TOKEN_SCHEMA: &str = r#"
-- Token accounts, created lazily on first reference
CREATE TABLE IF NOT EXISTS accounts (
    identity TEXT PRIMARY KEY NOT NULL,
    balance INTEGER NOT NULL DEFAULT 0,
    reputation INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    CHECK (balance >= 0),
    CHECK (reputation >= 0)
);

-- Per-collection id allocation (pre-increment, first id is 1)
CREATE TABLE IF NOT EXISTS counters (
    collection TEXT PRIMARY KEY NOT NULL,
    value INTEGER NOT NULL DEFAULT 0
);

-- Append-only token movement log, one row per balance mutation
CREATE TABLE IF NOT EXISTS transfers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    kind TEXT NOT NULL,
    sender TEXT,
    recipient TEXT NOT NULL,
    amount INTEGER NOT NULL,

    -- Listing or proposal id when the movement settles a purchase or funding
    context_id INTEGER,

    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

/// Registry schema: listings, designs, proposals
///
/// Records are never deleted; lifecycle end is a status flip.
const REGISTRY_SCHEMA: &str = r#"
-- Marketplace listings
CREATE TABLE IF NOT EXISTS listings (
    id INTEGER PRIMARY KEY NOT NULL,
    seller TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    price INTEGER NOT NULL,
    category TEXT NOT NULL,
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Nanotech designs (non-fungible, creator recorded for provenance)
CREATE TABLE IF NOT EXISTS designs (
    id INTEGER PRIMARY KEY NOT NULL,
    creator TEXT NOT NULL,
    owner TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    patent_status TEXT NOT NULL DEFAULT 'pending',
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Research proposals
CREATE TABLE IF NOT EXISTS proposals (
    id INTEGER PRIMARY KEY NOT NULL,
    researcher TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    funding_goal INTEGER NOT NULL,
    current_funding INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'active',
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

/// Index definitions for fast queries
const INDEXES_SCHEMA: &str = r#"
-- Transfer log indexes
CREATE INDEX IF NOT EXISTS idx_transfers_sender ON transfers(sender);
CREATE INDEX IF NOT EXISTS idx_transfers_recipient ON transfers(recipient);
CREATE INDEX IF NOT EXISTS idx_transfers_kind ON transfers(kind);

-- Listing indexes
CREATE INDEX IF NOT EXISTS idx_listings_seller ON listings(seller);
CREATE INDEX IF NOT EXISTS idx_listings_category ON listings(category);
CREATE INDEX IF NOT EXISTS idx_listings_active ON listings(active);

-- Design indexes
CREATE INDEX IF NOT EXISTS idx_designs_owner ON designs(owner);
CREATE INDEX IF NOT EXISTS idx_designs_creator ON designs(creator);
CREATE INDEX IF NOT EXISTS idx_designs_patent_status ON designs(patent_status);

-- Proposal indexes
CREATE INDEX IF NOT EXISTS idx_proposals_researcher ON proposals(researcher);
CREATE INDEX IF NOT EXISTS idx_proposals_status ON proposals(status);
"#;
