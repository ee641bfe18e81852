//! Service layer for nanoledger
//!
//! Services encapsulate business logic between boundary callers and
//! repositories. Each service wraps database operations with:
//! - Authorization (every mutation passes through the policy gate)
//! - Input validation
//! - Transaction boundaries (cross-registry settlement included)
//! - Event emission for audit/notifications
//!
//! ## Architecture
//!
//! ```text
//! Boundary callers (wallets, UIs, transports)
//!     ↓  caller identity + CallResult envelope
//! Service Layer (business logic)
//!     ↓
//! Repository Layer (db/*.rs)
//!     ↓
//! SQLite Database
//! ```

pub mod response;
pub mod events;
pub mod token_service;
pub mod market_service;
pub mod design_service;
pub mod proposal_service;

// Re-exports
pub use response::{error_code, CallResult};
pub use events::{EventBus, EventListener, LedgerEvent};
pub use token_service::TokenService;
pub use market_service::MarketService;
pub use design_service::DesignService;
pub use proposal_service::ProposalService;

use std::sync::Arc;

use crate::config::Config;
use crate::db::{LedgerDb, LedgerStats};
use crate::error::LedgerError;

/// Service container for dependency injection
///
/// Holds all registry services over one shared database and event
/// bus. The administrator identity is fixed here at construction and
/// cannot be reassigned afterwards.
pub struct Platform {
    pub tokens: Arc<TokenService>,
    pub market: Arc<MarketService>,
    pub designs: Arc<DesignService>,
    pub proposals: Arc<ProposalService>,
    pub events: Arc<EventBus>,
    db: Arc<LedgerDb>,
    administrator: String,
}

impl Platform {
    /// Create all services with a shared database
    pub fn new(db: Arc<LedgerDb>, config: &Config) -> Self {
        let events = Arc::new(EventBus::with_capacity(config.event_capacity));
        let administrator = config.administrator.clone();

        Self {
            tokens: Arc::new(TokenService::new(
                db.clone(),
                events.clone(),
                administrator.clone(),
            )),
            market: Arc::new(MarketService::new(
                db.clone(),
                events.clone(),
                administrator.clone(),
            )),
            designs: Arc::new(DesignService::new(
                db.clone(),
                events.clone(),
                administrator.clone(),
            )),
            proposals: Arc::new(ProposalService::new(
                db.clone(),
                events.clone(),
                administrator.clone(),
                config.allow_overfunding,
            )),
            events,
            db,
            administrator,
        }
    }

    /// Open the configured database and build the platform over it
    pub fn open(config: &Config) -> Result<Self, LedgerError> {
        let db = Arc::new(LedgerDb::open(&config.storage_dir)?);
        Ok(Self::new(db, config))
    }

    /// Build the platform over an in-memory database (for testing)
    pub fn open_in_memory(config: &Config) -> Result<Self, LedgerError> {
        let db = Arc::new(LedgerDb::open_in_memory()?);
        Ok(Self::new(db, config))
    }

    /// The identity allowed to mint tokens and grant rewards
    pub fn administrator(&self) -> &str {
        &self.administrator
    }

    /// Record counts across all registries
    pub fn stats(&self) -> Result<LedgerStats, LedgerError> {
        self.db.stats()
    }
}

// =============================================================================
// Shared validation
// =============================================================================

pub(crate) fn validate_identity(value: &str, field: &str) -> Result<(), LedgerError> {
    if value.is_empty() {
        return Err(LedgerError::InvalidInput(format!("{} is required", field)));
    }

    if value.len() > 255 {
        return Err(LedgerError::InvalidInput(format!("{} must be <= 255 characters", field)));
    }

    Ok(())
}

pub(crate) fn validate_text(value: &str, field: &str, max_len: usize) -> Result<(), LedgerError> {
    if value.is_empty() {
        return Err(LedgerError::InvalidInput(format!("{} is required", field)));
    }

    if value.len() > max_len {
        return Err(LedgerError::InvalidInput(format!("{} must be <= {} characters", field, max_len)));
    }

    Ok(())
}

pub(crate) fn validate_amount(amount: u64, field: &str) -> Result<(), LedgerError> {
    if amount == 0 {
        return Err(LedgerError::InvalidInput(format!("{} must be greater than zero", field)));
    }

    if amount > i64::MAX as u64 {
        return Err(LedgerError::InvalidInput(format!("{} is out of range", field)));
    }

    Ok(())
}
