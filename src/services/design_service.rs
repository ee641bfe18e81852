//! Design registry service - business logic for nanotech designs
//!
//! Ownership moves with transfers; patent standing stays with the
//! original creator, so a design can change hands without its
//! inventor losing control of the patent record.

use std::sync::Arc;

use crate::auth::{self, OpKind, Subject};
use crate::db::{designs, DesignQuery, DesignRow, LedgerDb, MintDesignInput, PatentStatus};
use crate::error::LedgerError;

use super::events::{EventBus, LedgerEvent};
use super::{validate_identity, validate_text};

/// Design registry service
pub struct DesignService {
    db: Arc<LedgerDb>,
    events: Arc<EventBus>,
    administrator: String,
}

impl DesignService {
    /// Create a new design registry service
    pub fn new(db: Arc<LedgerDb>, events: Arc<EventBus>, administrator: String) -> Self {
        Self { db, events, administrator }
    }

    // =========================================================================
    // Read Operations
    // =========================================================================

    /// Get a design by id
    pub fn get_design(&self, id: u64) -> Result<Option<DesignRow>, LedgerError> {
        self.db.with_conn(|conn| designs::get_design(conn, id))
    }

    /// Total designs ever minted
    pub fn get_design_count(&self) -> Result<u64, LedgerError> {
        self.db.with_conn(|conn| designs::count_designs(conn))
    }

    /// List designs with filters
    pub fn list(&self, query: &DesignQuery) -> Result<Vec<DesignRow>, LedgerError> {
        self.db.with_conn(|conn| designs::list_designs(conn, query))
    }

    // =========================================================================
    // Write Operations
    // =========================================================================

    /// Mint a design with the caller as creator and first owner
    pub fn mint_design(&self, caller: &str, input: MintDesignInput) -> Result<DesignRow, LedgerError> {
        auth::authorize(&self.administrator, OpKind::MintDesign, caller, Subject::default())?;
        validate_identity(caller, "caller")?;
        validate_text(&input.title, "title", 500)?;
        validate_text(&input.description, "description", 4000)?;

        let design = self.db.with_conn_mut(|conn| {
            let tx = conn.transaction()
                .map_err(|e| LedgerError::Internal(format!("Transaction failed: {}", e)))?;

            let id = designs::create_design(&tx, caller, &input)?;
            let design = designs::get_design(&tx, id)?
                .ok_or_else(|| LedgerError::Internal("Design not found after insert".to_string()))?;

            tx.commit()
                .map_err(|e| LedgerError::Internal(format!("Commit failed: {}", e)))?;

            Ok(design)
        })?;

        self.events.emit(LedgerEvent::DesignMinted {
            id: design.id,
            creator: design.creator.clone(),
        });

        Ok(design)
    }

    /// Transfer a design to a new owner (current owner only)
    ///
    /// The creator field never changes; provenance survives any chain
    /// of transfers.
    pub fn transfer_design(&self, caller: &str, id: u64, recipient: &str) -> Result<DesignRow, LedgerError> {
        validate_identity(caller, "caller")?;
        validate_identity(recipient, "recipient")?;

        let design = self.db.with_conn_mut(|conn| {
            let tx = conn.transaction()
                .map_err(|e| LedgerError::Internal(format!("Transaction failed: {}", e)))?;

            let design = designs::get_design(&tx, id)?
                .ok_or_else(|| LedgerError::NotFound(format!("design {}", id)))?;

            auth::authorize(&self.administrator, OpKind::TransferDesign, caller, Subject {
                owner: Some(&design.owner),
                ..Default::default()
            })?;

            designs::set_design_owner(&tx, id, recipient)?;

            let updated = designs::get_design(&tx, id)?
                .ok_or_else(|| LedgerError::Internal("Design missing after update".to_string()))?;

            tx.commit()
                .map_err(|e| LedgerError::Internal(format!("Commit failed: {}", e)))?;

            Ok(updated)
        })?;

        self.events.emit(LedgerEvent::DesignTransferred {
            id,
            owner: design.owner.clone(),
        });

        Ok(design)
    }

    /// Update the patent status (original creator only)
    pub fn update_patent_status(&self, caller: &str, id: u64, status: &str) -> Result<DesignRow, LedgerError> {
        validate_identity(caller, "caller")?;

        let status = PatentStatus::parse(status).ok_or_else(|| {
            LedgerError::InvalidInput(format!(
                "patent status '{}' is not valid. Valid values: {:?}",
                status,
                PatentStatus::ALL.map(|s| s.as_str())
            ))
        })?;

        let design = self.db.with_conn_mut(|conn| {
            let tx = conn.transaction()
                .map_err(|e| LedgerError::Internal(format!("Transaction failed: {}", e)))?;

            let design = designs::get_design(&tx, id)?
                .ok_or_else(|| LedgerError::NotFound(format!("design {}", id)))?;

            auth::authorize(&self.administrator, OpKind::UpdatePatentStatus, caller, Subject {
                creator: Some(&design.creator),
                ..Default::default()
            })?;

            designs::set_patent_status(&tx, id, status)?;

            let updated = designs::get_design(&tx, id)?
                .ok_or_else(|| LedgerError::Internal("Design missing after update".to_string()))?;

            tx.commit()
                .map_err(|e| LedgerError::Internal(format!("Commit failed: {}", e)))?;

            Ok(updated)
        })?;

        self.events.emit(LedgerEvent::PatentStatusUpdated {
            id,
            status: design.patent_status,
        });

        Ok(design)
    }
}
