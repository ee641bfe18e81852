//! Marketplace service - business logic for listings
//!
//! A purchase settles against the token ledger inside the listing's
//! own transaction: the buyer's debit, the seller's credit, the
//! active-flag flip and the movement-log row commit together or not
//! at all.

use std::sync::Arc;

use crate::auth::{self, OpKind, Subject};
use crate::db::{accounts, listings, transfers, CreateListingInput, LedgerDb, ListingQuery, ListingRow};
use crate::db::transfers::transfer_kinds;
use crate::error::LedgerError;

use super::events::{EventBus, LedgerEvent};
use super::{validate_amount, validate_identity, validate_text};

/// Marketplace service for listing operations
pub struct MarketService {
    db: Arc<LedgerDb>,
    events: Arc<EventBus>,
    administrator: String,
}

impl MarketService {
    /// Create a new marketplace service
    pub fn new(db: Arc<LedgerDb>, events: Arc<EventBus>, administrator: String) -> Self {
        Self { db, events, administrator }
    }

    // =========================================================================
    // Read Operations
    // =========================================================================

    /// Get a listing by id
    pub fn get_listing(&self, id: u64) -> Result<Option<ListingRow>, LedgerError> {
        self.db.with_conn(|conn| listings::get_listing(conn, id))
    }

    /// Total listings ever created (sold and cancelled included)
    pub fn get_listing_count(&self) -> Result<u64, LedgerError> {
        self.db.with_conn(|conn| listings::count_listings(conn))
    }

    /// List listings with filters
    pub fn list(&self, query: &ListingQuery) -> Result<Vec<ListingRow>, LedgerError> {
        self.db.with_conn(|conn| listings::list_listings(conn, query))
    }

    // =========================================================================
    // Write Operations
    // =========================================================================

    /// Create a listing with the caller as seller
    pub fn create_listing(&self, caller: &str, input: CreateListingInput) -> Result<ListingRow, LedgerError> {
        auth::authorize(&self.administrator, OpKind::CreateListing, caller, Subject::default())?;
        self.validate_listing(caller, &input)?;

        let listing = self.db.with_conn_mut(|conn| {
            let tx = conn.transaction()
                .map_err(|e| LedgerError::Internal(format!("Transaction failed: {}", e)))?;

            let id = listings::create_listing(&tx, caller, &input)?;
            let listing = listings::get_listing(&tx, id)?
                .ok_or_else(|| LedgerError::Internal("Listing not found after insert".to_string()))?;

            tx.commit()
                .map_err(|e| LedgerError::Internal(format!("Commit failed: {}", e)))?;

            Ok(listing)
        })?;

        self.events.emit(LedgerEvent::ListingCreated {
            id: listing.id,
            seller: listing.seller.clone(),
            price: listing.price,
        });

        Ok(listing)
    }

    /// Purchase an active listing, paying the seller
    ///
    /// The listing goes inactive in the same transaction that moves
    /// the tokens; a buyer who cannot cover the price leaves the
    /// listing exactly as it was.
    pub fn purchase_listing(&self, caller: &str, id: u64) -> Result<ListingRow, LedgerError> {
        auth::authorize(&self.administrator, OpKind::PurchaseListing, caller, Subject::default())?;
        validate_identity(caller, "caller")?;

        let listing = self.db.with_conn_mut(|conn| {
            let tx = conn.transaction()
                .map_err(|e| LedgerError::Internal(format!("Transaction failed: {}", e)))?;

            let listing = listings::get_listing(&tx, id)?
                .ok_or_else(|| LedgerError::NotFound(format!("listing {}", id)))?;

            if !listing.active {
                return Err(LedgerError::Inactive(format!("listing {} is no longer active", id)));
            }

            accounts::debit(&tx, caller, listing.price)?;
            accounts::credit(&tx, &listing.seller, listing.price)?;
            listings::set_listing_active(&tx, id, false)?;
            transfers::record_transfer(
                &tx,
                transfer_kinds::PURCHASE,
                Some(caller),
                &listing.seller,
                listing.price,
                Some(id),
            )?;

            let updated = listings::get_listing(&tx, id)?
                .ok_or_else(|| LedgerError::Internal("Listing missing after update".to_string()))?;

            tx.commit()
                .map_err(|e| LedgerError::Internal(format!("Commit failed: {}", e)))?;

            Ok(updated)
        })?;

        self.events.emit(LedgerEvent::ListingPurchased {
            id,
            buyer: caller.to_string(),
            seller: listing.seller.clone(),
            price: listing.price,
        });

        Ok(listing)
    }

    /// Cancel an active listing (seller only)
    pub fn cancel_listing(&self, caller: &str, id: u64) -> Result<ListingRow, LedgerError> {
        validate_identity(caller, "caller")?;

        let listing = self.db.with_conn_mut(|conn| {
            let tx = conn.transaction()
                .map_err(|e| LedgerError::Internal(format!("Transaction failed: {}", e)))?;

            let listing = listings::get_listing(&tx, id)?
                .ok_or_else(|| LedgerError::NotFound(format!("listing {}", id)))?;

            auth::authorize(&self.administrator, OpKind::CancelListing, caller, Subject {
                seller: Some(&listing.seller),
                ..Default::default()
            })?;

            if !listing.active {
                return Err(LedgerError::Inactive(format!("listing {} is no longer active", id)));
            }

            listings::set_listing_active(&tx, id, false)?;

            let updated = listings::get_listing(&tx, id)?
                .ok_or_else(|| LedgerError::Internal("Listing missing after update".to_string()))?;

            tx.commit()
                .map_err(|e| LedgerError::Internal(format!("Commit failed: {}", e)))?;

            Ok(updated)
        })?;

        self.events.emit(LedgerEvent::ListingCancelled {
            id,
            seller: listing.seller.clone(),
        });

        Ok(listing)
    }

    // =========================================================================
    // Validation
    // =========================================================================

    fn validate_listing(&self, caller: &str, input: &CreateListingInput) -> Result<(), LedgerError> {
        validate_identity(caller, "caller")?;
        validate_text(&input.title, "title", 500)?;
        validate_text(&input.description, "description", 4000)?;
        validate_text(&input.category, "category", 100)?;
        validate_amount(input.price, "price")?;
        Ok(())
    }
}
