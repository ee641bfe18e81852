//! Token service - business logic for the incentive token ledger
//!
//! Wraps the account repository with authorization, validation, the
//! movement log, and event emission. Minting and peer-review rewards
//! are administrator-gated; transfers require the caller to be the
//! debited account.

use std::sync::Arc;

use crate::auth::{self, OpKind, Subject};
use crate::db::{accounts, transfers, AccountRow, LedgerDb, TransferRow};
use crate::db::transfers::transfer_kinds;
use crate::error::LedgerError;

use super::events::{EventBus, LedgerEvent};
use super::{validate_amount, validate_identity};

/// Token service for balance and reputation operations
pub struct TokenService {
    db: Arc<LedgerDb>,
    events: Arc<EventBus>,
    administrator: String,
}

impl TokenService {
    /// Create a new token service
    pub fn new(db: Arc<LedgerDb>, events: Arc<EventBus>, administrator: String) -> Self {
        Self { db, events, administrator }
    }

    // =========================================================================
    // Read Operations
    // =========================================================================

    /// Token balance for an identity (0 if never seen)
    pub fn get_balance(&self, account: &str) -> Result<u64, LedgerError> {
        self.db.with_conn(|conn| accounts::get_balance(conn, account))
    }

    /// Reputation score for an identity (0 if never seen)
    pub fn get_reputation(&self, account: &str) -> Result<u64, LedgerError> {
        self.db.with_conn(|conn| accounts::get_reputation(conn, account))
    }

    /// Full account row, if the identity has been seen
    pub fn get_account(&self, account: &str) -> Result<Option<AccountRow>, LedgerError> {
        self.db.with_conn(|conn| accounts::get_account(conn, account))
    }

    /// Movements touching an account, newest first
    pub fn transfers_for_account(&self, account: &str, limit: u32) -> Result<Vec<TransferRow>, LedgerError> {
        self.db.with_conn(|conn| transfers::transfers_for_account(conn, account, limit))
    }

    // =========================================================================
    // Write Operations
    // =========================================================================

    /// Mint new tokens into an account (administrator only)
    ///
    /// Returns the recipient's balance after the mint.
    pub fn mint_tokens(&self, caller: &str, amount: u64, recipient: &str) -> Result<u64, LedgerError> {
        auth::authorize(&self.administrator, OpKind::MintTokens, caller, Subject::default())?;
        validate_identity(recipient, "recipient")?;
        validate_amount(amount, "amount")?;

        let balance = self.db.with_conn_mut(|conn| {
            let tx = conn.transaction()
                .map_err(|e| LedgerError::Internal(format!("Transaction failed: {}", e)))?;

            accounts::credit(&tx, recipient, amount)?;
            transfers::record_transfer(&tx, transfer_kinds::MINT, None, recipient, amount, None)?;
            let balance = accounts::get_balance(&tx, recipient)?;

            tx.commit()
                .map_err(|e| LedgerError::Internal(format!("Commit failed: {}", e)))?;

            Ok(balance)
        })?;

        self.events.emit(LedgerEvent::TokensMinted {
            recipient: recipient.to_string(),
            amount,
        });

        Ok(balance)
    }

    /// Move tokens between accounts
    ///
    /// The caller must be the debited `sender`. Fails without touching
    /// either balance when the sender cannot cover the amount.
    pub fn transfer_tokens(
        &self,
        caller: &str,
        amount: u64,
        sender: &str,
        recipient: &str,
    ) -> Result<(), LedgerError> {
        auth::authorize(&self.administrator, OpKind::TransferTokens, caller, Subject {
            holder: Some(sender),
            ..Default::default()
        })?;
        validate_identity(sender, "sender")?;
        validate_identity(recipient, "recipient")?;
        validate_amount(amount, "amount")?;

        self.db.with_conn_mut(|conn| {
            let tx = conn.transaction()
                .map_err(|e| LedgerError::Internal(format!("Transaction failed: {}", e)))?;

            accounts::debit(&tx, sender, amount)?;
            accounts::credit(&tx, recipient, amount)?;
            transfers::record_transfer(&tx, transfer_kinds::TRANSFER, Some(sender), recipient, amount, None)?;

            tx.commit()
                .map_err(|e| LedgerError::Internal(format!("Commit failed: {}", e)))
        })?;

        self.events.emit(LedgerEvent::TokensTransferred {
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            amount,
        });

        Ok(())
    }

    /// Reward a peer reviewer (administrator only)
    ///
    /// Credits the reviewer's balance with `amount` and adds exactly
    /// one reputation point per reward, however large the amount.
    pub fn reward_peer_review(
        &self,
        caller: &str,
        reviewer: &str,
        amount: u64,
    ) -> Result<AccountRow, LedgerError> {
        auth::authorize(&self.administrator, OpKind::RewardPeerReview, caller, Subject::default())?;
        validate_identity(reviewer, "reviewer")?;
        validate_amount(amount, "amount")?;

        let account = self.db.with_conn_mut(|conn| {
            let tx = conn.transaction()
                .map_err(|e| LedgerError::Internal(format!("Transaction failed: {}", e)))?;

            accounts::credit(&tx, reviewer, amount)?;
            accounts::add_reputation(&tx, reviewer, 1)?;
            transfers::record_transfer(&tx, transfer_kinds::REWARD, None, reviewer, amount, None)?;

            let account = accounts::get_account(&tx, reviewer)?
                .ok_or_else(|| LedgerError::Internal("Account missing after reward".to_string()))?;

            tx.commit()
                .map_err(|e| LedgerError::Internal(format!("Commit failed: {}", e)))?;

            Ok(account)
        })?;

        self.events.emit(LedgerEvent::PeerReviewRewarded {
            reviewer: reviewer.to_string(),
            amount,
            reputation: account.reputation,
        });

        Ok(account)
    }
}
