//! Proposal registry service - business logic for research proposals
//!
//! Funding settles against the token ledger inside the proposal's
//! own transaction, so the funder's debit, the researcher's credit
//! and the running total move together. Whether a proposal may be
//! funded past its goal is a platform policy carried by the config.

use std::sync::Arc;

use crate::auth::{self, OpKind, Subject};
use crate::db::{accounts, proposals, transfers, LedgerDb, ProposalQuery, ProposalRow, ProposalStatus, SubmitProposalInput};
use crate::db::transfers::transfer_kinds;
use crate::error::LedgerError;

use super::events::{EventBus, LedgerEvent};
use super::{validate_amount, validate_identity, validate_text};

/// Proposal registry service
pub struct ProposalService {
    db: Arc<LedgerDb>,
    events: Arc<EventBus>,
    administrator: String,
    allow_overfunding: bool,
}

impl ProposalService {
    /// Create a new proposal registry service
    pub fn new(
        db: Arc<LedgerDb>,
        events: Arc<EventBus>,
        administrator: String,
        allow_overfunding: bool,
    ) -> Self {
        Self { db, events, administrator, allow_overfunding }
    }

    // =========================================================================
    // Read Operations
    // =========================================================================

    /// Get a proposal by id
    pub fn get_proposal(&self, id: u64) -> Result<Option<ProposalRow>, LedgerError> {
        self.db.with_conn(|conn| proposals::get_proposal(conn, id))
    }

    /// Total proposals ever submitted
    pub fn get_proposal_count(&self) -> Result<u64, LedgerError> {
        self.db.with_conn(|conn| proposals::count_proposals(conn))
    }

    /// List proposals with filters
    pub fn list(&self, query: &ProposalQuery) -> Result<Vec<ProposalRow>, LedgerError> {
        self.db.with_conn(|conn| proposals::list_proposals(conn, query))
    }

    // =========================================================================
    // Write Operations
    // =========================================================================

    /// Submit a proposal with the caller as researcher
    ///
    /// Starts active with zero funding.
    pub fn submit_proposal(&self, caller: &str, input: SubmitProposalInput) -> Result<ProposalRow, LedgerError> {
        auth::authorize(&self.administrator, OpKind::SubmitProposal, caller, Subject::default())?;
        validate_identity(caller, "caller")?;
        validate_text(&input.title, "title", 500)?;
        validate_text(&input.description, "description", 4000)?;
        validate_amount(input.funding_goal, "funding_goal")?;

        let proposal = self.db.with_conn_mut(|conn| {
            let tx = conn.transaction()
                .map_err(|e| LedgerError::Internal(format!("Transaction failed: {}", e)))?;

            let id = proposals::create_proposal(&tx, caller, &input)?;
            let proposal = proposals::get_proposal(&tx, id)?
                .ok_or_else(|| LedgerError::Internal("Proposal not found after insert".to_string()))?;

            tx.commit()
                .map_err(|e| LedgerError::Internal(format!("Commit failed: {}", e)))?;

            Ok(proposal)
        })?;

        self.events.emit(LedgerEvent::ProposalSubmitted {
            id: proposal.id,
            researcher: proposal.researcher.clone(),
            funding_goal: proposal.funding_goal,
        });

        Ok(proposal)
    }

    /// Fund an active proposal, paying the researcher
    ///
    /// A funder who cannot cover the amount leaves the proposal and
    /// every balance exactly as they were. Reaching the goal does not
    /// change the status; the researcher closes the proposal
    /// explicitly.
    pub fn fund_proposal(&self, caller: &str, id: u64, amount: u64) -> Result<ProposalRow, LedgerError> {
        auth::authorize(&self.administrator, OpKind::FundProposal, caller, Subject::default())?;
        validate_identity(caller, "caller")?;
        validate_amount(amount, "amount")?;

        let proposal = self.db.with_conn_mut(|conn| {
            let tx = conn.transaction()
                .map_err(|e| LedgerError::Internal(format!("Transaction failed: {}", e)))?;

            let proposal = proposals::get_proposal(&tx, id)?
                .ok_or_else(|| LedgerError::NotFound(format!("proposal {}", id)))?;

            if proposal.status != ProposalStatus::Active {
                return Err(LedgerError::Inactive(format!("proposal {} is not accepting funding", id)));
            }

            let total = proposal.current_funding.checked_add(amount).ok_or_else(|| {
                LedgerError::InvalidInput(format!("funding total would overflow for proposal {}", id))
            })?;

            if !self.allow_overfunding && total > proposal.funding_goal {
                return Err(LedgerError::InvalidInput(format!(
                    "funding would exceed goal for proposal {}: {} of {} already raised",
                    id, proposal.current_funding, proposal.funding_goal
                )));
            }

            accounts::debit(&tx, caller, amount)?;
            accounts::credit(&tx, &proposal.researcher, amount)?;
            proposals::add_funding(&tx, id, amount)?;
            transfers::record_transfer(
                &tx,
                transfer_kinds::FUNDING,
                Some(caller),
                &proposal.researcher,
                amount,
                Some(id),
            )?;

            let updated = proposals::get_proposal(&tx, id)?
                .ok_or_else(|| LedgerError::Internal("Proposal missing after update".to_string()))?;

            tx.commit()
                .map_err(|e| LedgerError::Internal(format!("Commit failed: {}", e)))?;

            Ok(updated)
        })?;

        self.events.emit(LedgerEvent::ProposalFunded {
            id,
            funder: caller.to_string(),
            amount,
            current_funding: proposal.current_funding,
        });

        Ok(proposal)
    }

    /// Change the lifecycle status (researcher only)
    pub fn change_proposal_status(&self, caller: &str, id: u64, status: &str) -> Result<ProposalRow, LedgerError> {
        validate_identity(caller, "caller")?;

        let status = ProposalStatus::parse(status).ok_or_else(|| {
            LedgerError::InvalidInput(format!(
                "proposal status '{}' is not valid. Valid values: {:?}",
                status,
                ProposalStatus::ALL.map(|s| s.as_str())
            ))
        })?;

        let proposal = self.db.with_conn_mut(|conn| {
            let tx = conn.transaction()
                .map_err(|e| LedgerError::Internal(format!("Transaction failed: {}", e)))?;

            let proposal = proposals::get_proposal(&tx, id)?
                .ok_or_else(|| LedgerError::NotFound(format!("proposal {}", id)))?;

            auth::authorize(&self.administrator, OpKind::ChangeProposalStatus, caller, Subject {
                researcher: Some(&proposal.researcher),
                ..Default::default()
            })?;

            proposals::set_proposal_status(&tx, id, status)?;

            let updated = proposals::get_proposal(&tx, id)?
                .ok_or_else(|| LedgerError::Internal("Proposal missing after update".to_string()))?;

            tx.commit()
                .map_err(|e| LedgerError::Internal(format!("Commit failed: {}", e)))?;

            Ok(updated)
        })?;

        self.events.emit(LedgerEvent::ProposalStatusChanged {
            id,
            status: proposal.status,
        });

        Ok(proposal)
    }
}
