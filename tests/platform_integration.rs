//! Integration tests for the registry platform
//!
//! Exercises the four registries end to end over an in-memory
//! database: token flows, marketplace settlement, design provenance,
//! proposal funding, and the uniform result envelope.

use nanoledger::db::{
    CreateListingInput, ListingQuery, MintDesignInput, PatentStatus, ProposalStatus,
    SubmitProposalInput,
};
use nanoledger::services::CallResult;
use nanoledger::{Config, LedgerError, Platform};
use tempfile::TempDir;

const ADMIN: &str = "admin";
const ALICE: &str = "alice";
const BOB: &str = "bob";
const CAROL: &str = "carol";

/// Helper to build a platform over an in-memory database
fn test_platform() -> Platform {
    let config = Config {
        administrator: ADMIN.to_string(),
        ..Default::default()
    };
    Platform::open_in_memory(&config).unwrap()
}

fn listing_input(title: &str, price: u64) -> CreateListingInput {
    CreateListingInput {
        title: title.to_string(),
        description: "High purity SWCNT batch".to_string(),
        price,
        category: "materials".to_string(),
    }
}

fn design_input(title: &str) -> MintDesignInput {
    MintDesignInput {
        title: title.to_string(),
        description: "Self-assembling lattice structure".to_string(),
    }
}

fn proposal_input(title: &str, goal: u64) -> SubmitProposalInput {
    SubmitProposalInput {
        title: title.to_string(),
        description: "Targeted drug delivery via engineered carriers".to_string(),
        funding_goal: goal,
    }
}

// =============================================================================
// Token ledger
// =============================================================================

/// Minting is administrator-gated and credits the recipient
#[test]
fn test_mint_tokens() {
    let platform = test_platform();

    let balance = platform.tokens.mint_tokens(ADMIN, 1000, ALICE).unwrap();
    assert_eq!(balance, 1000);
    assert_eq!(platform.tokens.get_balance(ALICE).unwrap(), 1000);

    // Non-admin mint is forbidden and changes nothing
    let err = platform.tokens.mint_tokens(ALICE, 500, ALICE).unwrap_err();
    assert!(matches!(err, LedgerError::Forbidden(_)));
    assert_eq!(platform.tokens.get_balance(ALICE).unwrap(), 1000);
}

/// Zero-amount mints are rejected before any write
#[test]
fn test_mint_zero_rejected() {
    let platform = test_platform();

    let err = platform.tokens.mint_tokens(ADMIN, 0, ALICE).unwrap_err();
    assert!(matches!(err, LedgerError::InvalidInput(_)));
    assert!(platform.tokens.get_account(ALICE).unwrap().is_none());
}

/// Transfers move tokens when the caller is the debited account
#[test]
fn test_transfer_tokens() {
    let platform = test_platform();
    platform.tokens.mint_tokens(ADMIN, 1000, ALICE).unwrap();

    platform.tokens.transfer_tokens(ALICE, 400, ALICE, BOB).unwrap();
    assert_eq!(platform.tokens.get_balance(ALICE).unwrap(), 600);
    assert_eq!(platform.tokens.get_balance(BOB).unwrap(), 400);
}

/// A caller cannot transfer out of someone else's account
#[test]
fn test_transfer_requires_holder() {
    let platform = test_platform();
    platform.tokens.mint_tokens(ADMIN, 1000, ALICE).unwrap();

    let err = platform.tokens.transfer_tokens(BOB, 400, ALICE, BOB).unwrap_err();
    assert!(matches!(err, LedgerError::Forbidden(_)));
    assert_eq!(platform.tokens.get_balance(ALICE).unwrap(), 1000);
    assert_eq!(platform.tokens.get_balance(BOB).unwrap(), 0);
}

/// An overdrawn transfer leaves both balances untouched
#[test]
fn test_transfer_insufficient_balance() {
    let platform = test_platform();
    platform.tokens.mint_tokens(ADMIN, 100, ALICE).unwrap();

    let err = platform.tokens.transfer_tokens(ALICE, 500, ALICE, BOB).unwrap_err();
    match err {
        LedgerError::InsufficientBalance { required, available } => {
            assert_eq!(required, 500);
            assert_eq!(available, 100);
        }
        other => panic!("unexpected error: {:?}", other),
    }

    assert_eq!(platform.tokens.get_balance(ALICE).unwrap(), 100);
    assert_eq!(platform.tokens.get_balance(BOB).unwrap(), 0);
}

/// Two rewards of 100 leave balance 200 and reputation 2
#[test]
fn test_reward_peer_review_accumulates() {
    let platform = test_platform();

    platform.tokens.reward_peer_review(ADMIN, ALICE, 100).unwrap();
    let account = platform.tokens.reward_peer_review(ADMIN, ALICE, 100).unwrap();

    assert_eq!(account.balance, 200);
    assert_eq!(account.reputation, 2);
    assert_eq!(platform.tokens.get_reputation(ALICE).unwrap(), 2);
}

/// Reputation grows by one per reward regardless of the amount
#[test]
fn test_reward_reputation_is_per_event() {
    let platform = test_platform();

    platform.tokens.reward_peer_review(ADMIN, ALICE, 5000).unwrap();
    assert_eq!(platform.tokens.get_reputation(ALICE).unwrap(), 1);

    let err = platform.tokens.reward_peer_review(BOB, ALICE, 100).unwrap_err();
    assert!(matches!(err, LedgerError::Forbidden(_)));
    assert_eq!(platform.tokens.get_reputation(ALICE).unwrap(), 1);
    assert_eq!(platform.tokens.get_balance(ALICE).unwrap(), 5000);
}

/// Unknown identities read as zero without creating accounts
#[test]
fn test_unknown_identity_reads_zero() {
    let platform = test_platform();

    assert_eq!(platform.tokens.get_balance("nobody").unwrap(), 0);
    assert_eq!(platform.tokens.get_reputation("nobody").unwrap(), 0);
    assert!(platform.tokens.get_account("nobody").unwrap().is_none());
}

// =============================================================================
// Marketplace
// =============================================================================

/// Full purchase flow: list, pay, deactivate
#[test]
fn test_purchase_flow() {
    let platform = test_platform();
    platform.tokens.mint_tokens(ADMIN, 1000, ALICE).unwrap();
    platform.tokens.mint_tokens(ADMIN, 1000, BOB).unwrap();

    let listing = platform.market.create_listing(ALICE, listing_input("Nanotube batch", 1000)).unwrap();
    assert_eq!(listing.id, 1);
    assert!(listing.active);

    let sold = platform.market.purchase_listing(BOB, listing.id).unwrap();
    assert!(!sold.active);

    // Price moved from buyer to seller
    assert_eq!(platform.tokens.get_balance(ALICE).unwrap(), 2000);
    assert_eq!(platform.tokens.get_balance(BOB).unwrap(), 0);

    // A sold listing cannot be bought again
    platform.tokens.mint_tokens(ADMIN, 1000, CAROL).unwrap();
    let err = platform.market.purchase_listing(CAROL, listing.id).unwrap_err();
    assert!(matches!(err, LedgerError::Inactive(_)));
    assert_eq!(platform.tokens.get_balance(CAROL).unwrap(), 1000);
}

/// Purchasing a listing that never existed is NotFound
#[test]
fn test_purchase_missing_listing() {
    let platform = test_platform();
    platform.tokens.mint_tokens(ADMIN, 1000, BOB).unwrap();

    let err = platform.market.purchase_listing(BOB, 42).unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)));
    assert_eq!(platform.tokens.get_balance(BOB).unwrap(), 1000);
}

/// Only the seller may cancel, and only while active
#[test]
fn test_cancel_listing() {
    let platform = test_platform();

    let listing = platform.market.create_listing(ALICE, listing_input("Gold nanoparticles", 50)).unwrap();

    let err = platform.market.cancel_listing(BOB, listing.id).unwrap_err();
    assert!(matches!(err, LedgerError::Forbidden(_)));

    let cancelled = platform.market.cancel_listing(ALICE, listing.id).unwrap();
    assert!(!cancelled.active);

    // Cancelling twice reports the inactive state
    let err = platform.market.cancel_listing(ALICE, listing.id).unwrap_err();
    assert!(matches!(err, LedgerError::Inactive(_)));
}

/// Listing validation rejects empty titles and zero prices
#[test]
fn test_create_listing_validation() {
    let platform = test_platform();

    let err = platform.market.create_listing(ALICE, listing_input("", 50)).unwrap_err();
    assert!(matches!(err, LedgerError::InvalidInput(_)));

    let err = platform.market.create_listing(ALICE, listing_input("Free stuff", 0)).unwrap_err();
    assert!(matches!(err, LedgerError::InvalidInput(_)));

    assert_eq!(platform.market.get_listing_count().unwrap(), 0);
}

/// Ids are sequential and the count includes settled listings
#[test]
fn test_listing_ids_and_count() {
    let platform = test_platform();
    platform.tokens.mint_tokens(ADMIN, 1000, BOB).unwrap();

    for i in 0..5 {
        let listing = platform.market.create_listing(ALICE, listing_input("Batch", 100 + i)).unwrap();
        assert_eq!(listing.id, i + 1);
    }

    platform.market.purchase_listing(BOB, 2).unwrap();
    platform.market.cancel_listing(ALICE, 3).unwrap();

    assert_eq!(platform.market.get_listing_count().unwrap(), 5);

    let active = platform.market.list(&ListingQuery {
        active_only: true,
        ..Default::default()
    }).unwrap();
    assert_eq!(active.len(), 3);
}

// =============================================================================
// Design registry
// =============================================================================

/// Transfers move ownership but never provenance
#[test]
fn test_design_transfer_preserves_creator() {
    let platform = test_platform();

    let design = platform.designs.mint_design(ALICE, design_input("Molecular assembler")).unwrap();
    assert_eq!(design.id, 1);
    assert_eq!(design.creator, ALICE);
    assert_eq!(design.owner, ALICE);
    assert_eq!(design.patent_status, PatentStatus::Pending);

    let transferred = platform.designs.transfer_design(ALICE, design.id, BOB).unwrap();
    assert_eq!(transferred.owner, BOB);
    assert_eq!(transferred.creator, ALICE);

    // Previous owner lost transfer rights
    let err = platform.designs.transfer_design(ALICE, design.id, CAROL).unwrap_err();
    assert!(matches!(err, LedgerError::Forbidden(_)));
}

/// Patent status stays under the creator's control after transfer
#[test]
fn test_patent_status_follows_creator() {
    let platform = test_platform();

    let design = platform.designs.mint_design(ALICE, design_input("Lattice")).unwrap();
    platform.designs.transfer_design(ALICE, design.id, BOB).unwrap();

    // The new owner has no patent authority
    let err = platform.designs.update_patent_status(BOB, design.id, "filed").unwrap_err();
    assert!(matches!(err, LedgerError::Forbidden(_)));

    // The original creator still does
    let updated = platform.designs.update_patent_status(ALICE, design.id, "granted").unwrap();
    assert_eq!(updated.patent_status, PatentStatus::Granted);
}

/// Unknown patent statuses are rejected without touching the record
#[test]
fn test_patent_status_validation() {
    let platform = test_platform();

    let design = platform.designs.mint_design(ALICE, design_input("Lattice")).unwrap();

    let err = platform.designs.update_patent_status(ALICE, design.id, "approved").unwrap_err();
    assert!(matches!(err, LedgerError::InvalidInput(_)));

    let current = platform.designs.get_design(design.id).unwrap().unwrap();
    assert_eq!(current.patent_status, PatentStatus::Pending);
}

/// Operations on a design that never existed are NotFound
#[test]
fn test_design_not_found() {
    let platform = test_platform();

    assert!(platform.designs.get_design(9).unwrap().is_none());

    let err = platform.designs.transfer_design(ALICE, 9, BOB).unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)));

    let err = platform.designs.update_patent_status(ALICE, 9, "filed").unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)));
}

// =============================================================================
// Proposal registry
// =============================================================================

/// Partial funding accumulates without changing the status
#[test]
fn test_proposal_funding_below_goal_stays_active() {
    let platform = test_platform();
    platform.tokens.mint_tokens(ADMIN, 1_000_000, BOB).unwrap();

    let proposal = platform.proposals.submit_proposal(ALICE, proposal_input("Nanobots", 1_000_000)).unwrap();
    assert_eq!(proposal.current_funding, 0);
    assert_eq!(proposal.status, ProposalStatus::Active);

    let funded = platform.proposals.fund_proposal(BOB, proposal.id, 500_000).unwrap();
    assert_eq!(funded.current_funding, 500_000);
    assert_eq!(funded.status, ProposalStatus::Active);

    // The researcher was paid
    assert_eq!(platform.tokens.get_balance(ALICE).unwrap(), 500_000);
    assert_eq!(platform.tokens.get_balance(BOB).unwrap(), 500_000);
}

/// Only the researcher may move a proposal through its lifecycle
#[test]
fn test_proposal_status_gated_on_researcher() {
    let platform = test_platform();

    let proposal = platform.proposals.submit_proposal(ALICE, proposal_input("Nanobots", 1000)).unwrap();

    let err = platform.proposals.change_proposal_status(BOB, proposal.id, "completed").unwrap_err();
    assert!(matches!(err, LedgerError::Forbidden(_)));

    let err = platform.proposals.change_proposal_status(ADMIN, proposal.id, "completed").unwrap_err();
    assert!(matches!(err, LedgerError::Forbidden(_)));

    let updated = platform.proposals.change_proposal_status(ALICE, proposal.id, "completed").unwrap();
    assert_eq!(updated.status, ProposalStatus::Completed);
}

/// A closed proposal stops accepting funding
#[test]
fn test_funding_closed_proposal_fails() {
    let platform = test_platform();
    platform.tokens.mint_tokens(ADMIN, 1000, BOB).unwrap();

    let proposal = platform.proposals.submit_proposal(ALICE, proposal_input("Nanobots", 1000)).unwrap();
    platform.proposals.change_proposal_status(ALICE, proposal.id, "cancelled").unwrap();

    let err = platform.proposals.fund_proposal(BOB, proposal.id, 100).unwrap_err();
    assert!(matches!(err, LedgerError::Inactive(_)));
    assert_eq!(platform.tokens.get_balance(BOB).unwrap(), 1000);
}

/// Funding a proposal that never existed is NotFound
#[test]
fn test_funding_missing_proposal() {
    let platform = test_platform();
    platform.tokens.mint_tokens(ADMIN, 1000, BOB).unwrap();

    let err = platform.proposals.fund_proposal(BOB, 42, 100).unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)));
    assert_eq!(platform.tokens.get_balance(BOB).unwrap(), 1000);
}

/// Unknown status strings are rejected
#[test]
fn test_proposal_status_validation() {
    let platform = test_platform();

    let proposal = platform.proposals.submit_proposal(ALICE, proposal_input("Nanobots", 1000)).unwrap();

    let err = platform.proposals.change_proposal_status(ALICE, proposal.id, "paused").unwrap_err();
    assert!(matches!(err, LedgerError::InvalidInput(_)));

    let current = platform.proposals.get_proposal(proposal.id).unwrap().unwrap();
    assert_eq!(current.status, ProposalStatus::Active);
}

// =============================================================================
// Cross-cutting
// =============================================================================

/// Each collection numbers its records independently from 1
#[test]
fn test_id_sequences_are_per_collection() {
    let platform = test_platform();

    let listing = platform.market.create_listing(ALICE, listing_input("Batch", 10)).unwrap();
    let design = platform.designs.mint_design(ALICE, design_input("Lattice")).unwrap();
    let proposal = platform.proposals.submit_proposal(ALICE, proposal_input("Nanobots", 1000)).unwrap();

    assert_eq!(listing.id, 1);
    assert_eq!(design.id, 1);
    assert_eq!(proposal.id, 1);

    let second_design = platform.designs.mint_design(BOB, design_input("Assembler")).unwrap();
    assert_eq!(second_design.id, 2);
    assert_eq!(platform.market.get_listing_count().unwrap(), 1);
    assert_eq!(platform.designs.get_design_count().unwrap(), 2);
    assert_eq!(platform.proposals.get_proposal_count().unwrap(), 1);
}

/// The movement log records every settlement with its context
#[test]
fn test_transfer_log() {
    let platform = test_platform();
    platform.tokens.mint_tokens(ADMIN, 1000, BOB).unwrap();

    let listing = platform.market.create_listing(ALICE, listing_input("Batch", 300)).unwrap();
    platform.market.purchase_listing(BOB, listing.id).unwrap();

    let bob_log = platform.tokens.transfers_for_account(BOB, 10).unwrap();
    assert_eq!(bob_log.len(), 2);

    // Newest first: the purchase, then the mint
    assert_eq!(bob_log[0].kind, "purchase");
    assert_eq!(bob_log[0].sender.as_deref(), Some(BOB));
    assert_eq!(bob_log[0].recipient, ALICE);
    assert_eq!(bob_log[0].amount, 300);
    assert_eq!(bob_log[0].context_id, Some(listing.id));

    assert_eq!(bob_log[1].kind, "mint");
    assert!(bob_log[1].sender.is_none());
}

/// Boundary envelopes carry the protocol codes callers branch on
#[test]
fn test_call_result_envelope() {
    let platform = test_platform();

    let minted = CallResult::from_result(platform.tokens.mint_tokens(ADMIN, 100, ALICE));
    assert!(minted.success);
    assert_eq!(minted.value, Some(100));

    let forbidden = CallResult::from_result(platform.tokens.mint_tokens(ALICE, 100, ALICE));
    assert!(!forbidden.success);
    assert_eq!(forbidden.error, Some(403));
    assert_eq!(forbidden.to_json_string(), r#"{"success":false,"error":403}"#);

    let missing = CallResult::from_option(platform.market.get_listing(7), "listing 7");
    assert!(!missing.success);
    assert_eq!(missing.error, Some(404));
}

/// Committed mutations surface on the event bus
#[test]
fn test_events_emitted_on_commit() {
    let platform = test_platform();
    let mut receiver = platform.events.subscribe();

    platform.tokens.mint_tokens(ADMIN, 100, ALICE).unwrap();

    match receiver.try_recv().unwrap() {
        nanoledger::LedgerEvent::TokensMinted { recipient, amount } => {
            assert_eq!(recipient, ALICE);
            assert_eq!(amount, 100);
        }
        other => panic!("unexpected event: {:?}", other),
    }

    // A failed mutation emits nothing
    let _ = platform.tokens.mint_tokens(ALICE, 100, ALICE);
    assert!(receiver.try_recv().is_err());
}

/// Stats reflect every registry
#[test]
fn test_stats() {
    let platform = test_platform();
    platform.tokens.mint_tokens(ADMIN, 1000, ALICE).unwrap();
    platform.market.create_listing(ALICE, listing_input("Batch", 10)).unwrap();
    platform.designs.mint_design(ALICE, design_input("Lattice")).unwrap();
    platform.proposals.submit_proposal(ALICE, proposal_input("Nanobots", 1000)).unwrap();

    let stats = platform.stats().unwrap();
    assert_eq!(stats.account_count, 1);
    assert_eq!(stats.listing_count, 1);
    assert_eq!(stats.design_count, 1);
    assert_eq!(stats.proposal_count, 1);
    assert_eq!(stats.transfer_count, 1);
}

/// State survives closing and reopening the platform
#[test]
fn test_persistence_across_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config {
        storage_dir: temp_dir.path().to_path_buf(),
        administrator: ADMIN.to_string(),
        ..Default::default()
    };

    {
        let platform = Platform::open(&config).unwrap();
        platform.tokens.mint_tokens(ADMIN, 750, ALICE).unwrap();
        platform.market.create_listing(ALICE, listing_input("Batch", 75)).unwrap();
    }

    let platform = Platform::open(&config).unwrap();
    assert_eq!(platform.tokens.get_balance(ALICE).unwrap(), 750);

    let listing = platform.market.get_listing(1).unwrap().unwrap();
    assert_eq!(listing.seller, ALICE);
    assert!(listing.active);

    // Id allocation continues where it left off
    let next = platform.market.create_listing(ALICE, listing_input("Batch", 80)).unwrap();
    assert_eq!(next.id, 2);
}
