//! Event system for ledger operations
//!
//! Provides an event bus for notifying listeners about committed
//! mutations. Useful for:
//! - Audit logging
//! - Balance displays and activity feeds
//! - External indexers
//!
//! Events are emitted only after the backing transaction commits, so
//! a subscriber never observes a mutation that was rolled back.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::db::{PatentStatus, ProposalStatus};

/// Ledger events emitted by services
#[derive(Debug, Clone)]
pub enum LedgerEvent {
    // Token events
    TokensMinted {
        recipient: String,
        amount: u64,
    },
    TokensTransferred {
        sender: String,
        recipient: String,
        amount: u64,
    },
    PeerReviewRewarded {
        reviewer: String,
        amount: u64,
        reputation: u64,
    },

    // Marketplace events
    ListingCreated {
        id: u64,
        seller: String,
        price: u64,
    },
    ListingPurchased {
        id: u64,
        buyer: String,
        seller: String,
        price: u64,
    },
    ListingCancelled {
        id: u64,
        seller: String,
    },

    // Design registry events
    DesignMinted {
        id: u64,
        creator: String,
    },
    DesignTransferred {
        id: u64,
        owner: String,
    },
    PatentStatusUpdated {
        id: u64,
        status: PatentStatus,
    },

    // Proposal registry events
    ProposalSubmitted {
        id: u64,
        researcher: String,
        funding_goal: u64,
    },
    ProposalFunded {
        id: u64,
        funder: String,
        amount: u64,
        current_funding: u64,
    },
    ProposalStatusChanged {
        id: u64,
        status: ProposalStatus,
    },
}

/// Trait for event listeners
pub trait EventListener: Send + Sync {
    /// Handle an event
    fn on_event(&self, event: &LedgerEvent);
}

/// Event bus for broadcasting ledger events
pub struct EventBus {
    sender: broadcast::Sender<LedgerEvent>,
}

impl EventBus {
    /// Create a new event bus with default capacity
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    /// Create a new event bus with specified capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all subscribers
    pub fn emit(&self, event: LedgerEvent) {
        trace!(event = ?event, "Emitting ledger event");
        // Ignore send errors (no subscribers)
        let _ = self.sender.send(event);
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Logging event listener for audit trails
pub struct LoggingEventListener;

impl EventListener for LoggingEventListener {
    fn on_event(&self, event: &LedgerEvent) {
        match event {
            LedgerEvent::TokensMinted { recipient, amount } => {
                debug!(recipient = %recipient, amount = %amount, "Tokens minted");
            }
            LedgerEvent::TokensTransferred { sender, recipient, amount } => {
                debug!(sender = %sender, recipient = %recipient, amount = %amount, "Tokens transferred");
            }
            LedgerEvent::PeerReviewRewarded { reviewer, amount, reputation } => {
                debug!(
                    reviewer = %reviewer,
                    amount = %amount,
                    reputation = %reputation,
                    "Peer review rewarded"
                );
            }
            LedgerEvent::ListingPurchased { id, buyer, seller, price } => {
                debug!(id = %id, buyer = %buyer, seller = %seller, price = %price, "Listing purchased");
            }
            LedgerEvent::ProposalFunded { id, funder, amount, current_funding } => {
                debug!(
                    id = %id,
                    funder = %funder,
                    amount = %amount,
                    total = %current_funding,
                    "Proposal funded"
                );
            }
            _ => {
                trace!(event = ?event, "Ledger event");
            }
        }
    }
}

/// Spawn a background task that logs all events
pub fn spawn_logging_listener(event_bus: Arc<EventBus>) -> tokio::task::JoinHandle<()> {
    let mut receiver = event_bus.subscribe();
    let listener = LoggingEventListener;

    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => listener.on_event(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "Event listener lagged, skipped events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed, stopping listener");
                    break;
                }
            }
        }
    })
}
