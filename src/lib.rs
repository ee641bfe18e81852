//! Nanoledger - ledger-backed registries for a nanotech research
//! collaboration network
//!
//! Four registries cooperate over one SQLite database: an incentive
//! token ledger with reputation scoring, a marketplace for lab
//! materials and equipment, a registry of nanotech designs with
//! patent tracking, and a registry of funded research proposals.
//!
//! ## Architecture
//!
//! - **Token ledger**: administrator-minted balances, peer-review
//!   rewards, reputation scores
//! - **Marketplace / Designs / Proposals**: registries referencing
//!   the token ledger for settlement
//! - **One database**: cross-registry mutations commit atomically;
//!   a purchase that cannot be paid for never deactivates a listing
//!
//! ## Storage Layout
//!
//! ```text
//! ~/.local/share/nanoledger/
//! ├── ledger.db       # All registries (SQLite, WAL mode)
//! └── config.toml     # Administrator identity, funding policy
//! ```
//!
//! ## Calling Convention
//!
//! Every operation takes the caller's identity as an explicit first
//! argument; there is no ambient session. Boundary transports wrap
//! outcomes in [`services::CallResult`], a `{ success, value | error }`
//! envelope with a closed set of numeric error codes.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod services;

// Re-exports
pub use config::Config;
pub use db::{LedgerDb, LedgerStats};
pub use error::LedgerError;
pub use services::{
    CallResult, DesignService, EventBus, LedgerEvent, MarketService, Platform, ProposalService,
    TokenService,
};
