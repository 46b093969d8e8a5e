//! Wallet Core
//!
//! Embeddable wallet ledger with atomic balance mutations and a
//! replayable transaction history.
//!
//! # Architecture
//!
//! - **Atomic Commits**: Balances and ledger entries land in one write batch
//! - **Row Locks**: Per-wallet async locks, acquired in canonical order
//! - **Idempotency**: Retried mutations replay the cached response
//! - **Admission**: Per-caller fixed windows ahead of every operation
//!
//! # Invariants
//!
//! - Transfers conserve total balance across the two wallets
//! - Every balance mutation leaves a matching transaction record
//! - History reads return entries newest first
//! - Failed operations leave no partial state

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod types;
pub mod store;
pub mod locks;
pub mod integrity;
pub mod idempotency;
pub mod admission;
pub mod manager;
pub mod error;
pub mod config;
pub mod metrics;

// Re-exports
pub use admission::{AdmissionController, AdmissionDecision, OpClass};
pub use config::Config;
pub use error::{Error, Result};
pub use integrity::IntegrityReport;
pub use manager::{TransferOutcome, WalletDetails, WalletManager};
pub use types::{Currency, Transaction, TransactionKind, Wallet};
