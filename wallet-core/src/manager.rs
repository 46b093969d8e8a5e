//! Balance mutation and query orchestration
//!
//! This module ties together the store, lock table, idempotency cache, and
//! integrity verifier into a high-level API for wallet operations. Every
//! mutation is one atomic unit of work: balances and ledger entries commit
//! together or not at all, under row locks acquired in canonical order.
//!
//! # Example
//!
//! ```no_run
//! use rust_decimal::Decimal;
//! use wallet_core::{Config, Currency, WalletManager};
//!
//! #[tokio::main]
//! async fn main() -> wallet_core::Result<()> {
//!     let config = Config::default();
//!     let manager = WalletManager::open(config).await?;
//!
//!     let wallet = manager
//!         .create_wallet(Currency::USD, Decimal::new(10000, 2))
//!         .await?;
//!     let funded = manager.fund(wallet.id, Decimal::new(2500, 2)).await?;
//!     assert_eq!(funded.balance, Decimal::new(12500, 2));
//!
//!     Ok(())
//! }
//! ```

use crate::{
    idempotency::{self, CachedResponse, IdempotencyCache},
    integrity::{self, IntegrityReport},
    locks::LockTable,
    metrics::Metrics,
    store::{StoreStats, WalletStore},
    types::{
        round2, validate_amount, validate_initial_balance, within_balance_range, Currency,
        Transaction, TransactionKind, Wallet,
    },
    Config, Error, Result,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Operation names used in idempotency fingerprints
const OP_FUND: &str = "fund";
const OP_TRANSFER: &str = "transfer";

/// Both sides of a completed transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferOutcome {
    /// Sender wallet after the commit
    pub sender: Wallet,

    /// Receiver wallet after the commit
    pub receiver: Wallet,
}

/// A wallet together with its ordered history and replay check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletDetails {
    /// The wallet row
    pub wallet: Wallet,

    /// Transaction history, newest first
    pub transactions: Vec<Transaction>,

    /// Replay check result (advisory, never a failure)
    pub integrity: IntegrityReport,
}

/// Main wallet interface
pub struct WalletManager {
    /// Durable wallet and transaction rows
    store: Arc<WalletStore>,

    /// Row-level locks serializing mutations per wallet
    locks: LockTable,

    /// Retried-request cache, consulted before any lock
    cache: Arc<IdempotencyCache>,

    /// Prometheus metrics
    metrics: Arc<Metrics>,

    /// Configuration
    config: Config,
}

impl WalletManager {
    /// Open the manager with configuration
    ///
    /// Opens storage and starts the idempotency sweep task.
    pub async fn open(config: Config) -> Result<Self> {
        let store = Arc::new(WalletStore::open(&config)?);
        let locks = LockTable::new(Duration::from_secs(config.lock_timeout_secs));

        let cache = Arc::new(IdempotencyCache::new(&config.idempotency));
        cache.start_sweeper();

        let metrics = Arc::new(
            Metrics::new().map_err(|e| Error::Config(format!("Failed to register metrics: {}", e)))?,
        );

        info!(data_dir = ?config.data_dir, "Wallet manager ready");

        Ok(Self {
            store,
            locks,
            cache,
            metrics,
            config,
        })
    }

    /// Create a wallet with an optional opening balance
    ///
    /// A positive opening balance is recorded as one synthetic funding
    /// entry in the same atomic commit as the wallet row.
    pub async fn create_wallet(&self, currency: Currency, initial_balance: Decimal) -> Result<Wallet> {
        let balance = validate_initial_balance(initial_balance)?;

        let wallet = Wallet::new(currency, balance);

        let mut transactions = Vec::new();
        if balance > Decimal::ZERO {
            transactions.push(Transaction::new(
                wallet.id,
                TransactionKind::Fund,
                balance,
                None,
                Some(format!("Initial wallet balance: {} {}", balance, currency)),
            ));
        }

        self.store.commit_atomic(&[wallet.clone()], &transactions)?;
        self.metrics.record_wallet_created();

        info!(
            wallet_id = %wallet.id,
            currency = %currency,
            balance = %balance,
            "Wallet created"
        );

        Ok(wallet)
    }

    /// Credit a wallet from an external funding source
    ///
    /// The amount is rounded to 2 decimal places and must be positive. A
    /// retried request with the same wallet and amount returns the cached
    /// response without touching the store.
    pub async fn fund(&self, wallet_id: Uuid, amount: Decimal) -> Result<Wallet> {
        let amount = validate_amount(amount)?;

        // Cache consultation happens before any lock
        let key = idempotency::fingerprint(OP_FUND, wallet_id, amount, None);
        if let Some(CachedResponse::Funded(wallet)) = self.cache.get(&key) {
            self.metrics.record_idempotency_hit();
            debug!(wallet_id = %wallet_id, "Fund request answered from idempotency cache");
            return Ok(wallet);
        }

        let started = Instant::now();
        let _lock = self.locks.lock_one(wallet_id).await?;

        let mut wallet = self.store.get_wallet(wallet_id)?;

        let new_balance = round2(wallet.balance + amount);
        if !within_balance_range(new_balance) {
            return Err(Error::AmountOutOfRange(new_balance));
        }

        wallet.balance = new_balance;
        wallet.updated_at = Utc::now();

        let transaction = Transaction::new(
            wallet.id,
            TransactionKind::Fund,
            amount,
            None,
            Some(format!("Fund wallet with {} {}", amount, wallet.currency)),
        );

        self.store.commit_atomic(&[wallet.clone()], &[transaction])?;

        self.cache.set(key, CachedResponse::Funded(wallet.clone()));
        self.metrics.update_idempotency_entries(self.cache.len() as i64);
        self.metrics.record_fund(started.elapsed().as_secs_f64());

        info!(
            wallet_id = %wallet.id,
            amount = %amount,
            balance = %wallet.balance,
            "Wallet funded"
        );

        Ok(wallet)
    }

    /// Move funds between two wallets
    ///
    /// Locks both rows in canonical order before reading either, then
    /// commits both balance updates and the paired TRANSFER_OUT /
    /// TRANSFER_IN entries as one unit. Any validation failure aborts with
    /// nothing written.
    pub async fn transfer(
        &self,
        sender_id: Uuid,
        receiver_id: Uuid,
        amount: Decimal,
    ) -> Result<TransferOutcome> {
        if sender_id == receiver_id {
            return Err(Error::SameWallet(sender_id));
        }
        let amount = validate_amount(amount)?;

        let key = idempotency::fingerprint(OP_TRANSFER, sender_id, amount, Some(receiver_id));
        if let Some(CachedResponse::Transferred { sender, receiver }) = self.cache.get(&key) {
            self.metrics.record_idempotency_hit();
            debug!(
                sender_id = %sender_id,
                receiver_id = %receiver_id,
                "Transfer request answered from idempotency cache"
            );
            return Ok(TransferOutcome { sender, receiver });
        }

        let started = Instant::now();
        let _locks = self.locks.lock_pair(sender_id, receiver_id).await?;

        let mut sender = self.store.get_wallet(sender_id)?;
        let mut receiver = self.store.get_wallet(receiver_id)?;

        let sender_balance = round2(sender.balance - amount);
        if sender_balance < Decimal::ZERO {
            return Err(Error::InsufficientBalance {
                wallet_id: sender_id,
                available: sender.balance,
                requested: amount,
            });
        }

        let receiver_balance = round2(receiver.balance + amount);
        if !within_balance_range(receiver_balance) {
            return Err(Error::AmountOutOfRange(receiver_balance));
        }

        let now = Utc::now();
        sender.balance = sender_balance;
        sender.updated_at = now;
        receiver.balance = receiver_balance;
        receiver.updated_at = now;

        let debit = Transaction::new(
            sender.id,
            TransactionKind::TransferOut,
            amount,
            Some(receiver.id),
            Some(format!("Transfer to wallet {}", receiver.id)),
        );
        let credit = Transaction::new(
            receiver.id,
            TransactionKind::TransferIn,
            amount,
            Some(sender.id),
            Some(format!("Transfer from wallet {}", sender.id)),
        );

        self.store
            .commit_atomic(&[sender.clone(), receiver.clone()], &[debit, credit])?;

        let outcome = TransferOutcome { sender, receiver };
        self.cache.set(
            key,
            CachedResponse::Transferred {
                sender: outcome.sender.clone(),
                receiver: outcome.receiver.clone(),
            },
        );
        self.metrics.update_idempotency_entries(self.cache.len() as i64);
        self.metrics.record_transfer(started.elapsed().as_secs_f64());

        info!(
            sender_id = %outcome.sender.id,
            receiver_id = %outcome.receiver.id,
            amount = %amount,
            "Transfer completed"
        );

        Ok(outcome)
    }

    /// Get a wallet with its full history, newest first
    ///
    /// The integrity verifier runs on every read; drift is logged and
    /// reported in the result but never fails the request.
    pub async fn get_details(&self, wallet_id: Uuid) -> Result<WalletDetails> {
        let wallet = self.store.get_wallet(wallet_id)?;
        let transactions = self.store.transactions_for_wallet(wallet_id)?;

        let integrity = integrity::verify(&wallet, &transactions);
        if !integrity.is_valid {
            self.metrics.record_integrity_mismatch();
            warn!(
                wallet_id = %wallet.id,
                current = %integrity.current_balance,
                calculated = %integrity.calculated_balance,
                discrepancy = %integrity.discrepancy,
                "Stored balance does not match transaction history"
            );
        }

        Ok(WalletDetails {
            wallet,
            transactions,
            integrity,
        })
    }

    /// Replay a wallet's history against its stored balance
    pub async fn verify_integrity(&self, wallet_id: Uuid) -> Result<IntegrityReport> {
        let wallet = self.store.get_wallet(wallet_id)?;
        let transactions = self.store.transactions_for_wallet(wallet_id)?;

        let report = integrity::verify(&wallet, &transactions);
        if !report.is_valid {
            self.metrics.record_integrity_mismatch();
            warn!(
                wallet_id = %wallet.id,
                discrepancy = %report.discrepancy,
                "Integrity check found drift"
            );
        }

        Ok(report)
    }

    /// Storage statistics
    pub fn stats(&self) -> Result<StoreStats> {
        self.store.get_stats()
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Configuration in effect
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shutdown: stop background tasks and close storage
    pub async fn shutdown(self) -> Result<()> {
        self.cache.shutdown();

        if let Ok(store) = Arc::try_unwrap(self.store) {
            store.close()?;
        }

        info!("Wallet manager shut down");
        Ok(())
    }
}
