//! Error types for the wallet ledger

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Result type for wallet operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wallet ledger errors
///
/// Business-rule violations (`WalletNotFound`, `InsufficientBalance`,
/// `AmountOutOfRange`, `SameWallet`) are deterministic and detected before
/// any write. Transient failures (`LockTimeout`, `Storage`, `Io`) may be
/// retried by the caller with the same idempotency fingerprint.
#[derive(Error, Debug)]
pub enum Error {
    /// Wallet does not exist
    #[error("Wallet not found: {0}")]
    WalletNotFound(Uuid),

    /// Debit would drive the balance below zero
    #[error("Insufficient balance in wallet {wallet_id}: available {available}, requested {requested}")]
    InsufficientBalance {
        /// Wallet being debited
        wallet_id: Uuid,
        /// Balance at the time of the attempt
        available: Decimal,
        /// Amount requested
        requested: Decimal,
    },

    /// Amount or resulting balance outside [0, 999999999.99]
    #[error("Amount out of range: {0}")]
    AmountOutOfRange(Decimal),

    /// Transfer names the same wallet on both sides
    #[error("Wallet {0} cannot transfer to itself")]
    SameWallet(Uuid),

    /// Admission controller rejected the request
    #[error("Rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited {
        /// Seconds until the caller's window resets
        retry_after_secs: u64,
    },

    /// Row lock was not acquired within the configured timeout
    #[error("Timed out waiting for lock on wallet {0}")]
    LockTimeout(Uuid),

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl Error {
    /// True for failures safe to retry with the same idempotency fingerprint
    ///
    /// Everything else is deterministic: retrying without changing the
    /// request will fail the same way.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::LockTimeout(_) | Error::Storage(_) | Error::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(Error::LockTimeout(Uuid::new_v4()).is_transient());
        assert!(Error::Storage("unavailable".to_string()).is_transient());

        assert!(!Error::WalletNotFound(Uuid::new_v4()).is_transient());
        assert!(!Error::SameWallet(Uuid::new_v4()).is_transient());
        assert!(!Error::AmountOutOfRange(Decimal::ZERO).is_transient());
        assert!(!Error::RateLimited { retry_after_secs: 30 }.is_transient());
    }

    #[test]
    fn test_error_messages_carry_context() {
        let err = Error::InsufficientBalance {
            wallet_id: Uuid::nil(),
            available: Decimal::new(10000, 2),
            requested: Decimal::new(20000, 2),
        };
        let msg = err.to_string();
        assert!(msg.contains("100.00"));
        assert!(msg.contains("200.00"));
    }
}
