//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `wallets` - Wallet rows (key: wallet_id)
//! - `transactions` - Append-only ledger entries (key: transaction_id)
//! - `indices` - Wallet history index (key: wallet_id || inverted_millis || transaction_id)
//!
//! The history index inverts the entry timestamp so a forward prefix scan
//! yields newest-first ordering without a reverse iterator.

use crate::{
    error::{Error, Result},
    types::{Transaction, Wallet},
    Config,
};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DBCompactionStyle, IteratorMode, Options, WriteBatch, DB,
};
use std::sync::Arc;
use uuid::Uuid;

/// Column family names
const CF_WALLETS: &str = "wallets";
const CF_TRANSACTIONS: &str = "transactions";
const CF_INDICES: &str = "indices";

/// Durable record of wallets and their transaction history
///
/// All multi-row mutations go through [`WalletStore::commit_atomic`], which
/// applies one `WriteBatch`: either every row lands or none do. Rollback is
/// the absence of the batch write.
pub struct WalletStore {
    db: Arc<DB>,
}

impl WalletStore {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        // Create directory if not exists
        std::fs::create_dir_all(path)?;

        // Database options
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        // Tuning from config
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        // Universal compaction for the append-heavy transaction log
        db_opts.set_compaction_style(DBCompactionStyle::Universal);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        // Column family descriptors
        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_WALLETS, Self::cf_options_wallets()),
            ColumnFamilyDescriptor::new(CF_TRANSACTIONS, Self::cf_options_transactions()),
            ColumnFamilyDescriptor::new(CF_INDICES, Self::cf_options_indices()),
        ];

        // Open database
        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(
            "Opened RocksDB at {:?} with {} column families",
            path,
            db.cf_handle(CF_WALLETS).is_some() as usize
                + db.cf_handle(CF_TRANSACTIONS).is_some() as usize
                + db.cf_handle(CF_INDICES).is_some() as usize
        );

        Ok(Self { db: Arc::new(db) })
    }

    // Column family options

    fn cf_options_wallets() -> Options {
        let mut opts = Options::default();
        // Wallet rows are frequently read, use LZ4 for speed
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_transactions() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts.set_bottommost_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_indices() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        // Indices benefit from bloom filters
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false); // 10 bits per key
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    // Helper: get column family handle

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    // Wallet operations

    /// Get wallet by ID
    pub fn get_wallet(&self, wallet_id: Uuid) -> Result<Wallet> {
        let cf = self.cf_handle(CF_WALLETS)?;
        let key = wallet_id.as_bytes();

        let value = self
            .db
            .get_cf(cf, key)?
            .ok_or(Error::WalletNotFound(wallet_id))?;

        let wallet: Wallet = bincode::deserialize(&value)?;
        Ok(wallet)
    }

    /// Check whether a wallet row exists without deserializing it
    pub fn wallet_exists(&self, wallet_id: Uuid) -> Result<bool> {
        let cf = self.cf_handle(CF_WALLETS)?;
        Ok(self.db.get_pinned_cf(cf, wallet_id.as_bytes())?.is_some())
    }

    // Transaction operations

    /// Get transaction by ID
    pub fn get_transaction(&self, transaction_id: Uuid) -> Result<Transaction> {
        let cf = self.cf_handle(CF_TRANSACTIONS)?;
        let key = transaction_id.as_bytes();

        let value = self
            .db
            .get_cf(cf, key)?
            .ok_or_else(|| Error::Storage(format!("Transaction not found: {}", transaction_id)))?;

        let transaction: Transaction = bincode::deserialize(&value)?;
        Ok(transaction)
    }

    /// Get a wallet's transaction history, newest first (via index)
    pub fn transactions_for_wallet(&self, wallet_id: Uuid) -> Result<Vec<Transaction>> {
        let cf_indices = self.cf_handle(CF_INDICES)?;

        // Scan index: wallet_id || inverted_millis || transaction_id
        let prefix = wallet_id.as_bytes().to_vec();
        let iter = self.db.prefix_iterator_cf(cf_indices, &prefix);

        let mut transactions = Vec::new();
        for item in iter {
            let (key, _) = item?;

            // The iterator does not stop at the prefix boundary on its own
            if !key.starts_with(&prefix) {
                break;
            }

            // Extract transaction_id from key (bytes 24..40)
            if key.len() >= 40 {
                let tx_id_bytes: [u8; 16] = key[24..40]
                    .try_into()
                    .map_err(|_| Error::Storage("Malformed index key".to_string()))?;
                let tx_id = Uuid::from_bytes(tx_id_bytes);

                let transaction = self.get_transaction(tx_id)?;
                transactions.push(transaction);
            }
        }

        Ok(transactions)
    }

    // Batch operations (atomic)

    /// Commit wallet rows and ledger entries as one atomic unit
    ///
    /// Used for every mutation: wallet creation, funding, and both sides of
    /// a transfer. Either all rows (wallets, transactions, index entries)
    /// become durable together or none do.
    pub fn commit_atomic(&self, wallets: &[Wallet], transactions: &[Transaction]) -> Result<()> {
        let mut batch = WriteBatch::default();

        // 1. Wallet rows
        let cf_wallets = self.cf_handle(CF_WALLETS)?;
        for wallet in wallets {
            let value = bincode::serialize(wallet)?;
            batch.put_cf(cf_wallets, wallet.id.as_bytes(), &value);
        }

        // 2. Ledger entries
        let cf_transactions = self.cf_handle(CF_TRANSACTIONS)?;
        let cf_indices = self.cf_handle(CF_INDICES)?;
        for transaction in transactions {
            let value = bincode::serialize(transaction)?;
            batch.put_cf(cf_transactions, transaction.id.as_bytes(), &value);

            // 3. History index: wallet_id || inverted_millis || transaction_id -> empty
            let idx_key = Self::index_key_wallet_tx(transaction);
            batch.put_cf(cf_indices, &idx_key, &[]);
        }

        // Atomic commit
        self.db.write(batch)?;

        tracing::debug!(
            wallet_count = wallets.len(),
            transaction_count = transactions.len(),
            "Atomic commit applied"
        );

        Ok(())
    }

    // Index key helpers

    /// History index key: inverted timestamp sorts newest entries first
    fn index_key_wallet_tx(transaction: &Transaction) -> Vec<u8> {
        let inverted = u64::MAX - transaction.created_at.timestamp_millis() as u64;

        let mut key = transaction.wallet_id.as_bytes().to_vec();
        key.extend_from_slice(&inverted.to_be_bytes());
        key.extend_from_slice(transaction.id.as_bytes());
        key
    }

    // Statistics

    /// Get storage statistics
    pub fn get_stats(&self) -> Result<StoreStats> {
        let cf_wallets = self.cf_handle(CF_WALLETS)?;
        let cf_transactions = self.cf_handle(CF_TRANSACTIONS)?;

        Ok(StoreStats {
            total_wallets: self.approximate_count(cf_wallets)?,
            total_transactions: self.approximate_count(cf_transactions)?,
        })
    }

    fn approximate_count(&self, cf: &ColumnFamily) -> Result<u64> {
        // RocksDB property for approximate count
        let prop = self
            .db
            .property_int_value_cf(cf, "rocksdb.estimate-num-keys")?
            .unwrap_or(0);

        Ok(prop)
    }

    /// Close database (graceful shutdown)
    pub fn close(self) -> Result<()> {
        drop(self.db);
        tracing::info!("RocksDB closed gracefully");
        Ok(())
    }

    /// Exact count of wallet rows (full scan, tests and tooling only)
    pub fn count_wallets(&self) -> Result<u64> {
        let cf = self.cf_handle(CF_WALLETS)?;
        let mut count = 0u64;
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            item?;
            count += 1;
        }
        Ok(count)
    }
}

/// Storage statistics
#[derive(Debug, Clone)]
pub struct StoreStats {
    /// Approximate wallet row count
    pub total_wallets: u64,
    /// Approximate ledger entry count
    pub total_transactions: u64,
}
