//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring the wallet ledger.
//!
//! # Metrics
//!
//! - `wallet_creations_total` - Total wallets created
//! - `wallet_funds_total` - Total successful funding operations
//! - `wallet_transfers_total` - Total successful transfers
//! - `wallet_idempotency_hits_total` - Mutations answered from the idempotency cache
//! - `wallet_integrity_mismatches_total` - Integrity checks that found drift
//! - `wallet_fund_duration_seconds` - Histogram of funding latencies
//! - `wallet_transfer_duration_seconds` - Histogram of transfer latencies
//! - `wallet_idempotency_entries` - Live idempotency cache entries

use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, Registry};
use std::sync::Arc;

/// Latency buckets shared by the mutation histograms
fn duration_buckets() -> Vec<f64> {
    vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0]
}

/// Metrics collector
///
/// Metrics register against an owned registry, so independent collectors
/// can coexist in one process.
#[derive(Clone)]
pub struct Metrics {
    /// Total wallets created
    pub wallet_creations_total: IntCounter,

    /// Total successful funding operations
    pub funds_total: IntCounter,

    /// Total successful transfers
    pub transfers_total: IntCounter,

    /// Mutations answered from the idempotency cache
    pub idempotency_hits_total: IntCounter,

    /// Integrity checks that found drift
    pub integrity_mismatches_total: IntCounter,

    /// Funding latency histogram
    pub fund_duration: Histogram,

    /// Transfer latency histogram
    pub transfer_duration: Histogram,

    /// Live idempotency cache entries
    pub idempotency_entries: IntGauge,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let wallet_creations_total =
            IntCounter::new("wallet_creations_total", "Total wallets created")?;
        registry.register(Box::new(wallet_creations_total.clone()))?;

        let funds_total = IntCounter::new(
            "wallet_funds_total",
            "Total successful funding operations",
        )?;
        registry.register(Box::new(funds_total.clone()))?;

        let transfers_total =
            IntCounter::new("wallet_transfers_total", "Total successful transfers")?;
        registry.register(Box::new(transfers_total.clone()))?;

        let idempotency_hits_total = IntCounter::new(
            "wallet_idempotency_hits_total",
            "Mutations answered from the idempotency cache",
        )?;
        registry.register(Box::new(idempotency_hits_total.clone()))?;

        let integrity_mismatches_total = IntCounter::new(
            "wallet_integrity_mismatches_total",
            "Integrity checks that found drift",
        )?;
        registry.register(Box::new(integrity_mismatches_total.clone()))?;

        let fund_duration = Histogram::with_opts(
            HistogramOpts::new(
                "wallet_fund_duration_seconds",
                "Histogram of funding latencies",
            )
            .buckets(duration_buckets()),
        )?;
        registry.register(Box::new(fund_duration.clone()))?;

        let transfer_duration = Histogram::with_opts(
            HistogramOpts::new(
                "wallet_transfer_duration_seconds",
                "Histogram of transfer latencies",
            )
            .buckets(duration_buckets()),
        )?;
        registry.register(Box::new(transfer_duration.clone()))?;

        let idempotency_entries = IntGauge::new(
            "wallet_idempotency_entries",
            "Live idempotency cache entries",
        )?;
        registry.register(Box::new(idempotency_entries.clone()))?;

        Ok(Self {
            wallet_creations_total,
            funds_total,
            transfers_total,
            idempotency_hits_total,
            integrity_mismatches_total,
            fund_duration,
            transfer_duration,
            idempotency_entries,
            registry,
        })
    }

    /// Record wallet creation
    pub fn record_wallet_created(&self) {
        self.wallet_creations_total.inc();
    }

    /// Record a successful funding operation
    pub fn record_fund(&self, duration_seconds: f64) {
        self.funds_total.inc();
        self.fund_duration.observe(duration_seconds);
    }

    /// Record a successful transfer
    pub fn record_transfer(&self, duration_seconds: f64) {
        self.transfers_total.inc();
        self.transfer_duration.observe(duration_seconds);
    }

    /// Record a mutation answered from the idempotency cache
    pub fn record_idempotency_hit(&self) {
        self.idempotency_hits_total.inc();
    }

    /// Record an integrity check that found drift
    pub fn record_integrity_mismatch(&self) {
        self.integrity_mismatches_total.inc();
    }

    /// Update the live idempotency entry gauge
    pub fn update_idempotency_entries(&self, entries: i64) {
        self.idempotency_entries.set(entries);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}
