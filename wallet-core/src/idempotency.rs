//! Idempotency cache for mutation requests
//!
//! Maps a deterministic request fingerprint to the response produced when
//! that request first succeeded, so a retried request with identical
//! semantic parameters returns the original response without re-executing
//! the mutation. Entries carry a TTL and are purged lazily on lookup plus
//! periodically by a background sweep.
//!
//! The cache bounds retry duplication, not concurrent duplication: two
//! truly simultaneous first-time requests with the same fingerprint can
//! both miss and both execute. Row locks still serialize their commits.

use crate::config::IdempotencyConfig;
use crate::types::Wallet;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

/// Request fingerprint (SHA-256 digest)
pub type Fingerprint = [u8; 32];

/// Compute the fingerprint for a mutation request
///
/// SHA-256 over the canonical string `operation:wallet:amount:counterpart`.
/// The amount is normalized first so equal values at different scales
/// (`50` vs `50.00`) hash identically.
pub fn fingerprint(
    operation: &str,
    wallet_id: Uuid,
    amount: Decimal,
    counterpart: Option<Uuid>,
) -> Fingerprint {
    let amount = amount.normalize();
    let canonical = match counterpart {
        Some(other) => format!("{}:{}:{}:{}", operation, wallet_id, amount, other),
        None => format!("{}:{}:{}:-", operation, wallet_id, amount),
    };

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hasher.finalize().into()
}

/// Response payload replayed on a retried request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CachedResponse {
    /// Result of a successful fund
    Funded(Wallet),
    /// Result of a successful transfer
    Transferred {
        /// Sender wallet after the commit
        sender: Wallet,
        /// Receiver wallet after the commit
        receiver: Wallet,
    },
}

struct CacheEntry {
    response: CachedResponse,
    expires_at: DateTime<Utc>,
}

/// Shared idempotency cache
///
/// Constructed explicitly and injected into the mutation path; the
/// background sweep is started with [`IdempotencyCache::start_sweeper`] and
/// stopped with [`IdempotencyCache::shutdown`].
pub struct IdempotencyCache {
    entries: DashMap<Fingerprint, CacheEntry>,
    ttl: Duration,
    sweep_interval: std::time::Duration,
    shutdown_tx: watch::Sender<bool>,
}

impl IdempotencyCache {
    /// Create a cache with the configured TTL and sweep interval
    pub fn new(config: &IdempotencyConfig) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            entries: DashMap::new(),
            ttl: Duration::seconds(config.ttl_secs as i64),
            sweep_interval: std::time::Duration::from_secs(config.sweep_interval_secs),
            shutdown_tx,
        }
    }

    /// Look up a cached response
    ///
    /// An expired entry is removed on the way out and reported as a miss.
    pub fn get(&self, key: &Fingerprint) -> Option<CachedResponse> {
        let now = Utc::now();

        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > now {
                return Some(entry.response.clone());
            }
        }

        // Lazy purge on lookup
        self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        None
    }

    /// Store a response under the default TTL
    pub fn set(&self, key: Fingerprint, response: CachedResponse) {
        self.set_with_ttl(key, response, self.ttl);
    }

    /// Store a response with an explicit TTL
    pub fn set_with_ttl(&self, key: Fingerprint, response: CachedResponse, ttl: Duration) {
        self.entries.insert(
            key,
            CacheEntry {
                response,
                expires_at: Utc::now() + ttl,
            },
        );
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    /// Number of live entries (expired-but-unswept entries included)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all entries
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Spawn the periodic sweep task
    pub fn start_sweeper(self: &Arc<Self>) {
        let cache = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let period = self.sweep_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = cache.purge_expired();
                        if removed > 0 {
                            tracing::debug!(removed, "Idempotency sweep purged expired entries");
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        tracing::debug!("Idempotency sweeper stopped");
                        break;
                    }
                }
            }
        });
    }

    /// Signal the sweep task to stop
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Currency;

    fn test_cache() -> IdempotencyCache {
        IdempotencyCache::new(&IdempotencyConfig::default())
    }

    fn funded_response() -> CachedResponse {
        CachedResponse::Funded(Wallet::new(Currency::USD, Decimal::new(10000, 2)))
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        let wallet = Uuid::new_v4();
        let other = Uuid::new_v4();

        let a = fingerprint("fund", wallet, Decimal::new(5000, 2), None);
        let b = fingerprint("fund", wallet, Decimal::new(5000, 2), None);
        assert_eq!(a, b);

        let c = fingerprint("transfer", wallet, Decimal::new(5000, 2), Some(other));
        let d = fingerprint("transfer", wallet, Decimal::new(5000, 2), Some(other));
        assert_eq!(c, d);
    }

    #[test]
    fn test_fingerprint_distinguishes_inputs() {
        let wallet = Uuid::new_v4();
        let other = Uuid::new_v4();
        let base = fingerprint("fund", wallet, Decimal::new(5000, 2), None);

        assert_ne!(base, fingerprint("transfer", wallet, Decimal::new(5000, 2), None));
        assert_ne!(base, fingerprint("fund", other, Decimal::new(5000, 2), None));
        assert_ne!(base, fingerprint("fund", wallet, Decimal::new(5001, 2), None));
        assert_ne!(base, fingerprint("fund", wallet, Decimal::new(5000, 2), Some(other)));
    }

    #[test]
    fn test_fingerprint_ignores_decimal_scale() {
        let wallet = Uuid::new_v4();

        // 50 and 50.00 are the same amount
        let a = fingerprint("fund", wallet, Decimal::new(50, 0), None);
        let b = fingerprint("fund", wallet, Decimal::new(5000, 2), None);
        assert_eq!(a, b);
    }

    #[test]
    fn test_get_set_roundtrip() {
        let cache = test_cache();
        let key = fingerprint("fund", Uuid::new_v4(), Decimal::new(100, 2), None);

        assert!(cache.get(&key).is_none());

        let response = funded_response();
        cache.set(key, response.clone());
        assert_eq!(cache.get(&key), Some(response));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_expired_entry_is_a_miss_and_removed() {
        let cache = test_cache();
        let key = fingerprint("fund", Uuid::new_v4(), Decimal::new(100, 2), None);

        cache.set_with_ttl(key, funded_response(), Duration::seconds(-1));
        assert_eq!(cache.len(), 1);

        assert!(cache.get(&key).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_purge_removes_only_expired() {
        let cache = test_cache();
        let live = fingerprint("fund", Uuid::new_v4(), Decimal::new(100, 2), None);
        let dead = fingerprint("fund", Uuid::new_v4(), Decimal::new(200, 2), None);

        cache.set(live, funded_response());
        cache.set_with_ttl(dead, funded_response(), Duration::seconds(-1));

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&live).is_some());
    }

    #[test]
    fn test_clear() {
        let cache = test_cache();
        cache.set(
            fingerprint("fund", Uuid::new_v4(), Decimal::ONE, None),
            funded_response(),
        );
        cache.clear();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_sweeper_runs_and_stops() {
        let cache = Arc::new(test_cache());
        let key = fingerprint("fund", Uuid::new_v4(), Decimal::ONE, None);
        cache.set_with_ttl(key, funded_response(), Duration::seconds(-1));

        // First interval tick fires immediately
        cache.start_sweeper();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(cache.is_empty());

        cache.shutdown();
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
}
