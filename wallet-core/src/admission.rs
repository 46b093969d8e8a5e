//! Admission control for the request path
//!
//! Fixed-window request counting per caller key per operation class:
//! the first request in a window starts a fresh count, later requests
//! increment it, and once the count reaches the class limit the caller is
//! rejected until the window resets. Rejections happen before any cache or
//! store access. Mutations carry stricter limits than lookups.

use crate::config::AdmissionConfig;
use crate::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::warn;

/// Protected operation class, each with its own per-caller limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpClass {
    /// Read-only wallet lookups
    Lookup,
    /// Funding mutations
    Fund,
    /// Transfer mutations
    Transfer,
}

/// Admission decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionDecision {
    /// Request admitted
    Allowed {
        /// Requests left in the current window after this one
        remaining: u32,
    },

    /// Request rejected until the window resets
    Denied {
        /// Seconds until the caller's window resets (rounded up)
        retry_after_secs: u64,
        /// Wall-clock reset time, for backoff headers
        resets_at: DateTime<Utc>,
    },
}

impl AdmissionDecision {
    /// Map a denial into the error taxonomy, keeping the remaining quota on success
    pub fn into_result(self) -> Result<u32> {
        match self {
            AdmissionDecision::Allowed { remaining } => Ok(remaining),
            AdmissionDecision::Denied {
                retry_after_secs, ..
            } => Err(Error::RateLimited { retry_after_secs }),
        }
    }
}

#[derive(Debug)]
struct Window {
    count: u32,
    resets_at: DateTime<Utc>,
}

/// Fixed-window admission controller
///
/// Constructed explicitly and consulted by the transport before any core
/// operation is invoked. Stale windows are dropped lazily on check and
/// periodically by the cleanup task.
pub struct AdmissionController {
    config: AdmissionConfig,
    windows: DashMap<(String, OpClass), Window>,
    shutdown_tx: watch::Sender<bool>,
}

impl AdmissionController {
    /// Create a controller with the configured per-class limits
    pub fn new(config: AdmissionConfig) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            config,
            windows: DashMap::new(),
            shutdown_tx,
        }
    }

    fn limit_for(&self, class: OpClass) -> u32 {
        match class {
            OpClass::Lookup => self.config.lookup_limit,
            OpClass::Fund => self.config.fund_limit,
            OpClass::Transfer => self.config.transfer_limit,
        }
    }

    /// Admit or reject a request for the caller's current window
    pub fn check(&self, caller_key: &str, class: OpClass) -> AdmissionDecision {
        let max = self.limit_for(class);
        let window_len = Duration::seconds(self.config.window_secs as i64);
        let now = Utc::now();

        let mut window = self
            .windows
            .entry((caller_key.to_string(), class))
            .or_insert_with(|| Window {
                count: 0,
                resets_at: now + window_len,
            });

        // A window whose reset time has passed restarts fresh
        if now >= window.resets_at {
            window.count = 0;
            window.resets_at = now + window_len;
        }

        if window.count < max {
            window.count += 1;
            AdmissionDecision::Allowed {
                remaining: max - window.count,
            }
        } else {
            let millis_left = (window.resets_at - now).num_milliseconds().max(0) as u64;
            let retry_after_secs = (millis_left + 999) / 1000; // round up
            warn!(
                caller = caller_key,
                class = ?class,
                retry_after_secs,
                "Admission limit exceeded"
            );
            AdmissionDecision::Denied {
                retry_after_secs,
                resets_at: window.resets_at,
            }
        }
    }

    /// Requests left for a caller in the current window
    ///
    /// The full limit when no live window exists.
    pub fn remaining(&self, caller_key: &str, class: OpClass) -> u32 {
        let max = self.limit_for(class);
        match self.windows.get(&(caller_key.to_string(), class)) {
            Some(window) if Utc::now() < window.resets_at => max.saturating_sub(window.count),
            _ => max,
        }
    }

    /// Wall-clock time at which the caller's window resets
    pub fn resets_at(&self, caller_key: &str, class: OpClass) -> Option<DateTime<Utc>> {
        self.windows
            .get(&(caller_key.to_string(), class))
            .map(|window| window.resets_at)
    }

    /// Forget one caller's window, restoring their full quota
    pub fn reset(&self, caller_key: &str, class: OpClass) {
        self.windows.remove(&(caller_key.to_string(), class));
    }

    /// Forget every window
    pub fn clear(&self) {
        self.windows.clear();
    }

    /// Drop windows whose reset time has passed, returning how many
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.windows.len();
        self.windows.retain(|_, window| window.resets_at > now);
        before.saturating_sub(self.windows.len())
    }

    /// Number of live windows (expired-but-unswept included)
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    /// True when no caller has an open window
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Spawn the periodic stale-window cleanup task
    pub fn start_cleanup_task(self: &Arc<Self>) {
        let controller = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let period = std::time::Duration::from_secs(self.config.cleanup_interval_secs);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = controller.purge_expired();
                        if removed > 0 {
                            tracing::debug!(removed, "Admission cleanup dropped stale windows");
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        tracing::debug!("Admission cleanup stopped");
                        break;
                    }
                }
            }
        });
    }

    /// Signal the cleanup task to stop
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}
