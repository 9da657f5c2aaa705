//! The temporary-unblock ledger.
//!
//! A list of (normalized domain, expiry) records in the local partition,
//! owned exclusively by this module. One entry per domain; adding again
//! replaces. Expired entries are filtered out of every read and compacted
//! away by the controller's periodic sweep, so nothing else ever needs to
//! reason about staleness.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::{host_matches, normalize_domain};
use crate::error::Result;
use crate::storage::{read_opt, write_json, Partition, StorageArea, UNBLOCKS_KEY};

/// One time-limited exemption from enforcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporaryUnblock {
    /// Normalized hostname.
    pub domain: String,
    /// Absolute expiry (epoch milliseconds).
    pub expires_at_ms: u64,
}

// ── Pure list transforms ─────────────────────────────────────────────

/// Keep only entries that have not expired at `now_ms`.
pub fn prune(entries: Vec<TemporaryUnblock>, now_ms: u64) -> Vec<TemporaryUnblock> {
    entries
        .into_iter()
        .filter(|e| e.expires_at_ms > now_ms)
        .collect()
}

/// Replace any entry for `domain` (already normalized) with a fresh one.
pub fn upsert(
    mut entries: Vec<TemporaryUnblock>,
    domain: &str,
    expires_at_ms: u64,
) -> Vec<TemporaryUnblock> {
    entries.retain(|e| e.domain != domain);
    entries.push(TemporaryUnblock {
        domain: domain.to_string(),
        expires_at_ms,
    });
    entries
}

/// Drop the entry for `domain` (already normalized), if present.
pub fn remove_domain(mut entries: Vec<TemporaryUnblock>, domain: &str) -> Vec<TemporaryUnblock> {
    entries.retain(|e| e.domain != domain);
    entries
}

/// True when a non-expired entry equals `host` or is a parent suffix of it.
pub fn covers(entries: &[TemporaryUnblock], host: &str, now_ms: u64) -> bool {
    entries
        .iter()
        .any(|e| e.expires_at_ms > now_ms && host_matches(host, &e.domain))
}

// ── Storage-backed handle ────────────────────────────────────────────

/// Handle over the local partition for ledger reads and read-modify-writes.
#[derive(Clone)]
pub struct UnblockLedger {
    store: Arc<dyn StorageArea>,
}

impl UnblockLedger {
    pub fn new(store: Arc<dyn StorageArea>) -> Self {
        Self { store }
    }

    /// Raw persisted list; storage failures degrade to empty.
    fn load(&self) -> Vec<TemporaryUnblock> {
        read_opt(self.store.as_ref(), Partition::Local, UNBLOCKS_KEY).unwrap_or_default()
    }

    fn save(&self, entries: &[TemporaryUnblock]) -> Result<()> {
        write_json(self.store.as_ref(), Partition::Local, UNBLOCKS_KEY, &entries)
    }

    /// Non-expired entries only; does not mutate storage.
    pub fn get_active(&self, now_ms: u64) -> Vec<TemporaryUnblock> {
        prune(self.load(), now_ms)
    }

    /// True when `domain_or_url` (any shape: bare host or full URL) is
    /// covered by an active entry.
    pub fn is_temporarily_unblocked(&self, domain_or_url: &str, now_ms: u64) -> bool {
        let host = normalize_domain(domain_or_url);
        covers(&self.load(), &host, now_ms)
    }

    /// Add an exemption, replacing any prior entry for the same domain.
    pub fn add(&self, domain: &str, expires_at_ms: u64, now_ms: u64) -> Result<()> {
        let normalized = normalize_domain(domain);
        let entries = upsert(self.get_active(now_ms), &normalized, expires_at_ms);
        self.save(&entries)
    }

    /// Remove the exemption for `domain`, if present.
    pub fn remove(&self, domain: &str, now_ms: u64) -> Result<()> {
        let normalized = normalize_domain(domain);
        let entries = remove_domain(self.get_active(now_ms), &normalized);
        self.save(&entries)
    }

    /// Compact the persisted list down to the still-active subset.
    /// Returns how many active entries remain.
    pub fn cleanup_expired(&self, now_ms: u64) -> Result<usize> {
        let active = self.get_active(now_ms);
        self.save(&active)?;
        tracing::debug!(active = active.len(), "compacted unblock ledger");
        Ok(active.len())
    }

    /// Drop every entry unconditionally.
    pub fn clear_all(&self) -> Result<()> {
        self.store.remove(Partition::Local, UNBLOCKS_KEY)?;
        Ok(())
    }
}
