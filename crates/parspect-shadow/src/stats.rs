//! Stats Module - Access Statistics
//!
//! Counters for the shadow-table hot path: how often each access type was
//! tested, how often a test reported presence, and how many inserts,
//! updates and removals each table absorbed.
//!
//! All counters are relaxed atomics; the read and write groups are
//! cache-line padded so two threads hammering opposite access types do not
//! false-share a line. Collection is cheap enough to leave on in
//! production, and `ShadowConfig::stats_enabled` gates it entirely.

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::utils::CachePadded;
use serde::Serialize;

/// Counters for one access type (one signature table).
#[derive(Debug, Default)]
struct SideCounters {
    tests: AtomicU64,
    hits: AtomicU64,
    inserts: AtomicU64,
    updates: AtomicU64,
    removals: AtomicU64,
}

impl SideCounters {
    fn snapshot(&self) -> SideSnapshot {
        let tests = self.tests.load(Ordering::Relaxed);
        let hits = self.hits.load(Ordering::Relaxed);

        SideSnapshot {
            tests,
            hits,
            hit_ratio: if tests == 0 {
                0.0
            } else {
                hits as f64 / tests as f64
            },
            inserts: self.inserts.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            removals: self.removals.load(Ordering::Relaxed),
        }
    }
}

/// Which signature table an event touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Read,
    Write,
}

/// ShadowStats - statistics collector for one shadow deployment
pub struct ShadowStats {
    read: CachePadded<SideCounters>,
    write: CachePadded<SideCounters>,
}

impl ShadowStats {
    pub fn new() -> Self {
        Self {
            read: CachePadded::new(SideCounters::default()),
            write: CachePadded::new(SideCounters::default()),
        }
    }

    fn side(&self, kind: AccessKind) -> &SideCounters {
        match kind {
            AccessKind::Read => &self.read,
            AccessKind::Write => &self.write,
        }
    }

    /// Record a membership test and whether it reported presence.
    pub fn record_test(&self, kind: AccessKind, hit: bool) {
        let side = self.side(kind);
        side.tests.fetch_add(1, Ordering::Relaxed);
        if hit {
            side.hits.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_insert(&self, kind: AccessKind) {
        self.side(kind).inserts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_update(&self, kind: AccessKind) {
        self.side(kind).updates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_removal(&self, kind: AccessKind) {
        self.side(kind).removals.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            read: self.read.snapshot(),
            write: self.write.snapshot(),
        }
    }
}

impl Default for ShadowStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable snapshot of one table's counters.
#[derive(Debug, Clone, Serialize)]
pub struct SideSnapshot {
    pub tests: u64,
    pub hits: u64,
    pub hit_ratio: f64,
    pub inserts: u64,
    pub updates: u64,
    pub removals: u64,
}

/// Serializable snapshot of a full deployment's counters.
///
/// Dumped as one JSON line at verbose teardown.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub read: SideSnapshot,
    pub write: SideSnapshot,
}

impl StatsSnapshot {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}
