//! Access Monitor - Hazard Correlation
//!
//! The shadow tables themselves keep reads and writes strictly apart; the
//! monitor is the caller that correlates them. On every access it tests
//! the opposite access type against the history, records its own access
//! type, and classifies what it found:
//!
//! - read of an address with a recorded write: read-after-write
//! - write of an address with a recorded read: write-after-read
//! - write of an address with a recorded write: write-after-write
//!
//! Hazard tuples `(address, kind, previous, current)` go to the registered
//! sink; with no sink they are only counted. Collision-induced false
//! positives in the tables surface as spurious hazards here - the
//! downstream graph builder is the layer that tolerates them (an extra
//! dependency edge is conservative, never unsound).

use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use parspect_shadow::{
    AccessKind, PerThreadShadow, Result, Shadow, ShadowConfig, ShadowStats, SharedShadow,
    SigElement, StatsSnapshot, SyncMode,
};

/// Hazard classification: which access pair collided on an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HazardKind {
    ReadAfterWrite,
    WriteAfterRead,
    WriteAfterWrite,
}

impl HazardKind {
    /// Stable numeric code used across the C ABI.
    pub fn code(self) -> u32 {
        match self {
            HazardKind::ReadAfterWrite => 0,
            HazardKind::WriteAfterRead => 1,
            HazardKind::WriteAfterWrite => 2,
        }
    }
}

/// One detected hazard between two access elements on one address.
#[derive(Debug, Clone, Copy)]
pub struct Hazard {
    pub addr: u64,
    pub kind: HazardKind,
    /// Element recorded by the earlier access.
    pub previous: SigElement,
    /// Element of the access that triggered the detection.
    pub current: SigElement,
}

/// Out-of-band consumer of the hazard stream.
pub type HazardSink = Box<dyn Fn(&Hazard) + Send + Sync>;

thread_local! {
    /// Fallback access-element sequence, one per thread.
    static ACCESS_SEQ: Cell<u64> = const { Cell::new(0) };
}

/// Policy-selected shadow structure.
enum Backend {
    Shared(SharedShadow),
    PerThread(PerThreadShadow),
}

impl Backend {
    fn shadow(&self) -> &dyn Shadow {
        match self {
            Backend::Shared(s) => s,
            Backend::PerThread(s) => s,
        }
    }
}

/// Monitor - drives the shadow tables for an instrumented execution
///
/// Owns the policy-selected shadow structure, hazard counters and the
/// optional sink. One monitor per monitored region (in practice: one per
/// process, behind the C hooks).
pub struct Monitor {
    backend: Backend,
    stats: Option<ShadowStats>,
    verbose: bool,
    sink: OnceLock<HazardSink>,
    raw_count: AtomicU64,
    war_count: AtomicU64,
    waw_count: AtomicU64,
}

impl Monitor {
    pub fn new(config: &ShadowConfig) -> Result<Self> {
        let backend = match config.mode {
            SyncMode::Shared => Backend::Shared(SharedShadow::new(config)?),
            SyncMode::PerThread => Backend::PerThread(PerThreadShadow::new(config)?),
        };

        log::debug!(
            "monitor started: mode {:?}, {} slots x {} hashes, {}-bit elements",
            config.mode,
            config.slots,
            config.hashes,
            config.slot_bits
        );

        Ok(Self {
            backend,
            stats: config.stats_enabled.then(ShadowStats::new),
            verbose: config.verbose,
            sink: OnceLock::new(),
            raw_count: AtomicU64::new(0),
            war_count: AtomicU64::new(0),
            waw_count: AtomicU64::new(0),
        })
    }

    /// Register the hazard sink. Only the first registration wins.
    pub fn set_sink(&self, sink: HazardSink) -> bool {
        self.sink.set(sink).is_ok()
    }

    /// A read of `addr` by access element `id` (0 = assign a per-thread
    /// sequence number).
    ///
    /// Tests the write history for a read-after-write hazard, then records
    /// the read. Returns the hazard for callers that consume it inline;
    /// the sink sees it either way.
    pub fn on_read(&self, addr: u64, id: SigElement) -> Option<Hazard> {
        let id = resolve_id(id);
        let shadow = self.backend.shadow();

        let prior_write = shadow.test_in_write(addr);
        if let Some(stats) = &self.stats {
            stats.record_test(AccessKind::Write, prior_write.is_some());
            stats.record_insert(AccessKind::Read);
        }
        shadow.insert_to_read(addr, id);

        let hazard = prior_write.map(|previous| Hazard {
            addr,
            kind: HazardKind::ReadAfterWrite,
            previous,
            current: id,
        });
        if let Some(h) = &hazard {
            self.emit(h);
        }
        hazard
    }

    /// A write of `addr` by access element `id` (0 = assign a per-thread
    /// sequence number).
    ///
    /// Tests the read history (write-after-read) and folds test+insert on
    /// the write history (write-after-write). Returns `(war, waw)`.
    pub fn on_write(&self, addr: u64, id: SigElement) -> (Option<Hazard>, Option<Hazard>) {
        let id = resolve_id(id);
        let shadow = self.backend.shadow();

        let prior_read = shadow.test_in_read(addr);
        let prior_write = shadow.insert_to_write(addr, id);
        if let Some(stats) = &self.stats {
            stats.record_test(AccessKind::Read, prior_read.is_some());
            stats.record_insert(AccessKind::Write);
        }

        let war = prior_read.map(|previous| Hazard {
            addr,
            kind: HazardKind::WriteAfterRead,
            previous,
            current: id,
        });
        let waw = prior_write.map(|previous| Hazard {
            addr,
            kind: HazardKind::WriteAfterWrite,
            previous,
            current: id,
        });

        if let Some(h) = &war {
            self.emit(h);
        }
        if let Some(h) = &waw {
            self.emit(h);
        }
        (war, waw)
    }

    /// The address left scope (deallocation, stack frame exit).
    ///
    /// Permissively removes it from both histories; colliding addresses
    /// may be un-marked too, trading exactness for O(1) eviction.
    pub fn on_dealloc(&self, addr: u64) {
        let shadow = self.backend.shadow();
        shadow.remove_from_read(addr);
        shadow.remove_from_write(addr);

        if let Some(stats) = &self.stats {
            stats.record_removal(AccessKind::Read);
            stats.record_removal(AccessKind::Write);
        }
    }

    /// Hazard totals since construction: `(raw, war, waw)`.
    pub fn hazard_counts(&self) -> (u64, u64, u64) {
        (
            self.raw_count.load(Ordering::Relaxed),
            self.war_count.load(Ordering::Relaxed),
            self.waw_count.load(Ordering::Relaxed),
        )
    }

    /// Stats snapshot, if collection is enabled.
    pub fn stats_snapshot(&self) -> Option<StatsSnapshot> {
        self.stats.as_ref().map(|s| s.snapshot())
    }

    /// Log the end-of-execution summary.
    pub fn shutdown(&self) {
        let (raw, war, waw) = self.hazard_counts();
        log::info!(
            "monitor shutdown: {} RAW, {} WAR, {} WAW hazards",
            raw,
            war,
            waw
        );

        if self.verbose {
            if let Some(snapshot) = self.stats_snapshot() {
                log::info!("access stats: {}", snapshot.to_json());
            }
            match &self.backend {
                Backend::Shared(shared) => {
                    let memory = shared.memory();
                    log::info!(
                        "table fill: read {:.3}, write {:.3}",
                        memory.read_signature().fill_ratio(),
                        memory.write_signature().fill_ratio()
                    );
                },
                Backend::PerThread(per_thread) => {
                    for (tid, memory) in per_thread.snapshot() {
                        log::info!(
                            "table fill ({:?}): read {:.3}, write {:.3}",
                            tid,
                            memory.read_signature().fill_ratio(),
                            memory.write_signature().fill_ratio()
                        );
                    }
                },
            }
        }
    }

    fn emit(&self, hazard: &Hazard) {
        let counter = match hazard.kind {
            HazardKind::ReadAfterWrite => &self.raw_count,
            HazardKind::WriteAfterRead => &self.war_count,
            HazardKind::WriteAfterWrite => &self.waw_count,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        log::trace!(
            "hazard {:?} at {:#x}: {} -> {}",
            hazard.kind,
            hazard.addr,
            hazard.previous,
            hazard.current
        );

        if let Some(sink) = self.sink.get() {
            sink(hazard);
        }
    }
}

/// Instrumentation passes an explicit access element; 0 means
/// "unspecified" and gets a per-thread monotonic sequence instead, so
/// hazard tuples still order accesses.
fn resolve_id(id: SigElement) -> SigElement {
    if id != 0 {
        return id;
    }
    ACCESS_SEQ.with(|seq| {
        let next = seq.get() + 1;
        seq.set(next);
        next
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn monitor(mode: SyncMode) -> Monitor {
        let config = ShadowConfig {
            slots: 1 << 12,
            mode,
            ..Default::default()
        };
        Monitor::new(&config).unwrap()
    }

    #[test]
    fn test_read_after_write() {
        let m = monitor(SyncMode::Shared);

        m.on_write(0x1000, 1);
        let hazard = m.on_read(0x1000, 2).expect("RAW expected");

        assert_eq!(hazard.kind, HazardKind::ReadAfterWrite);
        assert_eq!(hazard.previous, 1);
        assert_eq!(hazard.current, 2);
        assert_eq!(m.hazard_counts(), (1, 0, 0));
    }

    #[test]
    fn test_write_after_read_and_write() {
        let m = monitor(SyncMode::Shared);

        m.on_read(0x1000, 1);
        let (war, waw) = m.on_write(0x1000, 2);
        assert_eq!(war.unwrap().kind, HazardKind::WriteAfterRead);
        assert!(waw.is_none());

        let (war, waw) = m.on_write(0x1000, 3);
        assert!(war.is_some()); // the read at element 1 is still recorded
        let waw = waw.unwrap();
        assert_eq!(waw.kind, HazardKind::WriteAfterWrite);
        assert_eq!(waw.previous, 2);
    }

    #[test]
    fn test_reads_alone_raise_nothing() {
        let m = monitor(SyncMode::Shared);

        assert!(m.on_read(0x1000, 1).is_none());
        assert!(m.on_read(0x1000, 2).is_none());
        assert_eq!(m.hazard_counts(), (0, 0, 0));
    }

    #[test]
    fn test_dealloc_forgets_address() {
        let m = monitor(SyncMode::Shared);

        m.on_write(0x1000, 1);
        m.on_dealloc(0x1000);
        assert!(m.on_read(0x1000, 2).is_none());
    }

    #[test]
    fn test_sink_receives_hazards() {
        let m = monitor(SyncMode::Shared);
        let seen = Arc::new(AtomicUsize::new(0));

        let seen_in_sink = Arc::clone(&seen);
        assert!(m.set_sink(Box::new(move |hazard| {
            assert_eq!(hazard.addr, 0x1000);
            seen_in_sink.fetch_add(1, Ordering::Relaxed);
        })));
        // Second registration is refused.
        assert!(!m.set_sink(Box::new(|_| {})));

        m.on_write(0x1000, 1);
        m.on_read(0x1000, 2);
        assert_eq!(seen.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_zero_id_gets_sequence() {
        let m = monitor(SyncMode::Shared);

        m.on_write(0x1000, 0);
        let hazard = m.on_read(0x1000, 0).unwrap();
        // Both accesses received non-zero elements, in order.
        assert!(hazard.previous > 0);
        assert!(hazard.current > hazard.previous);
    }

    #[test]
    fn test_per_thread_mode_isolates_histories() {
        let m = Arc::new(monitor(SyncMode::PerThread));

        m.on_write(0x1000, 1);

        let m_worker = Arc::clone(&m);
        std::thread::spawn(move || {
            // The write happened on the main thread's shadow; this thread
            // sees a clean history.
            assert!(m_worker.on_read(0x1000, 2).is_none());
        })
        .join()
        .unwrap();

        // On the owning thread the write is still visible.
        assert!(m.on_read(0x1000, 3).is_some());
    }

    #[test]
    fn test_stats_track_monitor_traffic() {
        let m = monitor(SyncMode::Shared);

        m.on_write(0x1000, 1);
        m.on_read(0x1000, 2);
        m.on_dealloc(0x1000);

        let snap = m.stats_snapshot().unwrap();
        assert_eq!(snap.read.tests, 1); // the write tested the read table
        assert_eq!(snap.write.tests, 1); // the read tested the write table
        assert_eq!(snap.write.hits, 1);
        assert_eq!(snap.read.inserts, 1);
        assert_eq!(snap.write.inserts, 1);
        assert_eq!(snap.read.removals, 1);
        assert_eq!(snap.write.removals, 1);
    }
}
