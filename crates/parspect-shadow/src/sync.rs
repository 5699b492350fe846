//! Synchronization Policies - Shared vs. Per-Thread Deployment
//!
//! The instrumented program driving the shadow tables is typically
//! multi-threaded. Two policies are supported, chosen per deployment:
//!
//! - [`SharedShadow`]: one `ShadowMemory` shared by every thread. Slot
//!   words are atomic, `insert` swaps the canonical slot, so racing
//!   threads never tear a slot or lose an update non-atomically. Membership
//!   reads may observe a stale value, which the probabilistic design
//!   already tolerates.
//! - [`PerThreadShadow`]: every thread lazily receives its own independent
//!   `ShadowMemory` - no shared mutable slots, no contention. Cross-thread
//!   hazard detection then happens out of band over [`PerThreadShadow::snapshot`].
//!
//! Both wrappers implement the [`Shadow`] trait, so callers pick a policy
//! at construction and stay agnostic afterwards.

use std::cell::RefCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::config::ShadowConfig;
use crate::error::Result;
use crate::shadow::{Shadow, ShadowMemory};
use crate::signature::SigElement;

/// One shadow memory shared by all threads.
///
/// A cheap-clone handle: every clone refers to the same underlying tables.
/// All synchronization is slot-level atomics inside `Signature`; there is
/// no lock on any access path.
#[derive(Clone)]
pub struct SharedShadow {
    inner: Arc<ShadowMemory>,
}

impl SharedShadow {
    pub fn new(config: &ShadowConfig) -> Result<Self> {
        Ok(Self {
            inner: Arc::new(ShadowMemory::new(config)?),
        })
    }

    /// The underlying shadow memory.
    pub fn memory(&self) -> &ShadowMemory {
        &self.inner
    }
}

impl Shadow for SharedShadow {
    fn test_in_read(&self, addr: u64) -> Option<SigElement> {
        self.inner.test_in_read(addr)
    }

    fn test_in_write(&self, addr: u64) -> Option<SigElement> {
        self.inner.test_in_write(addr)
    }

    fn insert_to_read(&self, addr: u64, value: SigElement) -> Option<SigElement> {
        self.inner.insert_to_read(addr, value)
    }

    fn insert_to_write(&self, addr: u64, value: SigElement) -> Option<SigElement> {
        self.inner.insert_to_write(addr, value)
    }

    fn update_in_read(&self, addr: u64, value: SigElement) {
        self.inner.update_in_read(addr, value)
    }

    fn update_in_write(&self, addr: u64, value: SigElement) {
        self.inner.update_in_write(addr, value)
    }

    fn remove_from_read(&self, addr: u64) {
        self.inner.remove_from_read(addr)
    }

    fn remove_from_write(&self, addr: u64) {
        self.inner.remove_from_write(addr)
    }
}

/// Distinguishes `PerThreadShadow` instances in the thread-local cache.
static NEXT_INSTANCE_ID: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    /// Cache of this thread's shadow memory for the most recently used
    /// `PerThreadShadow` instance. Avoids the registry lock on every
    /// access; the instance id guards against a stale entry from a
    /// previous (dropped) instance.
    static LOCAL_SHADOW: RefCell<Option<(usize, Arc<ShadowMemory>)>> = const { RefCell::new(None) };
}

/// One independent shadow memory per thread.
///
/// Threads register lazily on first access; registration takes the
/// registry lock once per thread, every later access hits the
/// thread-local cache. The registry retains each thread's tables after
/// the thread exits, so an out-of-band merge at region teardown still
/// sees every thread's history.
pub struct PerThreadShadow {
    id: usize,
    config: ShadowConfig,
    registry: RwLock<FxHashMap<ThreadId, Arc<ShadowMemory>>>,
}

impl PerThreadShadow {
    pub fn new(config: &ShadowConfig) -> Result<Self> {
        config.validate()?;

        let capacity = config.expected_threads.unwrap_or_else(num_cpus::get);

        Ok(Self {
            id: NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed),
            config: config.clone(),
            registry: RwLock::new(FxHashMap::with_capacity_and_hasher(
                capacity,
                Default::default(),
            )),
        })
    }

    /// This thread's shadow memory, creating and registering it on first
    /// access.
    pub fn local(&self) -> Arc<ShadowMemory> {
        LOCAL_SHADOW.with(|cell| {
            let mut cached = cell.borrow_mut();

            if let Some((id, memory)) = cached.as_ref() {
                if *id == self.id {
                    return Arc::clone(memory);
                }
            }

            let memory = self.register_current_thread();
            *cached = Some((self.id, Arc::clone(&memory)));
            memory
        })
    }

    /// Number of threads that have touched this instance.
    pub fn thread_count(&self) -> usize {
        self.registry.read().len()
    }

    /// All per-thread shadow memories, for out-of-band cross-thread
    /// hazard analysis.
    pub fn snapshot(&self) -> Vec<(ThreadId, Arc<ShadowMemory>)> {
        self.registry
            .read()
            .iter()
            .map(|(tid, memory)| (*tid, Arc::clone(memory)))
            .collect()
    }

    /// Reset every registered thread's histories.
    pub fn clear_all(&self) {
        for (_, memory) in self.registry.read().iter() {
            memory.clear();
        }
    }

    fn register_current_thread(&self) -> Arc<ShadowMemory> {
        let tid = thread::current().id();

        if let Some(memory) = self.registry.read().get(&tid) {
            return Arc::clone(memory);
        }

        let mut registry = self.registry.write();
        let memory = registry.entry(tid).or_insert_with(|| {
            // Geometry was validated in `new`; table construction cannot
            // fail after that.
            Arc::new(
                ShadowMemory::new(&self.config).expect("geometry validated at construction"),
            )
        });

        Arc::clone(memory)
    }
}

impl Shadow for PerThreadShadow {
    fn test_in_read(&self, addr: u64) -> Option<SigElement> {
        self.local().test_in_read(addr)
    }

    fn test_in_write(&self, addr: u64) -> Option<SigElement> {
        self.local().test_in_write(addr)
    }

    fn insert_to_read(&self, addr: u64, value: SigElement) -> Option<SigElement> {
        self.local().insert_to_read(addr, value)
    }

    fn insert_to_write(&self, addr: u64, value: SigElement) -> Option<SigElement> {
        self.local().insert_to_write(addr, value)
    }

    fn update_in_read(&self, addr: u64, value: SigElement) {
        self.local().update_in_read(addr, value)
    }

    fn update_in_write(&self, addr: u64, value: SigElement) {
        self.local().update_in_write(addr, value)
    }

    fn remove_from_read(&self, addr: u64) {
        self.local().remove_from_read(addr)
    }

    fn remove_from_write(&self, addr: u64) {
        self.local().remove_from_write(addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ShadowConfig {
        ShadowConfig {
            slots: 1 << 10,
            ..Default::default()
        }
    }

    #[test]
    fn test_shared_handles_alias_one_memory() {
        let shadow = SharedShadow::new(&config()).unwrap();
        let handle = shadow.clone();

        shadow.insert_to_write(0x1000, 3);
        assert_eq!(handle.test_in_write(0x1000), Some(3));
    }

    #[test]
    fn test_per_thread_registers_lazily() {
        let shadow = PerThreadShadow::new(&config()).unwrap();
        assert_eq!(shadow.thread_count(), 0);

        shadow.insert_to_read(0x1000, 1);
        assert_eq!(shadow.thread_count(), 1);
        assert_eq!(shadow.test_in_read(0x1000), Some(1));
    }

    #[test]
    fn test_per_thread_histories_are_independent() {
        let shadow = Arc::new(PerThreadShadow::new(&config()).unwrap());
        shadow.insert_to_write(0x1000, 7);

        let worker = {
            let shadow = Arc::clone(&shadow);
            thread::spawn(move || {
                // Another thread must not see this thread's history.
                assert_eq!(shadow.test_in_write(0x1000), None);
                shadow.insert_to_write(0x1000, 8);
            })
        };
        worker.join().unwrap();

        assert_eq!(shadow.test_in_write(0x1000), Some(7));
        assert_eq!(shadow.thread_count(), 2);

        // Both histories remain visible for out-of-band merging.
        let values: Vec<Option<u64>> = shadow
            .snapshot()
            .iter()
            .map(|(_, memory)| memory.test_in_write(0x1000))
            .collect();
        assert!(values.contains(&Some(7)));
        assert!(values.contains(&Some(8)));

        // Region reset wipes every registered thread's history.
        shadow.clear_all();
        assert_eq!(shadow.test_in_write(0x1000), None);
        assert!(shadow
            .snapshot()
            .iter()
            .all(|(_, memory)| memory.test_in_write(0x1000).is_none()));
    }

    #[test]
    fn test_per_thread_cache_survives_reuse() {
        let shadow = PerThreadShadow::new(&config()).unwrap();

        shadow.insert_to_read(0x1000, 1);
        shadow.insert_to_read(0x2000, 2);
        assert_eq!(shadow.thread_count(), 1);

        // A second instance on the same thread gets its own tables.
        let other = PerThreadShadow::new(&config()).unwrap();
        assert_eq!(other.test_in_read(0x1000), None);
        assert_eq!(shadow.test_in_read(0x1000), Some(1));
    }
}
