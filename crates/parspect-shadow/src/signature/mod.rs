//! Signature - Probabilistic Address-to-Element Map
//!
//! A fixed-capacity map from 64-bit addresses to small access elements,
//! built as a multi-hash slot table: the counting generalization of a Bloom
//! filter that also carries a payload per slot.
//!
//! Memory is `O(slots)` regardless of how many distinct addresses are
//! observed. The price is destructive merging: every address occupies
//! `hashes` slots, slots are shared between colliding addresses, and the
//! last writer wins per slot. Membership answers are therefore one-sided -
//! "absent" is exact for addresses never inserted, "present" may be a false
//! positive.
//!
//! Slot Word Layout:
//! ```text
//! ┌───────────┬────────────────────────────────────────┐
//! │ Occupied  │            Payload                     │
//! │   63      │         slot_bits..0                   │
//! └───────────┴────────────────────────────────────────┘
//! ```
//!
//! The explicit occupancy bit makes a payload of zero storable and keeps
//! payload and occupancy in one atomic word, so concurrent writers can
//! never tear them apart.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::ShadowConfig;
use crate::error::Result;

mod hash;

use hash::Indexer;

/// Opaque access element recorded per address.
///
/// A logical clock, loop iteration id, or thread+sequence pair - the table
/// never interprets it. Truncated to `slot_bits` bits when stored.
pub type SigElement = u64;

/// Occupancy indicator, bit 63 of each slot word.
const OCCUPIED: u64 = 1 << 63;

/// Signature - fixed-capacity probabilistic map over addresses
///
/// All operations take `&self`; slots are atomic words, so a `Signature`
/// is safe to share across threads (see the `sync` module for the policy
/// wrappers).
pub struct Signature {
    /// Slot words: occupancy bit plus truncated payload
    table: Box<[AtomicU64]>,

    /// Address-to-slot-index derivation
    indexer: Indexer,

    /// Low `slot_bits` bits set
    payload_mask: u64,
}

impl Signature {
    /// Create a signature table from validated geometry.
    ///
    /// The table is the only allocation this structure ever performs.
    pub fn new(config: &ShadowConfig) -> Result<Self> {
        config.validate()?;

        let table: Vec<AtomicU64> = (0..config.slots).map(|_| AtomicU64::new(0)).collect();

        log::debug!(
            "signature table: {} slots, {} hashes, {}-bit payload ({} KiB)",
            config.slots,
            config.hashes,
            config.slot_bits,
            config.slots * 8 / 1024
        );

        Ok(Self {
            table: table.into_boxed_slice(),
            indexer: Indexer::new(config.slots, config.hashes),
            payload_mask: payload_mask(config.slot_bits),
        })
    }

    /// Number of slots in the table.
    pub fn slots(&self) -> usize {
        self.table.len()
    }

    /// Number of hash functions applied per address.
    pub fn hashes(&self) -> u32 {
        self.indexer.hashes()
    }

    /// Test whether `addr` is considered present, without side effects.
    ///
    /// Returns `None` if any of the address's slots is empty - the address
    /// was definitely never inserted (or was removed). Returns the payload
    /// at the canonical slot otherwise; colliding addresses can make this a
    /// false positive, and the payload then belongs to the last writer of
    /// that slot.
    pub fn membership_check(&self, addr: u64) -> Option<SigElement> {
        let mut canonical = 0u64;

        for (i, idx) in self.indexer.indices(addr).enumerate() {
            let word = self.table[idx].load(Ordering::Relaxed);
            if word & OCCUPIED == 0 {
                return None;
            }
            if i == 0 {
                canonical = word;
            }
        }

        Some(canonical & self.payload_mask)
    }

    /// Record `value` for `addr`, returning the canonical slot's previous
    /// payload.
    ///
    /// Writes `value` into all of the address's slots. The return value is
    /// what the canonical slot held before the overwrite (`None` if it was
    /// empty), folding test+insert into one call for the hot path. Note
    /// this inspects the canonical slot only; under a partial collision it
    /// can disagree with what `membership_check` would have reported.
    pub fn insert(&self, addr: u64, value: SigElement) -> Option<SigElement> {
        let encoded = self.encode(value);
        let mut previous = None;

        for (i, idx) in self.indexer.indices(addr).enumerate() {
            if i == 0 {
                // Swap keeps the previous-value contract exact even when
                // another thread writes the same slot concurrently.
                let old = self.table[idx].swap(encoded, Ordering::Relaxed);
                previous = self.decode(old);
            } else {
                self.table[idx].store(encoded, Ordering::Relaxed);
            }
        }

        previous
    }

    /// Overwrite the payload recorded for `addr`, unconditionally.
    ///
    /// Used when presence was already established by a prior test or
    /// insert and the caller only wants to refresh the recorded element.
    pub fn update(&self, addr: u64, value: SigElement) {
        let encoded = self.encode(value);

        for idx in self.indexer.indices(addr) {
            self.table[idx].store(encoded, Ordering::Relaxed);
        }
    }

    /// Reset all of the address's slots to empty.
    ///
    /// Removal is permissive: slots are shared between colliding addresses
    /// by design, so this may spuriously un-mark other addresses still
    /// mapped onto the same slots. Callers remove only when an address has
    /// left scope (deallocation, scope exit) and accept the imprecision.
    pub fn remove(&self, addr: u64) {
        for idx in self.indexer.indices(addr) {
            self.table[idx].store(0, Ordering::Relaxed);
        }
    }

    /// Reset every slot in the table.
    pub fn clear(&self) {
        for word in self.table.iter() {
            word.store(0, Ordering::Relaxed);
        }
    }

    /// Count occupied slots.
    pub fn occupied_slots(&self) -> usize {
        self.table
            .iter()
            .filter(|word| word.load(Ordering::Relaxed) & OCCUPIED != 0)
            .count()
    }

    /// Occupied fraction of the table (0.0 - 1.0).
    ///
    /// A table past ~0.5 fill produces mostly false positives; callers
    /// watching this should grow `slots` for the next run.
    pub fn fill_ratio(&self) -> f32 {
        self.occupied_slots() as f32 / self.table.len() as f32
    }

    fn encode(&self, value: SigElement) -> u64 {
        OCCUPIED | (value & self.payload_mask)
    }

    fn decode(&self, word: u64) -> Option<SigElement> {
        if word & OCCUPIED == 0 {
            None
        } else {
            Some(word & self.payload_mask)
        }
    }
}

fn payload_mask(slot_bits: u32) -> u64 {
    (1u64 << slot_bits) - 1
}
