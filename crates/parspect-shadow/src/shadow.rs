//! Shadow Memory - Read/Write-Scoped Access History
//!
//! `ShadowMemory` owns exactly two signature tables - one tracking reads,
//! one tracking writes - built with identical geometry, and forwards each
//! read/write-scoped operation verbatim to the corresponding table.
//!
//! It deliberately introduces no cross-talk between the two tables. Hazard
//! detection ("does this write collide with a prior read?") is the caller's
//! job: test the opposite access type, then insert into your own. The
//! `parspect-runtime` monitor is that caller for instrumented binaries.

use crate::config::ShadowConfig;
use crate::error::Result;
use crate::signature::{SigElement, Signature};

/// The read/write-scoped access-history interface.
///
/// Implemented by `ShadowMemory` directly and by both synchronization
/// wrappers in the `sync` module, so hazard-correlating callers are
/// agnostic to the deployment's concurrency policy.
pub trait Shadow {
    /// Test the read history for `addr`, without side effects.
    fn test_in_read(&self, addr: u64) -> Option<SigElement>;

    /// Test the write history for `addr`, without side effects.
    fn test_in_write(&self, addr: u64) -> Option<SigElement>;

    /// Record a read of `addr`, returning the canonical slot's previous
    /// element.
    fn insert_to_read(&self, addr: u64, value: SigElement) -> Option<SigElement>;

    /// Record a write of `addr`, returning the canonical slot's previous
    /// element.
    fn insert_to_write(&self, addr: u64, value: SigElement) -> Option<SigElement>;

    /// Refresh the element recorded in the read history for `addr`.
    fn update_in_read(&self, addr: u64, value: SigElement);

    /// Refresh the element recorded in the write history for `addr`.
    fn update_in_write(&self, addr: u64, value: SigElement);

    /// Permissively remove `addr` from the read history.
    fn remove_from_read(&self, addr: u64);

    /// Permissively remove `addr` from the write history.
    fn remove_from_write(&self, addr: u64);
}

/// Shadow memory for one monitored address range.
///
/// A single owning value: both signature tables live and die with it.
/// Safe to share across threads as-is - every slot operation is atomic -
/// which is exactly what the shared deployment policy does.
pub struct ShadowMemory {
    sig_read: Signature,
    sig_write: Signature,
}

impl ShadowMemory {
    /// Build both signature tables from one validated configuration.
    pub fn new(config: &ShadowConfig) -> Result<Self> {
        Ok(Self {
            sig_read: Signature::new(config)?,
            sig_write: Signature::new(config)?,
        })
    }

    /// The read-history table.
    pub fn read_signature(&self) -> &Signature {
        &self.sig_read
    }

    /// The write-history table.
    pub fn write_signature(&self) -> &Signature {
        &self.sig_write
    }

    /// Reset both histories.
    pub fn clear(&self) {
        self.sig_read.clear();
        self.sig_write.clear();
    }
}

impl Shadow for ShadowMemory {
    fn test_in_read(&self, addr: u64) -> Option<SigElement> {
        self.sig_read.membership_check(addr)
    }

    fn test_in_write(&self, addr: u64) -> Option<SigElement> {
        self.sig_write.membership_check(addr)
    }

    fn insert_to_read(&self, addr: u64, value: SigElement) -> Option<SigElement> {
        self.sig_read.insert(addr, value)
    }

    fn insert_to_write(&self, addr: u64, value: SigElement) -> Option<SigElement> {
        self.sig_write.insert(addr, value)
    }

    fn update_in_read(&self, addr: u64, value: SigElement) {
        self.sig_read.update(addr, value)
    }

    fn update_in_write(&self, addr: u64, value: SigElement) {
        self.sig_write.update(addr, value)
    }

    fn remove_from_read(&self, addr: u64) {
        self.sig_read.remove(addr)
    }

    fn remove_from_write(&self, addr: u64) {
        self.sig_write.remove(addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shadow() -> ShadowMemory {
        let config = ShadowConfig {
            slots: 1 << 10,
            ..Default::default()
        };
        ShadowMemory::new(&config).unwrap()
    }

    #[test]
    fn test_read_write_independence() {
        let sm = shadow();

        sm.insert_to_write(0x1000, 5);
        assert_eq!(sm.test_in_read(0x1000), None);
        assert_eq!(sm.test_in_write(0x1000), Some(5));

        sm.insert_to_read(0x2000, 9);
        assert_eq!(sm.test_in_write(0x2000), None);
        assert_eq!(sm.test_in_read(0x2000), Some(9));
    }

    #[test]
    fn test_forwarding_semantics() {
        let sm = shadow();

        assert_eq!(sm.insert_to_read(0x1000, 1), None);
        assert_eq!(sm.insert_to_read(0x1000, 2), Some(1));
        sm.update_in_read(0x1000, 3);
        assert_eq!(sm.test_in_read(0x1000), Some(3));
        sm.remove_from_read(0x1000);
        assert_eq!(sm.test_in_read(0x1000), None);
    }

    #[test]
    fn test_clear_resets_both_sides() {
        let sm = shadow();

        sm.insert_to_read(0x1000, 1);
        sm.insert_to_write(0x1000, 2);
        sm.clear();

        assert_eq!(sm.test_in_read(0x1000), None);
        assert_eq!(sm.test_in_write(0x1000), None);
    }
}
