//! Test Utilities for the Shadow-Memory Test Suite
#![allow(dead_code)] // each test binary uses a different subset
//!
//! Provides fixtures with small, deterministic table geometries so tests
//! exercise the interesting regimes (sparse tables, saturated tables,
//! forced collisions) without megabyte allocations per test.

use parspect_shadow::{ShadowConfig, ShadowMemory, SyncMode};

/// Slot count small enough to saturate in a test, large enough that
/// random addresses rarely collide.
pub const TEST_SLOTS: usize = 1 << 12;

/// Test fixture for shadow-memory operations
///
/// Provides a clean shadow memory per test plus the config that built it.
pub struct ShadowFixture {
    pub shadow: ShadowMemory,
    pub config: ShadowConfig,
}

impl ShadowFixture {
    /// Create fixture with the default test geometry
    ///
    /// **Bug this finds:** Configuration validation bugs, construction
    /// failures
    pub fn with_defaults() -> Self {
        Self::with_geometry(TEST_SLOTS, 2, 32)
    }

    /// Create fixture with explicit geometry
    pub fn with_geometry(slots: usize, hashes: u32, slot_bits: u32) -> Self {
        let config = ShadowConfig {
            slots,
            hashes,
            slot_bits,
            mode: SyncMode::Shared,
            ..Default::default()
        };

        let shadow = ShadowMemory::new(&config)
            .expect("shadow construction should succeed with valid geometry");

        Self { shadow, config }
    }

    /// Create fixture where every address collides on one slot
    ///
    /// **Bug this finds:** Code assuming collisions cannot happen
    pub fn fully_colliding() -> Self {
        Self::with_geometry(1, 1, 32)
    }
}

/// Deterministic pseudo-random address stream with a fixed seed, so
/// failures reproduce.
pub fn address_stream(count: usize) -> Vec<u64> {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let mut rng = StdRng::seed_from_u64(0x5EED);
    (0..count).map(|_| rng.gen::<u64>()).collect()
}

/// Stride-pattern addresses, the common array-walk shape.
pub fn stride_addresses(base: u64, count: usize, stride: u64) -> Vec<u64> {
    (0..count as u64).map(|i| base + i * stride).collect()
}
