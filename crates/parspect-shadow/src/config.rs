//! Configuration Module - Shadow Table Tuning Parameters
//!
//! Manages all configuration parameters for the shadow-memory runtime.
//! Geometry is a trade between memory footprint and false-positive rate:
//! more slots and more hash functions both lower the collision probability,
//! at the cost of memory and per-access work.

use std::str::FromStr;

/// Synchronization policy for a deployment
///
/// Chosen once at construction; see the `sync` module for the two wrappers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// One shadow memory shared by all threads, slot-level atomics
    Shared,
    /// One independent shadow memory per thread, merged out of band
    PerThread,
}

impl FromStr for SyncMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            _ if s.eq_ignore_ascii_case("shared") => Ok(SyncMode::Shared),
            _ if s.eq_ignore_ascii_case("per-thread") || s.eq_ignore_ascii_case("per_thread") => {
                Ok(SyncMode::PerThread)
            },
            _ => Err(ConfigError::InvalidMode(s.to_string())),
        }
    }
}

/// Main configuration for the shadow-memory runtime
///
/// Stores all parameters affecting table geometry and runtime behavior.
/// Most parameters have sensible defaults.
///
/// # Examples
///
/// ```rust
/// use parspect_shadow::{ShadowConfig, SyncMode};
///
/// // Use default configuration
/// let config = ShadowConfig::default();
///
/// // Custom configuration for a small working set
/// let config = ShadowConfig {
///     slots: 1 << 16,
///     hashes: 3,
///     mode: SyncMode::PerThread,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct ShadowConfig {
    /// Payload width per slot, in bits
    ///
    /// Access identifiers are truncated to this many bits when stored.
    /// Valid range: 1..=63 (bit 63 of each slot word is the occupancy
    /// indicator).
    ///
    /// Default: 32
    pub slot_bits: u32,

    /// Number of slots in each signature table
    ///
    /// Fixed at construction, never resized. Must be a power of two so
    /// index reduction is a mask.
    ///
    /// Memory cost is `2 * slots * 8` bytes per shadow memory (one read
    /// table, one write table).
    ///
    /// Default: 1 << 20
    pub slots: usize,

    /// Number of hash functions applied per address
    ///
    /// An address occupies this many slots in each table. More hash
    /// functions lower the false-positive rate while the table is sparse
    /// but fill it faster.
    ///
    /// Recommended: 1-4
    ///
    /// Default: 2
    pub hashes: u32,

    /// Synchronization policy
    ///
    /// Default: Shared
    pub mode: SyncMode,

    /// Hint for how many threads will carry per-thread shadow memories
    ///
    /// Sizes the per-thread registry up front. If None, auto-detects from
    /// CPU count.
    ///
    /// Default: Auto-detect
    pub expected_threads: Option<usize>,

    /// Enable access statistics collection
    ///
    /// Counts tests, hits, inserts, updates and removals per access type.
    /// Default: true
    pub stats_enabled: bool,

    /// Enable verbose teardown output
    ///
    /// Logs a stats snapshot when a monitor shuts down.
    /// Default: false
    pub verbose: bool,
}

impl Default for ShadowConfig {
    /// Default configuration
    ///
    /// Sized for a ~1M-address working set at a modest false-positive rate.
    fn default() -> Self {
        ShadowConfig {
            slot_bits: 32,
            slots: 1 << 20,
            hashes: 2,
            mode: SyncMode::Shared,
            expected_threads: Some(num_cpus::get()),
            stats_enabled: true,
            verbose: false,
        }
    }
}

impl ShadowConfig {
    /// Validate configuration
    ///
    /// Checks if all values are in valid ranges.
    /// Returns error if configuration is invalid.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use parspect_shadow::ShadowConfig;
    ///
    /// let config = ShadowConfig {
    ///     hashes: 0, // Invalid!
    ///     ..Default::default()
    /// };
    ///
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.slots == 0 {
            return Err(ConfigError::InvalidSlotCount(
                "slots must be > 0".to_string(),
            ));
        }

        if !self.slots.is_power_of_two() {
            return Err(ConfigError::InvalidSlotCount(format!(
                "slots must be a power of two, got {}",
                self.slots
            )));
        }

        if self.hashes == 0 {
            return Err(ConfigError::InvalidHashCount(
                "hashes must be > 0".to_string(),
            ));
        }

        if self.slot_bits == 0 || self.slot_bits > 63 {
            return Err(ConfigError::InvalidSlotBits(format!(
                "slot_bits must be in 1..=63, got {}",
                self.slot_bits
            )));
        }

        if let Some(threads) = self.expected_threads {
            if threads == 0 {
                return Err(ConfigError::InvalidThreadCount(
                    "expected_threads must be > 0".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Build configuration from environment variables
    ///
    /// Overrides defaults with environment variables:
    /// - PARSPECT_SLOT_BITS
    /// - PARSPECT_SLOTS
    /// - PARSPECT_HASHES
    /// - PARSPECT_MODE ("shared" or "per-thread")
    /// - PARSPECT_STATS
    /// - PARSPECT_VERBOSE
    ///
    /// # Examples
    ///
    /// ```bash
    /// export PARSPECT_SLOTS=16777216
    /// export PARSPECT_HASHES=3
    /// export PARSPECT_MODE=per-thread
    /// ```
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("PARSPECT_SLOT_BITS") {
            if let Ok(bits) = val.parse::<u32>() {
                config.slot_bits = bits;
            }
        }

        if let Ok(val) = std::env::var("PARSPECT_SLOTS") {
            if let Ok(slots) = val.parse::<usize>() {
                config.slots = slots;
            }
        }

        if let Ok(val) = std::env::var("PARSPECT_HASHES") {
            if let Ok(hashes) = val.parse::<u32>() {
                config.hashes = hashes;
            }
        }

        if let Ok(val) = std::env::var("PARSPECT_MODE") {
            if let Ok(mode) = val.parse::<SyncMode>() {
                config.mode = mode;
            }
        }

        if let Ok(val) = std::env::var("PARSPECT_STATS") {
            config.stats_enabled = val == "1" || val.eq_ignore_ascii_case("true");
        }

        if let Ok(val) = std::env::var("PARSPECT_VERBOSE") {
            config.verbose = val == "1" || val.eq_ignore_ascii_case("true");
        }

        config
    }

    /// Memory footprint of one shadow memory built from this configuration
    ///
    /// Two tables of `slots` 8-byte words each.
    pub fn table_bytes(&self) -> usize {
        2 * self.slots * std::mem::size_of::<u64>()
    }
}

/// Error types for configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid slot count: {0}")]
    InvalidSlotCount(String),

    #[error("Invalid slot bits: {0}")]
    InvalidSlotBits(String),

    #[error("Invalid hash count: {0}")]
    InvalidHashCount(String),

    #[error("Invalid thread count: {0}")]
    InvalidThreadCount(String),

    #[error("Invalid sync mode: {0:?} (expected \"shared\" or \"per-thread\")")]
    InvalidMode(String),
}
