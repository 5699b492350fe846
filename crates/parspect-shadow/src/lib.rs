//! # Parspect Shadow - Probabilistic Shadow Memory for Dependency Discovery
//!
//! The runtime data structure behind Parspect's dynamic dependency
//! discovery: a fixed-size, probabilistic shadow memory that records, for
//! every observed address, the most recent read and write access to it.
//! Instrumented code calls in on every relevant load/store; the answers
//! expose read-after-write, write-after-read and write-after-write hazards
//! that a downstream graph builder turns into parallelization suggestions.
//!
//! ## Overview
//!
//! An exact per-address table is impossible at instrumented-program scale,
//! so the structure is a Bloom-filter generalization instead:
//!
//! - **Bounded memory**: two fixed tables of `slots` words each, regardless
//!   of how many distinct addresses the program touches.
//! - **O(1) operations**: every call hashes the address onto `hashes` slots
//!   and touches exactly those.
//! - **One-sided error**: "absent" is exact for never-inserted addresses;
//!   "present" can be a false positive when addresses collide. Collisions
//!   merge destructively - last writer wins per slot.
//!
//! ## Quick Start
//!
//! ```rust
//! use parspect_shadow::{Shadow, ShadowConfig, ShadowMemory};
//!
//! fn main() -> Result<(), parspect_shadow::ShadowError> {
//!     let config = ShadowConfig {
//!         slots: 1 << 16,
//!         ..Default::default()
//!     };
//!     let shadow = ShadowMemory::new(&config)?;
//!
//!     // A write at iteration 1, then a read at iteration 2:
//!     shadow.insert_to_write(0x7FFF_1000, 1);
//!     if let Some(writer) = shadow.test_in_write(0x7FFF_1000) {
//!         // read-after-write hazard against access element `writer`
//!         assert_eq!(writer, 1);
//!     }
//!     shadow.insert_to_read(0x7FFF_1000, 2);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                 Instrumented Program                      │
//! │   load x ──► test_in_write ──► insert_to_read            │
//! │   store x ─► test_in_read  ──► insert_to_write           │
//! └──────────────────────────┬───────────────────────────────┘
//!                            │  Shadow trait
//!              ┌─────────────┴──────────────┐
//!              │ SharedShadow / PerThread   │   sync policy
//!              └─────────────┬──────────────┘
//!                            ▼
//!                      ShadowMemory
//!                ┌──────────┴──────────┐
//!                ▼                     ▼
//!           Signature (reads)    Signature (writes)
//!           k hashed slots       k hashed slots
//! ```
//!
//! ## Concurrency
//!
//! Slot words are atomics, so a `ShadowMemory` is `Send + Sync` as-is.
//! Deployments choose between one shared structure (slot-level atomicity,
//! membership may read stale values) and fully independent per-thread
//! structures merged out of band - see the [`sync`] module.
//!
//! ## Modules
//!
//! - [`config`]: table geometry, sync policy and validation
//! - [`error`]: error types for all shadow operations
//! - [`signature`]: the probabilistic slot table
//! - [`shadow`]: read/write-scoped shadow memory and the `Shadow` trait
//! - [`sync`]: shared and per-thread deployment policies
//! - [`stats`]: access counters and serializable snapshots

pub mod config;
pub mod error;
pub mod shadow;
pub mod signature;
pub mod stats;
pub mod sync;

pub use config::{ShadowConfig, SyncMode};
pub use error::{Result, ShadowError};
pub use shadow::{Shadow, ShadowMemory};
pub use signature::{SigElement, Signature};
pub use stats::{AccessKind, ShadowStats, StatsSnapshot};
pub use sync::{PerThreadShadow, SharedShadow};

/// Crate version string from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build a shadow memory with default configuration
///
/// # Examples
///
/// ```rust
/// let shadow = parspect_shadow::init()?;
/// # Ok::<(), parspect_shadow::ShadowError>(())
/// ```
pub fn init() -> Result<ShadowMemory> {
    ShadowMemory::new(&ShadowConfig::default())
}

/// Build a shadow memory with custom configuration
///
/// # Examples
///
/// ```rust
/// use parspect_shadow::ShadowConfig;
///
/// let config = ShadowConfig {
///     slots: 1 << 18,
///     hashes: 3,
///     ..Default::default()
/// };
/// let shadow = parspect_shadow::init_with_config(&config)?;
/// # Ok::<(), parspect_shadow::ShadowError>(())
/// ```
pub fn init_with_config(config: &ShadowConfig) -> Result<ShadowMemory> {
    ShadowMemory::new(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_default() {
        assert!(init().is_ok());
    }

    #[test]
    fn test_init_rejects_bad_geometry() {
        let config = ShadowConfig {
            hashes: 0,
            ..Default::default()
        };
        assert!(matches!(
            init_with_config(&config),
            Err(ShadowError::Configuration(_))
        ));
    }

    #[test]
    fn test_version_not_empty() {
        assert!(!VERSION.is_empty());
    }
}
