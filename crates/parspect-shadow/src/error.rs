//! Error Module - Shadow Memory Error Types
//!
//! Defines all error types used by the shadow-memory runtime.
//!
//! The taxonomy is deliberately narrow: the structure is purely
//! computational, so almost everything that can go wrong goes wrong at
//! construction time. An absent result from a membership query is *not* an
//! error, and neither is a collision-induced false positive.

use thiserror::Error;

use crate::config::ConfigError;

/// Main error type for all shadow-memory operations
///
/// # Examples
///
/// ```rust
/// use parspect_shadow::{ShadowConfig, ShadowMemory, ShadowError};
///
/// let config = ShadowConfig {
///     slots: 0, // Invalid!
///     ..Default::default()
/// };
///
/// match ShadowMemory::new(&config) {
///     Err(ShadowError::Configuration(e)) => eprintln!("bad config: {}", e),
///     _ => unreachable!(),
/// }
/// ```
#[derive(Debug, Error)]
pub enum ShadowError {
    /// Invalid configuration detected at construction
    ///
    /// **When returned:** Table geometry cannot produce a functional
    /// structure (zero slots, zero hash functions, payload width out of
    /// range).
    ///
    /// **Recovery strategy:** None - fix the configuration and rebuild.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Internal error - indicates a bug in the shadow runtime
    ///
    /// **When returned:** Invariant violation or unexpected state.
    ///
    /// **Recovery strategy:** Cannot recover - report with full context.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ShadowError {
    /// Check if this error indicates a bug in the code
    pub fn is_bug(&self) -> bool {
        matches!(self, ShadowError::Internal(_))
    }
}

/// Result type alias for shadow-memory operations
pub type Result<T> = std::result::Result<T, ShadowError>;
