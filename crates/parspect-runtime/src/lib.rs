//! Parspect Runtime Library
//!
//! Provides runtime support for instrumented programs including:
//! - C-ABI access hooks (via parspect-shadow)
//! - Runtime initialization and hazard delivery

mod hooks;
pub mod monitor;

pub use hooks::*;
pub use monitor::{Hazard, HazardKind, HazardSink, Monitor};
