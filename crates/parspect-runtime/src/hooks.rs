//! C ABI - Entry Points for Instrumented Binaries
//!
//! The instrumentation pass injects calls to these functions around every
//! relevant load/store. They are thin shims over a process-global
//! [`Monitor`]: no Rust types cross the boundary, nothing unwinds, and
//! every hook degrades to a no-op when the runtime is not initialized.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

use parspect_shadow::ShadowConfig;

use crate::monitor::{Hazard, Monitor};

static RUNTIME: OnceLock<Monitor> = OnceLock::new();
static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// C-side hazard consumer: `(address, kind code, previous, current)`.
///
/// Kind codes: 0 = read-after-write, 1 = write-after-read,
/// 2 = write-after-write.
pub type RawHazardSink = extern "C" fn(addr: u64, kind: u32, previous: u64, current: u64);

/// Initialize the shadow runtime.
///
/// Geometry arguments override `PARSPECT_*` environment configuration;
/// pass 0 for any of them to keep the configured value. Safe to call more
/// than once; later calls are no-ops reporting the existing state.
#[no_mangle]
pub extern "C" fn parspect_init(slot_bits: u32, slots: u64, hashes: u32) -> bool {
    if INITIALIZED.load(Ordering::SeqCst) {
        return true;
    }

    let mut config = ShadowConfig::from_env();
    if slot_bits != 0 {
        config.slot_bits = slot_bits;
    }
    if slots != 0 {
        config.slots = slots as usize;
    }
    if hashes != 0 {
        config.hashes = hashes;
    }

    match Monitor::new(&config) {
        Ok(monitor) => {
            let _ = RUNTIME.set(monitor);
            INITIALIZED.store(true, Ordering::SeqCst);
            true
        },
        Err(e) => {
            eprintln!("Failed to initialize parspect runtime: {:?}", e);
            false
        },
    }
}

/// Record a read access. `access_id` 0 requests a per-thread sequence
/// number.
#[no_mangle]
pub extern "C" fn parspect_read(addr: u64, access_id: u64) {
    if let Some(monitor) = RUNTIME.get() {
        monitor.on_read(addr, access_id);
    }
}

/// Record a write access. `access_id` 0 requests a per-thread sequence
/// number.
#[no_mangle]
pub extern "C" fn parspect_write(addr: u64, access_id: u64) {
    if let Some(monitor) = RUNTIME.get() {
        monitor.on_write(addr, access_id);
    }
}

/// Forget an address that left scope (free, stack frame exit).
#[no_mangle]
pub extern "C" fn parspect_dealloc(addr: u64) {
    if let Some(monitor) = RUNTIME.get() {
        monitor.on_dealloc(addr);
    }
}

/// Register the hazard consumer. Only the first registration wins;
/// returns false if a sink was already registered or the runtime is not
/// initialized.
#[no_mangle]
pub extern "C" fn parspect_set_hazard_sink(sink: RawHazardSink) -> bool {
    match RUNTIME.get() {
        Some(monitor) => monitor.set_sink(Box::new(move |hazard: &Hazard| {
            sink(
                hazard.addr,
                hazard.kind.code(),
                hazard.previous,
                hazard.current,
            )
        })),
        None => false,
    }
}

/// Log the end-of-execution summary and mark the runtime stopped.
///
/// The tables themselves live until process exit; instrumented code
/// racing a shutdown still hits valid memory.
#[no_mangle]
pub extern "C" fn parspect_shutdown() {
    if let Some(monitor) = RUNTIME.get() {
        monitor.shutdown();
    }
    INITIALIZED.store(false, Ordering::SeqCst);
}
