//! Process-scoped simulated-time hook.
//!
//! RTL simulation libraries resolve `$time` through a free function, so the
//! active target publishes its cycle counter here before the back-end
//! library is first touched, and clears it at teardown. With no target
//! installed the clock reads zero.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::Weak;

/// Nominal clock period used to render cycles as nanoseconds.
const NS_PER_CYCLE: f64 = 10.0;

static ACTIVE_CPU: Mutex<Option<Weak<AtomicU64>>> = Mutex::new(None);

/// Publish `cycles` as the active target's clock.
pub fn install(cycles: &Arc<AtomicU64>) {
    *ACTIVE_CPU.lock().unwrap() = Some(Arc::downgrade(cycles));
}

/// Withdraw the active target's clock.
pub fn clear() {
    *ACTIVE_CPU.lock().unwrap() = None;
}

/// Current simulated time in nanoseconds since cold reset; zero when no
/// target is installed (or the installed one has been torn down).
pub fn time_stamp() -> f64 {
    let guard = ACTIVE_CPU.lock().unwrap();
    match guard.as_ref().and_then(Weak::upgrade) {
        Some(cycles) => cycles.load(Ordering::Relaxed) as f64 * NS_PER_CYCLE,
        None => 0.0,
    }
}
