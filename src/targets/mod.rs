//! CPU back-end registry.
//!
//! One bundled back-end today (`gdbsim`); RTL models plug in here by adding
//! an arm to [`create`].

mod gdbsim;
pub mod timestamp;

pub use gdbsim::GdbSim;

use crate::target::Target;
use crate::trace::TraceFlags;

/// Instantiate a back-end from a core name, matched case-insensitively.
/// Returns `None` for an unrecognised core.
///
/// Construction also installs the new target's clock into the process-wide
/// [`timestamp`] hook, which must happen before any back-end library code
/// runs.
pub fn create(name: &str, flags: &TraceFlags) -> Option<Box<dyn Target>> {
    if name.eq_ignore_ascii_case("gdbsim") {
        let target = GdbSim::new(flags);
        timestamp::install(target.clock());
        return Some(Box::new(target));
    }

    None
}
