//! Diagnostic trace categories selectable from the command line.

use bitflags::bitflags;

bitflags! {
    /// The `--trace <flag>` categories. `SILENT` is folded in here because it
    /// is configured through the same option.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TraceFlags: u8 {
        /// Trace RSP packets.
        const RSP = 1 << 0;
        /// Trace connection handling.
        const CONN = 1 << 1;
        /// Trace breakpoint handling.
        const BREAK = 1 << 2;
        /// Generate a value-change dump (only meaningful to RTL back-ends).
        const VCD = 1 << 3;
        /// Minimise informative messages.
        const SILENT = 1 << 4;
    }
}

impl TraceFlags {
    /// Parse one `--trace` argument.
    pub fn from_flag_name(name: &str) -> Option<TraceFlags> {
        Some(match name {
            "rsp" => TraceFlags::RSP,
            "conn" => TraceFlags::CONN,
            "break" => TraceFlags::BREAK,
            "vcd" => TraceFlags::VCD,
            "silent" => TraceFlags::SILENT,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_flags_parse() {
        assert_eq!(TraceFlags::from_flag_name("rsp"), Some(TraceFlags::RSP));
        assert_eq!(
            TraceFlags::from_flag_name("silent"),
            Some(TraceFlags::SILENT)
        );
        assert_eq!(TraceFlags::from_flag_name("bogus"), None);
    }
}
