//! Rendering of [`StopReason`] into RSP stop-reply packets.

use crate::protocol::ResponseWriter;
use crate::stub::ProtocolFeatures;
use crate::target::StopReason;

fn write_thread_suffix(res: &mut ResponseWriter, features: ProtocolFeatures) {
    if features.contains(ProtocolFeatures::CLIENT_MULTIPROCESS) {
        res.write_str("thread:p1.1;");
    } else {
        res.write_str("thread:1;");
    }
}

/// Format the stop reply for `reason`.
///
/// `swbreak`/`hwbreak` stop-reason annotations are only legal once the
/// client has advertised support for them in `qSupported`; otherwise those
/// stops degrade to a plain `S05`.
pub fn write_stop_reply(res: &mut ResponseWriter, reason: StopReason, features: ProtocolFeatures) {
    match reason {
        StopReason::Stepped | StopReason::Interrupted => {
            res.write_str("T05");
            write_thread_suffix(res, features);
        }
        StopReason::SwBreak => {
            if features.contains(ProtocolFeatures::CLIENT_SWBREAK) {
                res.write_str("T05swbreak:;");
                write_thread_suffix(res, features);
            } else {
                res.write_str("S05");
            }
        }
        StopReason::HwBreak => {
            if features.contains(ProtocolFeatures::CLIENT_HWBREAK) {
                res.write_str("T05hwbreak:;");
                write_thread_suffix(res, features);
            } else {
                res.write_str("S05");
            }
        }
        StopReason::Watch(addr) => {
            res.write_str("T05watch:");
            res.write_num(addr as u64);
            res.write(b';');
            write_thread_suffix(res, features);
        }
        // The core is halted at an instruction boundary; the debugger may
        // simply re-issue the resume.
        StopReason::Timeout => res.write_str("T05"),
        StopReason::Exited(code) => {
            res.write(b'W');
            res.write_hex(code);
        }
        StopReason::Signalled(signo) => {
            res.write(b'X');
            res.write_hex(signo);
        }
        // Syscall stops are turned into File-I/O requests by the engine and
        // never reach the generic formatter.
        StopReason::Syscall => res.write_str("E01"),
    }
}
