//! Matchpoint flows: Z/z packets, the software-breakpoint fallback, and
//! memory coherence while traps are armed.

mod common;

use common::reply_frames;
use common::run_session;
use common::Script;

use riscv_gdbserver::arch;
use riscv_gdbserver::target::Target;
use riscv_gdbserver::targets::GdbSim;
use riscv_gdbserver::trace::TraceFlags;

/// Three `addi x1, x1, 1` instructions.
fn target_with_countup() -> GdbSim {
    let mut target = GdbSim::new(&TraceFlags::empty());
    for i in 0..3u32 {
        target
            .write_memory(i * 4, &0x0010_8093u32.to_le_bytes())
            .unwrap();
    }
    target
}

#[test]
fn breakpoint_hides_trap_and_stops_continue() {
    let mut target = target_with_countup();

    let script = Script::new()
        .packet("qSupported:swbreak+;multiprocess+")
        .ack()
        .packet("QStartNoAckMode")
        .ack()
        .packet("Z0,8,4")
        .packet("m8,4")
        .packet("c")
        .packet("z0,8,4")
        .packet("m8,4")
        .packet("D");
    let (_, sent) = run_session(&mut target, script);

    let frames = reply_frames(&sent);
    assert_eq!(frames[2], "OK", "insert failed: {frames:?}");
    // Reads while the trap is armed see the original instruction.
    assert_eq!(frames[3], "93801000");
    // Two instructions run, then the breakpoint.
    assert!(frames[4].contains("T05swbreak:;"), "got: {}", frames[4]);
    assert!(frames[4].contains("thread:p1.1;"), "got: {}", frames[4]);
    assert_eq!(frames[5], "OK");
    assert_eq!(frames[6], "93801000");

    assert_eq!(target.read_register(arch::PC_REGNUM).unwrap(), 8);
    assert_eq!(target.read_register(1).unwrap(), 2);
}

#[test]
fn reinsert_and_stray_remove_both_succeed() {
    let mut target = target_with_countup();

    let script = Script::new()
        .packet("QStartNoAckMode")
        .ack()
        .packet("Z0,4,4")
        .packet("Z0,4,4")
        .packet("z0,4,4")
        .packet("z0,4,4")
        .packet("D");
    let (_, sent) = run_session(&mut target, script);

    let frames = reply_frames(&sent);
    assert_eq!(&frames[1..5], &["OK", "OK", "OK", "OK"]);
}

#[test]
fn hardware_breakpoint_is_reported_unsupported() {
    let mut target = target_with_countup();

    let script = Script::new()
        .packet("QStartNoAckMode")
        .ack()
        .packet("Z1,4,4")
        .packet("D");
    let (_, sent) = run_session(&mut target, script);

    // gdbsim has no debug unit: empty reply, GDB falls back on its own.
    assert_eq!(reply_frames(&sent)[1], "");
}

#[test]
fn write_over_armed_breakpoint_keeps_it_armed() {
    let mut target = target_with_countup();

    // Rewrite the patched instruction while the breakpoint is set; the new
    // bytes must surface after removal, and the run must still stop.
    let script = Script::new()
        .packet("QStartNoAckMode")
        .ack()
        .packet("Z0,8,4")
        .packet("M8,4:93001000") // addi x1, x0, 1 over the third slot
        .packet("c")
        .packet("z0,8,4")
        .packet("m8,4")
        .packet("D");
    let (_, sent) = run_session(&mut target, script);

    let frames = reply_frames(&sent);
    assert_eq!(frames[2], "OK");
    assert!(frames[3].starts_with("S05") || frames[3].starts_with("T05"));
    assert_eq!(frames[4], "OK");
    assert_eq!(frames[5], "93001000");
    assert_eq!(target.read_register(arch::PC_REGNUM).unwrap(), 8);
}

#[test]
fn detach_restores_patched_memory() {
    let mut target = target_with_countup();

    let script = Script::new()
        .packet("QStartNoAckMode")
        .ack()
        .packet("Z0,0,4")
        .packet("D");
    let (_, sent) = run_session(&mut target, script);
    assert_eq!(reply_frames(&sent)[1], "OK");

    // After detach the trap is gone from raw memory.
    let mut raw = [0u8; 4];
    target.read_memory(0, &mut raw).unwrap();
    assert_eq!(u32::from_le_bytes(raw), 0x0010_8093);
}

#[test]
fn compressed_kind_plants_c_ebreak() {
    let mut target = target_with_countup();

    let script = Script::new()
        .packet("QStartNoAckMode")
        .ack()
        .packet("Z0,4,2")
        .packet("D");
    let (_, sent) = run_session(&mut target, script);
    assert_eq!(reply_frames(&sent)[1], "OK");

    let mut raw = [0u8; 2];
    target.read_memory(4, &mut raw).unwrap();
    assert_eq!(u16::from_le_bytes(raw), arch::C_EBREAK);
}
