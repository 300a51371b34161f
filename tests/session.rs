//! End-to-end sessions over the in-memory connection.

mod common;

use common::reply_frames;
use common::run_session;
use common::run_session_with;
use common::Script;

use riscv_gdbserver::arch;
use riscv_gdbserver::stub::DisconnectReason;
use riscv_gdbserver::stub::KillBehaviour;
use riscv_gdbserver::target::Target;
use riscv_gdbserver::targets::GdbSim;
use riscv_gdbserver::trace::TraceFlags;

fn fresh_target() -> GdbSim {
    GdbSim::new(&TraceFlags::empty())
}

#[test]
fn halt_reason_before_any_run_is_s05() {
    let mut target = fresh_target();
    let script = Script::new().packet("?").ack().packet("D");
    let (result, sent) = run_session(&mut target, script);

    assert_eq!(result.unwrap(), DisconnectReason::Disconnect);
    let sent = String::from_utf8_lossy(&sent);
    assert!(sent.contains("$S05#b8"), "got: {sent}");
}

#[test]
fn qsupported_advertises_required_features() {
    let mut target = fresh_target();
    let script = Script::new()
        .packet("qSupported:multiprocess+;swbreak+;hwbreak+")
        .ack()
        .packet("D");
    let (_, sent) = run_session(&mut target, script);

    let frames = reply_frames(&sent);
    let reply = &frames[0];
    assert!(reply.contains("PacketSize=1000"), "got: {reply}");
    assert!(reply.contains("swbreak+"), "got: {reply}");
    assert!(reply.contains("hwbreak+"), "got: {reply}");
    assert!(reply.contains("qXfer:features:read+"), "got: {reply}");
}

#[test]
fn read_all_registers_has_expected_width() {
    let mut target = fresh_target();
    let script = Script::new()
        .packet("QStartNoAckMode")
        .ack()
        .packet("g")
        .packet("D");
    let (_, sent) = run_session(&mut target, script);

    let frames = reply_frames(&sent);
    assert_eq!(frames[0], "OK");
    let regs = &frames[1];
    assert_eq!(regs.len(), arch::NUM_REGS * arch::XLEN_BYTES * 2);
    assert!(regs.bytes().all(|b| b.is_ascii_hexdigit()));
}

#[test]
fn single_register_roundtrip_via_packets() {
    let mut target = fresh_target();
    // P05=78563412 writes 0x12345678 to x5 (little-endian payload).
    let script = Script::new()
        .packet("QStartNoAckMode")
        .ack()
        .packet("P5=78563412")
        .packet("p5")
        .packet("D");
    let (_, sent) = run_session(&mut target, script);

    let frames = reply_frames(&sent);
    assert_eq!(frames[1], "OK");
    assert_eq!(frames[2], "78563412");
    assert_eq!(target.read_register(5).unwrap(), 0x1234_5678);
}

#[test]
fn bad_register_number_reports_e03() {
    let mut target = fresh_target();
    let script = Script::new()
        .packet("QStartNoAckMode")
        .ack()
        .packet("p63")
        .packet("D");
    let (_, sent) = run_session(&mut target, script);

    assert_eq!(reply_frames(&sent)[1], "E03");
}

#[test]
fn memory_write_read_roundtrip() {
    let mut target = fresh_target();
    let script = Script::new()
        .packet("QStartNoAckMode")
        .ack()
        .packet("M100,4:deadbeef")
        .packet("m100,4")
        .packet("D");
    let (_, sent) = run_session(&mut target, script);

    let frames = reply_frames(&sent);
    assert_eq!(frames[1], "OK");
    assert_eq!(frames[2], "deadbeef");
}

#[test]
fn step_onto_ebreak_reports_swbreak_with_pc_unmoved() {
    let mut target = fresh_target();
    target
        .write_memory(0x100, &arch::EBREAK.to_le_bytes())
        .unwrap();
    target
        .write_register(arch::PC_REGNUM, 0x100)
        .unwrap();

    let script = Script::new()
        .packet("qSupported:swbreak+")
        .ack()
        .packet("s")
        .ack()
        .packet("D");
    let (_, sent) = run_session(&mut target, script);

    let sent = String::from_utf8_lossy(&sent);
    assert!(sent.contains("T05swbreak:;"), "got: {sent}");
    assert_eq!(target.read_register(arch::PC_REGNUM).unwrap(), 0x100);
}

#[test]
fn ecall_becomes_fileio_request_and_pc_advances() {
    let mut target = fresh_target();
    target.write_memory(0, &arch::ECALL.to_le_bytes()).unwrap();
    target.write_register(arch::REG_A7, 64).unwrap(); // write
    target.write_register(arch::REG_A0, 1).unwrap(); // fd
    target.write_register(arch::REG_A1, 0x200).unwrap(); // buf
    target.write_register(arch::REG_A2, 5).unwrap(); // count

    let script = Script::new()
        .packet("s")
        .ack()
        .packet("F5")
        .ack()
        .packet("D");
    let (_, sent) = run_session(&mut target, script);

    let sent_text = String::from_utf8_lossy(&sent);
    assert!(sent_text.contains("$Fwrite,1,200,5#"), "got: {sent_text}");
    // The F reply lands in a0, the step is then reported complete.
    assert!(sent_text.contains("T05"), "got: {sent_text}");
    assert_eq!(target.read_register(arch::REG_A0).unwrap(), 5);
    assert_eq!(target.read_register(arch::PC_REGNUM).unwrap(), 4);
}

#[test]
fn exit_syscall_reports_w_reply() {
    let mut target = fresh_target();
    target.write_memory(0, &arch::ECALL.to_le_bytes()).unwrap();
    target.write_register(arch::REG_A7, 93).unwrap(); // exit
    target.write_register(arch::REG_A0, 3).unwrap();

    let script = Script::new().packet("c").ack().packet("D");
    let (_, sent) = run_session(&mut target, script);

    let sent = String::from_utf8_lossy(&sent);
    assert!(sent.contains("$W03#"), "got: {sent}");
}

#[test]
fn interrupt_byte_stops_a_continue() {
    let mut target = fresh_target();
    // j 0: spin forever at address 0.
    target
        .write_memory(0, &0x0000_006fu32.to_le_bytes())
        .unwrap();

    let script = Script::new()
        .packet("QStartNoAckMode")
        .ack()
        .packet("c")
        .interrupt()
        .packet("D");
    let (result, sent) = run_session(&mut target, script);

    assert_eq!(result.unwrap(), DisconnectReason::Disconnect);
    let sent = String::from_utf8_lossy(&sent);
    assert!(sent.contains("T05thread:1;"), "got: {sent}");
}

#[test]
fn target_xml_is_served() {
    let mut target = fresh_target();
    let script = Script::new()
        .packet("QStartNoAckMode")
        .ack()
        .packet("qXfer:features:read:target.xml:0,ffb")
        .packet("D");
    let (_, sent) = run_session(&mut target, script);

    let frames = reply_frames(&sent);
    let xml = &frames[1];
    assert!(xml.starts_with('l') || xml.starts_with('m'), "got: {xml}");
    assert!(xml.contains("riscv:rv32"), "got: {xml}");
}

#[test]
fn thread_queries_have_canonical_answers() {
    let mut target = fresh_target();
    let script = Script::new()
        .packet("QStartNoAckMode")
        .ack()
        .packet("qAttached")
        .packet("qC")
        .packet("qfThreadInfo")
        .packet("qsThreadInfo")
        .packet("Hg0")
        .packet("D");
    let (_, sent) = run_session(&mut target, script);

    let frames = reply_frames(&sent);
    assert_eq!(frames[1], "1");
    assert_eq!(frames[2], "QC1");
    assert_eq!(frames[3], "m1");
    assert_eq!(frames[4], "l");
    assert_eq!(frames[5], "OK");
}

#[test]
fn vcont_query_and_dispatch() {
    let mut target = fresh_target();
    target
        .write_memory(0, &arch::EBREAK.to_le_bytes())
        .unwrap();

    let script = Script::new()
        .packet("QStartNoAckMode")
        .ack()
        .packet("vCont?")
        .packet("vCont;s:p1.1")
        .packet("D");
    let (_, sent) = run_session(&mut target, script);

    let frames = reply_frames(&sent);
    assert_eq!(frames[1], "vCont;c;s");
    assert!(frames[2].starts_with("S05") || frames[2].starts_with("T05"), "got: {}", frames[2]);
}

#[test]
fn unknown_packet_gets_empty_reply() {
    let mut target = fresh_target();
    let script = Script::new()
        .packet("QStartNoAckMode")
        .ack()
        .packet("vMustReplyEmpty")
        .packet("D");
    let (_, sent) = run_session(&mut target, script);

    assert_eq!(reply_frames(&sent)[1], "");
}

#[test]
fn monitor_counters_render_as_hex_text() {
    let mut target = fresh_target();
    // One addi, then read the instruction count over qRcmd.
    target
        .write_memory(0, &0x0010_0093u32.to_le_bytes())
        .unwrap();

    // "instrcount" hex-encoded.
    let script = Script::new()
        .packet("QStartNoAckMode")
        .ack()
        .packet("s")
        .packet("qRcmd,696e737472636f756e74")
        .packet("D");
    let (_, sent) = run_session(&mut target, script);

    let frames = reply_frames(&sent);
    // "1\n" = 31 0a
    assert_eq!(frames[2], "310a");
}

#[test]
fn kill_with_reset_policy_keeps_serving() {
    let mut target = fresh_target();
    target
        .write_memory(0, &arch::EBREAK.to_le_bytes())
        .unwrap();

    let script = Script::new()
        .packet("QStartNoAckMode")
        .ack()
        .packet("s")
        .packet("k")
        .packet("?")
        .packet("D");
    let (result, sent) = run_session(&mut target, script);

    assert_eq!(result.unwrap(), DisconnectReason::Disconnect);
    let frames = reply_frames(&sent);
    assert_eq!(frames[2], "OK"); // k
    assert_eq!(frames[3], "S05"); // stop history wiped by the cold reset
}

#[test]
fn kill_with_exit_policy_ends_the_session() {
    let mut target = fresh_target();
    let script = Script::new().packet("QStartNoAckMode").ack().packet("k");
    let (result, sent) =
        run_session_with(&mut target, script, KillBehaviour::ExitOnKill);

    assert_eq!(result.unwrap(), DisconnectReason::Kill);
    assert_eq!(reply_frames(&sent)[1], "OK");
}

#[test]
fn corrupt_frame_is_nakked_and_retried() {
    let mut target = fresh_target();
    let mut bytes = Script::new().bytes();
    bytes.extend_from_slice(b"$?#00"); // bad checksum
    bytes.extend_from_slice(&common::frame("?")); // retry
    bytes.push(b'+');
    bytes.extend_from_slice(&common::frame("D"));

    let pipe = riscv_gdbserver::conn::InMemoryPipe::new(&bytes);
    let mut server = riscv_gdbserver::GdbServer::new(
        pipe,
        &mut target,
        KillBehaviour::ResetOnKill,
    );
    let result = server.serve();
    let sent = server.borrow_conn().sent().to_vec();

    assert_eq!(result.unwrap(), DisconnectReason::Disconnect);
    let sent = String::from_utf8_lossy(&sent);
    // First a nak, then the normal ack + stop reply for the retry.
    assert!(sent.starts_with('-'), "got: {sent}");
    assert!(sent.contains("$S05#b8"), "got: {sent}");
}
