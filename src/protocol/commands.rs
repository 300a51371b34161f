//! Decoded RSP command packets.
//!
//! The payload has already been unescaped by the receive state machine; this
//! module classifies it and pulls the numeric fields out. Hex-encoded data
//! fields (`G`, `M`, `P`, `qRcmd`) are decoded in place, so the variants can
//! borrow from the packet buffer.

use crate::protocol::common::hex::decode_hex;
use crate::protocol::common::hex::decode_hex_buf;
use crate::protocol::common::hex::decode_signed_hex;
use crate::target::ResumeMode;

/// A `Z`/`z` packet, before the matchpoint type digit has been interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchpointSpec {
    /// The raw RSP type digit: 0 sw-break, 1 hw-break, 2/3/4 watchpoints.
    pub ty: u8,
    pub addr: u32,
    /// Breakpoint "kind" (instruction length on RISC-V) or watchpoint length.
    pub len: usize,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Command<'a> {
    /// `?`
    TargetHaltReason,
    /// `g`
    ReadGeneralRegisters,
    /// `G <bytes>` (decoded)
    WriteGeneralRegisters(&'a [u8]),
    /// `p nn`
    ReadRegister(usize),
    /// `P nn=<bytes>` (decoded)
    WriteRegister { regno: usize, bytes: &'a [u8] },
    /// `m addr,len`
    ReadMemory { addr: u32, len: usize },
    /// `M addr,len:<bytes>` (decoded)
    WriteMemory { addr: u32, data: &'a [u8] },
    /// `X addr,len:<binary>`
    WriteMemoryBinary { addr: u32, data: &'a [u8] },
    /// `c [addr]` / `s [addr]`, and the equivalent `vCont` actions
    Resume { mode: ResumeMode, addr: Option<u32> },
    /// `vCont?`
    VContQuery,
    /// `Z k,addr,len`
    InsertMatchpoint(MatchpointSpec),
    /// `z k,addr,len`
    RemoveMatchpoint(MatchpointSpec),
    /// `H c|g <thread>`: accepted and ignored on a single-thread server
    SetThread,
    /// `T <thread>`
    ThreadAlive,
    /// `qSupported[:features]`: raw feature list
    QSupported(&'a [u8]),
    /// `qAttached[:pid]`
    QAttached,
    /// `qC`
    QCurrentThread,
    /// `qfThreadInfo`
    QThreadInfoFirst,
    /// `qsThreadInfo`
    QThreadInfoNext,
    /// `qRcmd,<hex>` (decoded)
    QRcmd(&'a [u8]),
    /// `QStartNoAckMode`
    QStartNoAckMode,
    /// `qXfer:features:read:<annex>:<offset>,<length>`
    QXferFeaturesRead {
        annex: &'a [u8],
        offset: usize,
        length: usize,
    },
    /// `k`
    Kill,
    /// `vKill[;pid]`
    VKill,
    /// `D[;pid]`
    Detach,
    /// `F retcode[,errno[,C]]`: reply to a File-I/O request
    FileIoReply { retcode: i64, ctrl_c: bool },
    Unknown(&'a [u8]),
}

/// Split `buf` around the first occurrence of `sep`.
fn split_at_byte(buf: &mut [u8], sep: u8) -> Option<(&mut [u8], &mut [u8])> {
    let pos = buf.iter().position(|b| *b == sep)?;
    let (head, tail) = buf.split_at_mut(pos);
    Some((head, &mut tail[1..]))
}

/// Parse the `addr,len` header shared by the memory access packets.
fn parse_addr_len(buf: &[u8]) -> Option<(u32, usize)> {
    let pos = buf.iter().position(|b| *b == b',')?;
    let addr = decode_hex(&buf[..pos]).ok()?;
    let len = decode_hex(&buf[pos + 1..]).ok()?;
    Some((addr, len))
}

fn parse_matchpoint(body: &mut [u8]) -> Option<MatchpointSpec> {
    // Skip the leading Z/z.
    let body = &body[1..];
    let mut fields = body.split(|b| *b == b',');
    let ty: u8 = decode_hex(fields.next()?).ok()?;
    let addr = decode_hex(fields.next()?).ok()?;
    let len = decode_hex(fields.next()?).ok()?;
    Some(MatchpointSpec { ty, addr, len })
}

fn parse_resume(body: &mut [u8], mode: ResumeMode) -> Option<Command<'_>> {
    let rest = &body[1..];
    let addr = if rest.is_empty() {
        None
    } else {
        Some(decode_hex(rest).ok()?)
    };
    Some(Command::Resume { mode, addr })
}

/// `vCont;action[:thread][;...]`: only the first action matters on a
/// single-thread server.
fn parse_vcont(actions: &[u8]) -> Option<ResumeMode> {
    match actions.first()? {
        b'c' | b'C' => Some(ResumeMode::Continue),
        b's' | b'S' => Some(ResumeMode::Step),
        _ => None,
    }
}

fn parse_fileio_reply(body: &mut [u8]) -> Option<Command<'_>> {
    let rest = &body[1..];
    let mut fields = rest.split(|b| *b == b',');
    let retcode = decode_signed_hex(fields.next()?).ok()?;
    let _errno = fields.next();
    let ctrl_c = fields.next() == Some(&b"C"[..]);
    Some(Command::FileIoReply { retcode, ctrl_c })
}

fn parse_qxfer(args: &mut [u8]) -> Option<Command<'_>> {
    // <annex>:<offset>,<length>
    let (annex, rest) = split_at_byte(args, b':')?;
    let pos = rest.iter().position(|b| *b == b',')?;
    let offset = decode_hex(&rest[..pos]).ok()?;
    let length = decode_hex(&rest[pos + 1..]).ok()?;
    Some(Command::QXferFeaturesRead {
        annex,
        offset,
        length,
    })
}

impl<'a> Command<'a> {
    pub fn from_body(body: &'a mut [u8]) -> Command<'a> {
        match Self::parse(body) {
            Some(cmd) => cmd,
            None => Command::Unknown(&[]),
        }
    }

    fn parse(body: &'a mut [u8]) -> Option<Command<'a>> {
        let first = *body.first()?;
        let cmd = match first {
            b'?' => Command::TargetHaltReason,
            b'g' => Command::ReadGeneralRegisters,
            b'G' => {
                let data = decode_hex_buf(&mut body[1..]).ok()?;
                Command::WriteGeneralRegisters(data)
            }
            b'p' => Command::ReadRegister(decode_hex(&body[1..]).ok()?),
            b'P' => {
                let (head, val) = split_at_byte(&mut body[1..], b'=')?;
                let regno = decode_hex(head).ok()?;
                let bytes = decode_hex_buf(val).ok()?;
                Command::WriteRegister { regno, bytes }
            }
            b'm' => {
                let (addr, len) = parse_addr_len(&body[1..])?;
                Command::ReadMemory { addr, len }
            }
            b'M' => {
                let (head, payload) = split_at_byte(&mut body[1..], b':')?;
                let (addr, len) = parse_addr_len(head)?;
                let data = decode_hex_buf(payload).ok()?;
                if data.len() != len {
                    return None;
                }
                Command::WriteMemory { addr, data }
            }
            b'X' => {
                let (head, data) = split_at_byte(&mut body[1..], b':')?;
                let (addr, len) = parse_addr_len(head)?;
                if data.len() != len {
                    return None;
                }
                Command::WriteMemoryBinary { addr, data }
            }
            b'c' => return parse_resume(body, ResumeMode::Continue),
            b's' => return parse_resume(body, ResumeMode::Step),
            b'Z' => Command::InsertMatchpoint(parse_matchpoint(body)?),
            b'z' => Command::RemoveMatchpoint(parse_matchpoint(body)?),
            b'H' => Command::SetThread,
            b'T' => Command::ThreadAlive,
            b'k' => Command::Kill,
            b'D' => Command::Detach,
            b'F' => return parse_fileio_reply(body),
            b'q' | b'Q' | b'v' => return Self::parse_named(body),
            _ => return None,
        };
        Some(cmd)
    }

    /// The multi-character `q`/`Q`/`v` packets, matched by prefix.
    fn parse_named(body: &'a mut [u8]) -> Option<Command<'a>> {
        fn strip<'b>(body: &'b mut [u8], prefix: &str) -> Option<&'b mut [u8]> {
            if body.starts_with(prefix.as_bytes()) {
                Some(&mut body[prefix.len()..])
            } else {
                None
            }
        }

        if body.starts_with(b"qSupported") {
            let rest = &body[b"qSupported".len()..];
            let features = rest.strip_prefix(b":").unwrap_or(rest);
            return Some(Command::QSupported(features));
        }
        if body.starts_with(b"qXfer:features:read:") {
            let args = &mut body[b"qXfer:features:read:".len()..];
            return parse_qxfer(args);
        }
        if body.starts_with(b"qRcmd,") {
            let hex = &mut body[b"qRcmd,".len()..];
            return Some(Command::QRcmd(decode_hex_buf(hex).ok()?));
        }
        if body.starts_with(b"qAttached") {
            return Some(Command::QAttached);
        }
        if body.starts_with(b"qfThreadInfo") {
            return Some(Command::QThreadInfoFirst);
        }
        if body.starts_with(b"qsThreadInfo") {
            return Some(Command::QThreadInfoNext);
        }
        if *body == *b"qC" {
            return Some(Command::QCurrentThread);
        }
        if *body == *b"QStartNoAckMode" {
            return Some(Command::QStartNoAckMode);
        }
        if *body == *b"vCont?" {
            return Some(Command::VContQuery);
        }
        if let Some(actions) = strip(&mut *body, "vCont;") {
            let mode = parse_vcont(actions)?;
            return Some(Command::Resume { mode, addr: None });
        }
        if body.starts_with(b"vKill") {
            return Some(Command::VKill);
        }
        None
    }
}
