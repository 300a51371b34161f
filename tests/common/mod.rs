//! Scripted-session harness: the debugger's half of a conversation is laid
//! out up front, a session runs against it, and the server's output is
//! handed back for inspection.

use riscv_gdbserver::conn::InMemoryPipe;
use riscv_gdbserver::stub::DisconnectReason;
use riscv_gdbserver::stub::GdbServerError;
use riscv_gdbserver::stub::KillBehaviour;
use riscv_gdbserver::target::Target;
use riscv_gdbserver::GdbServer;

pub fn checksum(body: &[u8]) -> u8 {
    body.iter().fold(0u8, |a, b| a.wrapping_add(*b))
}

/// Frame a payload as `$<body>#<hh>`.
pub fn frame(body: &str) -> Vec<u8> {
    format!("${}#{:02x}", body, checksum(body.as_bytes())).into_bytes()
}

/// Builder for the byte sequence the "debugger" sends.
#[derive(Default)]
pub struct Script {
    bytes: Vec<u8>,
}

impl Script {
    pub fn new() -> Script {
        Script::default()
    }

    /// A framed command packet.
    pub fn packet(mut self, body: &str) -> Script {
        self.bytes.extend_from_slice(&frame(body));
        self
    }

    /// The `+` the debugger sends after each server reply.
    pub fn ack(mut self) -> Script {
        self.bytes.push(b'+');
        self
    }

    /// A bare interrupt byte.
    pub fn interrupt(mut self) -> Script {
        self.bytes.push(0x03);
        self
    }

    pub fn bytes(self) -> Vec<u8> {
        self.bytes
    }
}

pub type ServeResult = Result<DisconnectReason, GdbServerError<std::io::Error>>;

pub fn run_session_with(
    target: &mut dyn Target,
    script: Script,
    kill_behaviour: KillBehaviour,
) -> (ServeResult, Vec<u8>) {
    let pipe = InMemoryPipe::new(&script.bytes());
    let mut server = GdbServer::new(pipe, target, kill_behaviour);
    let result = server.serve();
    let sent = server.borrow_conn().sent().to_vec();
    (result, sent)
}

pub fn run_session(target: &mut dyn Target, script: Script) -> (ServeResult, Vec<u8>) {
    run_session_with(target, script, KillBehaviour::ResetOnKill)
}

/// Pull the payloads of every framed packet the server sent, in order.
pub fn reply_frames(sent: &[u8]) -> Vec<String> {
    let mut frames = Vec::new();
    let mut i = 0;
    while i < sent.len() {
        if sent[i] == b'$' {
            let start = i + 1;
            let end = sent[start..]
                .iter()
                .position(|b| *b == b'#')
                .map(|p| start + p)
                .unwrap_or(sent.len());
            frames.push(String::from_utf8_lossy(&sent[start..end]).into_owned());
            i = end + 3;
        } else {
            i += 1;
        }
    }
    frames
}
