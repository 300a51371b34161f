//! The RSP engine: a single-threaded session loop that reads packets,
//! dispatches them against the target, and reports stops.

mod core_impl;
mod error;
mod matchpoints;
mod stop_reason;

pub use error::GdbServerError;
pub use matchpoints::MatchpointStore;

use std::time::Duration;

use bitflags::bitflags;

use crate::conn::ConnectionExt;
use crate::protocol::commands::Command;
use crate::protocol::RecvEvent;
use crate::protocol::RecvPacketStateMachine;
use crate::protocol::ResponseWriter;
use crate::target::ResumeMode;
use crate::target::StopReason;
use crate::target::Target;
use crate::target::TargetResult;

/// What to do once the debugger sends `k`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillBehaviour {
    /// Reply, then let the process exit. Fits the one-shot stdio transport.
    ExitOnKill,
    /// Cold-reset the target, discard matchpoints, and keep serving the
    /// session. Fits a long-lived TCP listener.
    ResetOnKill,
}

/// Why [`GdbServer::serve`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The debugger detached cleanly (`D`).
    Disconnect,
    /// The debugger issued `k` and the kill policy says exit.
    Kill,
}

bitflags! {
    /// Protocol features negotiated with this debugger.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ProtocolFeatures: u8 {
        const NO_ACK_MODE = 1 << 0;
        const CLIENT_SWBREAK = 1 << 1;
        const CLIENT_HWBREAK = 1 << 2;
        const CLIENT_MULTIPROCESS = 1 << 3;
    }
}

/// How long a resume burst runs before the engine polls the connection for
/// an interrupt byte.
const RESUME_SLICE: Duration = Duration::from_millis(2);

pub(crate) enum Outcome {
    Handled,
    Disconnect(DisconnectReason),
}

/// One debugging session: a connection, a target, and the protocol state
/// between them.
///
/// Everything is owned by the single control flow running [`serve`]: the
/// session is idle while blocked in `next_event`, running inside
/// `run_and_report`, and awaiting an ack inside `wait_for_ack`. No other
/// thread touches the target, so a register read issued after a resume
/// returns always observes the halted state that resume produced.
///
/// [`serve`]: GdbServer::serve
pub struct GdbServer<'t, C: ConnectionExt> {
    conn: C,
    target: &'t mut dyn Target,
    recv: RecvPacketStateMachine,
    matchpoints: MatchpointStore,
    features: ProtocolFeatures,
    kill_behaviour: KillBehaviour,
    /// Stop reason reported by the most recent resume, for `?`.
    last_stop: Option<StopReason>,
    /// Rendered bytes of the last packet we sent, for nak retransmission.
    last_frame: Vec<u8>,
    /// Resume mode to re-enter once the outstanding File-I/O request is
    /// answered.
    pending_syscall: Option<ResumeMode>,
    /// A `0x03` arrived while no resume was in flight; honour it on the next
    /// resume rather than running.
    pending_interrupt: bool,
}

impl<'t, C: ConnectionExt> GdbServer<'t, C> {
    pub fn new(conn: C, target: &'t mut dyn Target, kill_behaviour: KillBehaviour) -> Self {
        GdbServer {
            conn,
            target,
            recv: RecvPacketStateMachine::new(),
            matchpoints: MatchpointStore::new(),
            features: ProtocolFeatures::empty(),
            kill_behaviour,
            last_stop: None,
            last_frame: Vec::new(),
            pending_syscall: None,
            pending_interrupt: false,
        }
    }

    /// Return a mutable reference to the underlying connection.
    pub fn borrow_conn(&mut self) -> &mut C {
        &mut self.conn
    }

    /// Run the session to completion.
    ///
    /// Returns how the debugger ended it; transport failure and fatal target
    /// errors surface as [`GdbServerError`].
    pub fn serve(&mut self) -> Result<DisconnectReason, GdbServerError<C::Error>> {
        self.conn
            .on_session_start()
            .map_err(GdbServerError::Connection)?;
        log::info!(target: "conn", "debugger session started");

        loop {
            match self.next_event()? {
                RecvEvent::Packet(mut body) => {
                    if !self.no_ack() {
                        self.send_bytes(b"+")?;
                    }

                    let cmd = Command::from_body(&mut body);
                    match self.handle_command(cmd)? {
                        Outcome::Handled => {}
                        Outcome::Disconnect(reason) => {
                            log::info!(target: "conn", "session over: {reason:?}");
                            return Ok(reason);
                        }
                    }
                }
                RecvEvent::Corrupt => {
                    if !self.no_ack() {
                        self.send_bytes(b"-")?;
                    }
                }
                // A stray ack outside any exchange (GDB sends one on
                // connect).
                RecvEvent::Ack => {}
                RecvEvent::Nack => self.retransmit()?,
                RecvEvent::Interrupt => {
                    // We are between resumes, so the target is already
                    // halted; defer the stop to the next resume request.
                    self.pending_interrupt = true;
                }
            }
        }
    }

    pub(crate) fn no_ack(&self) -> bool {
        self.features.contains(ProtocolFeatures::NO_ACK_MODE)
    }

    /// Block until the decoder produces the next event.
    fn next_event(&mut self) -> Result<RecvEvent, GdbServerError<C::Error>> {
        loop {
            let byte = self.conn.read().map_err(GdbServerError::Connection)?;
            if let Some(event) = self.recv.pump(byte) {
                return Ok(event);
            }
        }
    }

    fn send_bytes(&mut self, bytes: &[u8]) -> Result<(), GdbServerError<C::Error>> {
        self.conn
            .write_all(bytes)
            .map_err(GdbServerError::Connection)?;
        self.conn.flush().map_err(GdbServerError::Connection)
    }

    fn retransmit(&mut self) -> Result<(), GdbServerError<C::Error>> {
        log::debug!(target: "rsp", "peer nak'd; retransmitting last packet");
        let frame = std::mem::take(&mut self.last_frame);
        self.send_bytes(&frame)?;
        self.last_frame = frame;
        Ok(())
    }

    /// Transmit a finished reply and, unless no-ack mode is on, hold the
    /// session in AwaitAck until the peer accepts it.
    pub(crate) fn send_frame(
        &mut self,
        res: ResponseWriter,
    ) -> Result<(), GdbServerError<C::Error>> {
        let frame = res.finish();
        self.conn
            .write_all(&frame)
            .map_err(GdbServerError::Connection)?;
        self.conn.flush().map_err(GdbServerError::Connection)?;
        self.last_frame = frame;

        if !self.no_ack() {
            self.wait_for_ack()?;
        }
        Ok(())
    }

    /// Transmit a reply without holding the session for the peer's ack.
    /// Used for replies the debugger is allowed to answer by closing the
    /// connection (`k`, `D`).
    pub(crate) fn send_frame_unacked(
        &mut self,
        res: ResponseWriter,
    ) -> Result<(), GdbServerError<C::Error>> {
        let frame = res.finish();
        self.conn
            .write_all(&frame)
            .map_err(GdbServerError::Connection)?;
        self.conn.flush().map_err(GdbServerError::Connection)?;
        self.last_frame = frame;
        Ok(())
    }

    fn wait_for_ack(&mut self) -> Result<(), GdbServerError<C::Error>> {
        loop {
            match self.next_event()? {
                RecvEvent::Ack => return Ok(()),
                RecvEvent::Nack => self.retransmit()?,
                RecvEvent::Interrupt => self.pending_interrupt = true,
                other => {
                    // A well-behaved peer acks before talking; drop whatever
                    // this was and keep waiting.
                    log::warn!(target: "rsp", "expected ack, got {other:?}");
                }
            }
        }
    }

    pub(crate) fn send_ok(&mut self) -> Result<(), GdbServerError<C::Error>> {
        let mut res = ResponseWriter::new();
        res.write_str("OK");
        self.send_frame(res)
    }

    pub(crate) fn send_empty(&mut self) -> Result<(), GdbServerError<C::Error>> {
        self.send_frame(ResponseWriter::new())
    }

    pub(crate) fn send_error(&mut self, code: u8) -> Result<(), GdbServerError<C::Error>> {
        let mut res = ResponseWriter::new();
        res.write(b'E');
        res.write_hex(code);
        self.send_frame(res)
    }

    /// Split a target result into a value or a non-fatal `E<hh>` code,
    /// promoting fatal errors to session errors.
    pub(crate) fn check<T>(
        &mut self,
        result: TargetResult<T>,
    ) -> Result<Result<T, u8>, GdbServerError<C::Error>> {
        match result {
            Ok(value) => Ok(Ok(value)),
            Err(e) if e.is_fatal() => Err(GdbServerError::Target(e)),
            Err(e) => Ok(Err(e.code())),
        }
    }

    /// Record and transmit a stop reply.
    pub(crate) fn report_stop(
        &mut self,
        reason: StopReason,
    ) -> Result<(), GdbServerError<C::Error>> {
        self.last_stop = Some(reason);
        let mut res = ResponseWriter::new();
        stop_reason::write_stop_reply(&mut res, reason, self.features);
        self.send_frame(res)
    }

    /// Non-blocking check for a `0x03` interrupt while a resume is in
    /// flight. Anything else stays queued on the connection; packets
    /// arriving mid-run are handled once the resume completes.
    fn poll_interrupt(&mut self) -> Result<bool, GdbServerError<C::Error>> {
        match self.conn.peek().map_err(GdbServerError::Connection)? {
            Some(0x03) => {
                self.conn.read().map_err(GdbServerError::Connection)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Drive the target in short bursts, watching for interrupts between
    /// bursts, until it reports a real stop.
    pub(crate) fn run_and_report(
        &mut self,
        mode: ResumeMode,
    ) -> Result<Outcome, GdbServerError<C::Error>> {
        loop {
            if self.pending_interrupt || self.poll_interrupt()? {
                self.pending_interrupt = false;
                self.report_stop(StopReason::Interrupted)?;
                return Ok(Outcome::Handled);
            }

            let result = self.target.resume(mode, Some(RESUME_SLICE));
            match self.check(result)? {
                // A slice expired with the core still running; go around and
                // look for an interrupt.
                Ok(StopReason::Timeout) => continue,
                Ok(StopReason::Syscall) => match self.handle_syscall(mode)? {
                    Some(outcome) => return Ok(outcome),
                    // Syscall absorbed locally; keep running.
                    None => continue,
                },
                Ok(reason) => {
                    self.report_stop(reason)?;
                    return Ok(Outcome::Handled);
                }
                Err(code) => {
                    self.send_error(code)?;
                    return Ok(Outcome::Handled);
                }
            }
        }
    }
}
