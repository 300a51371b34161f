//! The contract every CPU back-end implements.
//!
//! The engine only ever talks to a `&mut dyn Target`, so an instruction-set
//! simulator, an RTL model, or anything else with registers, memory, and a
//! notion of "run until something happens" can sit behind the protocol.

use std::time::Duration;

use thiserror::Error;

/// Reset depth. A cold reset zeroes the cycle/instruction counters; a warm
/// reset reinitialises the core but preserves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetKind {
    Warm,
    Cold,
}

/// How a resume request should run the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeMode {
    /// Execute exactly one instruction.
    Step,
    /// Run until a stop condition.
    Continue,
}

/// The matchpoint taxonomy of the `Z`/`z` packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchKind {
    SwBreak,
    HwBreak,
    WriteWatch,
    ReadWatch,
    AccessWatch,
}

impl MatchKind {
    /// Map the RSP type digit (`Z0`..`Z4`).
    pub fn from_rsp_type(ty: u8) -> Option<MatchKind> {
        Some(match ty {
            0 => MatchKind::SwBreak,
            1 => MatchKind::HwBreak,
            2 => MatchKind::WriteWatch,
            3 => MatchKind::ReadWatch,
            4 => MatchKind::AccessWatch,
            _ => return None,
        })
    }
}

/// Why a resume returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Completed the requested single step.
    Stepped,
    /// Halted on a software breakpoint (EBREAK / C.EBREAK).
    SwBreak,
    /// Halted on a hardware breakpoint.
    HwBreak,
    /// A watchpoint at the given address fired.
    Watch(u32),
    /// The wall-clock budget for this resume ran out; the core is halted and
    /// the resume may be re-issued.
    Timeout,
    /// Stopped at an instruction boundary on request.
    Interrupted,
    /// The core is parked on a system call; the engine owes the debugger a
    /// File-I/O request.
    Syscall,
    /// The program exited with the given status.
    Exited(u8),
    /// The program was terminated by the given signal.
    Signalled(u8),
}

/// A failed target operation, carrying the RSP error code it maps onto.
#[derive(Debug, Error)]
pub enum TargetError {
    #[error("target operation failed")]
    Generic,
    #[error("address out of range")]
    BadAddress,
    #[error("no such register")]
    BadRegister,
    /// The back-end reported a state it never legitimately can. Ends the
    /// process; the debugger will reconnect.
    #[error("backend contract violation: {0}")]
    Fatal(String),
}

impl TargetError {
    /// The `E<hh>` code reported to the debugger.
    pub fn code(&self) -> u8 {
        match self {
            TargetError::Generic | TargetError::Fatal(_) => 0x01,
            TargetError::BadAddress => 0x02,
            TargetError::BadRegister => 0x03,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, TargetError::Fatal(_))
    }
}

pub type TargetResult<T> = Result<T, TargetError>;

/// Abstract CPU contract: register/memory access, resume/step with a stop
/// reason, reset, and matchpoints.
///
/// Registers and memory are only meaningful while the core is halted, which
/// is guaranteed between engine calls: the engine is single-threaded and
/// every `resume` has returned before any access is issued.
pub trait Target {
    /// Reset the core. `Cold` also zeroes the cycle/instruction counters.
    fn reset(&mut self, kind: ResetKind) -> TargetResult<()>;

    /// Read register `reg` (RSP numbering, see [`crate::arch`]).
    fn read_register(&mut self, reg: usize) -> TargetResult<u32>;

    /// Write register `reg`.
    fn write_register(&mut self, reg: usize, value: u32) -> TargetResult<()>;

    /// Read memory into `buf`, returning how many bytes were actually read.
    /// Short reads are not an error.
    fn read_memory(&mut self, addr: u32, buf: &mut [u8]) -> TargetResult<usize>;

    /// Write memory, returning how many bytes were actually written.
    fn write_memory(&mut self, addr: u32, data: &[u8]) -> TargetResult<usize>;

    /// Run the core. `None` means unbounded; otherwise the call returns
    /// [`StopReason::Timeout`] once the budget is exhausted, leaving the core
    /// halted at an instruction boundary.
    fn resume(&mut self, mode: ResumeMode, timeout: Option<Duration>) -> TargetResult<StopReason>;

    /// Try to plant a matchpoint in the target itself. `Ok(false)` means the
    /// target declines, and the engine falls back to a software breakpoint
    /// through the memory interface.
    fn insert_matchpoint(&mut self, addr: u32, kind: MatchKind, len: usize)
        -> TargetResult<bool>;

    /// Remove a matchpoint previously planted in the target.
    fn remove_matchpoint(&mut self, addr: u32, kind: MatchKind, len: usize)
        -> TargetResult<bool>;

    /// Cycles executed since the last cold reset. Monotone between colds.
    fn cycle_count(&self) -> u64;

    /// Instructions retired since the last cold reset. Monotone between
    /// colds.
    fn instr_count(&self) -> u64;

    /// Offer a `monitor` command string to the back-end. Returns whether the
    /// back-end handled it; any output is rendered to `out`.
    fn command(&mut self, cmd: &str, out: &mut dyn std::fmt::Write) -> TargetResult<bool>;
}
