//! An implementation of the [GDB Remote Serial Protocol][rsp] serving
//! simulated RISC-V cores.
//!
//! A debugger connects over a byte stream ([`conn`]), exchanges framed
//! packets ([`protocol`]), and drives the target (register and memory
//! access, breakpoints, execution control) through the engine in
//! [`stub`]. Back-ends implement the [`target::Target`] contract; the
//! bundled reference back-end ([`targets::GdbSim`]) interprets RV32IMC via
//! [`sim`].
//!
//! The crate is a library plus the `riscv-gdbserver` binary, which wires a
//! back-end to either a TCP listener or the process's standard streams.
//!
//! [rsp]: https://sourceware.org/gdb/current/onlinedocs/gdb.html/Remote-Protocol.html

pub mod arch;
pub mod conn;
pub mod protocol;
pub mod sim;
pub mod stub;
pub mod target;
pub mod targets;
pub mod trace;

pub use stub::DisconnectReason;
pub use stub::GdbServer;
pub use stub::GdbServerError;
pub use stub::KillBehaviour;
