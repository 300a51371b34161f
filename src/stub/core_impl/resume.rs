//! Execution control and the File-I/O (syscall) exchange.

use crate::arch;
use crate::conn::ConnectionExt;
use crate::protocol::ResponseWriter;
use crate::stub::GdbServer;
use crate::stub::GdbServerError;
use crate::stub::Outcome;
use crate::target::ResumeMode;
use crate::target::StopReason;

/// RISC-V Linux/newlib syscall numbers the server understands.
mod syscall {
    pub const CLOSE: u32 = 57;
    pub const LSEEK: u32 = 62;
    pub const READ: u32 = 63;
    pub const WRITE: u32 = 64;
    pub const EXIT: u32 = 93;
    pub const OPEN: u32 = 1024;
}

impl<'t, C: ConnectionExt> GdbServer<'t, C> {
    /// `c [addr]` / `s [addr]` / `vCont`: optionally move the PC, then run.
    pub(crate) fn handle_resume(
        &mut self,
        mode: ResumeMode,
        addr: Option<u32>,
    ) -> Result<Outcome, GdbServerError<C::Error>> {
        if let Some(addr) = addr {
            let write = self.target.write_register(arch::PC_REGNUM, addr);
            if let Err(code) = self.check(write)? {
                self.send_error(code)?;
                return Ok(Outcome::Handled);
            }
        }
        self.run_and_report(mode)
    }

    /// `vCont?`: we implement continue and step.
    pub(crate) fn handle_vcont_query(&mut self) -> Result<Outcome, GdbServerError<C::Error>> {
        let mut res = ResponseWriter::new();
        res.write_str("vCont;c;s");
        self.send_frame(res)?;
        Ok(Outcome::Handled)
    }

    /// The target is parked just past an ECALL. Translate it into a
    /// File-I/O request, or absorb it locally.
    ///
    /// Returns `None` when execution should simply carry on (the syscall was
    /// answered locally and the resume was a continue).
    pub(crate) fn handle_syscall(
        &mut self,
        mode: ResumeMode,
    ) -> Result<Option<Outcome>, GdbServerError<C::Error>> {
        macro_rules! reg {
            ($n:expr) => {{
                let read = self.target.read_register($n);
                match self.check(read)? {
                    Ok(v) => v,
                    Err(code) => {
                        self.send_error(code)?;
                        return Ok(Some(Outcome::Handled));
                    }
                }
            }};
        }

        let num = reg!(arch::REG_A7);
        let a0 = reg!(arch::REG_A0);
        let a1 = reg!(arch::REG_A1);
        let a2 = reg!(arch::REG_A2);

        let request = match num {
            syscall::EXIT => {
                log::info!("inferior exited with status {a0}");
                self.report_stop(StopReason::Exited(a0 as u8))?;
                return Ok(Some(Outcome::Handled));
            }
            syscall::READ => format!("Fread,{a0:x},{a1:x},{a2:x}"),
            syscall::WRITE => format!("Fwrite,{a0:x},{a1:x},{a2:x}"),
            syscall::CLOSE => format!("Fclose,{a0:x}"),
            syscall::LSEEK => format!("Flseek,{a0:x},{a1:x},{a2:x}"),
            syscall::OPEN => {
                // GDB wants the path as pointer/length; measure the
                // NUL-terminated string in target memory.
                let len = self.path_length(a0)?;
                format!("Fopen,{a0:x}/{len:x},{a1:x},{a2:x}")
            }
            other => {
                // Not something we can forward; fail the call and let the
                // program deal with it.
                log::debug!("unsupported syscall {other}; returning -1");
                let write = self.target.write_register(arch::REG_A0, u32::MAX);
                if let Err(code) = self.check(write)? {
                    self.send_error(code)?;
                    return Ok(Some(Outcome::Handled));
                }
                if mode == ResumeMode::Step {
                    self.report_stop(StopReason::Stepped)?;
                    return Ok(Some(Outcome::Handled));
                }
                return Ok(None);
            }
        };

        let mut res = ResponseWriter::new();
        res.write_str(&request);
        self.pending_syscall = Some(mode);
        self.send_frame(res)?;
        Ok(Some(Outcome::Handled))
    }

    /// `F retcode[,errno[,C]]`: the debugger answered our File-I/O
    /// request; bank the result and pick the resume back up.
    pub(crate) fn handle_fileio_reply(
        &mut self,
        retcode: i64,
        ctrl_c: bool,
    ) -> Result<Outcome, GdbServerError<C::Error>> {
        let mode = match self.pending_syscall.take() {
            Some(mode) => mode,
            None => {
                log::warn!(target: "rsp", "F reply with no File-I/O request outstanding");
                self.send_empty()?;
                return Ok(Outcome::Handled);
            }
        };

        let write = self.target.write_register(arch::REG_A0, retcode as u32);
        if let Err(code) = self.check(write)? {
            self.send_error(code)?;
            return Ok(Outcome::Handled);
        }

        if ctrl_c {
            self.report_stop(StopReason::Interrupted)?;
            return Ok(Outcome::Handled);
        }

        match mode {
            // The step that raised the syscall is now complete.
            ResumeMode::Step => {
                self.report_stop(StopReason::Stepped)?;
                Ok(Outcome::Handled)
            }
            ResumeMode::Continue => self.run_and_report(ResumeMode::Continue),
        }
    }

    /// Length (including the NUL) of a C string in target memory, bounded
    /// to keep a runaway pointer from scanning the whole address space.
    fn path_length(&mut self, addr: u32) -> Result<u64, GdbServerError<C::Error>> {
        const PATH_MAX: usize = 1024;
        let mut buf = vec![0u8; PATH_MAX];
        let read = self
            .matchpoints
            .read_through(&mut *self.target, addr, &mut buf);
        let n = match self.check(read)? {
            Ok(n) => n,
            Err(_) => 0,
        };
        match buf[..n].iter().position(|b| *b == 0) {
            Some(pos) => Ok(pos as u64 + 1),
            None => Ok(n as u64),
        }
    }
}
