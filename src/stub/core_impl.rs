//! Per-packet handlers, grouped by concern.

mod base;
mod breakpoints;
mod monitor_cmd;
mod no_ack_mode;
mod resume;
mod target_xml;

use crate::conn::ConnectionExt;
use crate::protocol::commands::Command;
use crate::stub::GdbServer;
use crate::stub::GdbServerError;
use crate::stub::Outcome;

impl<'t, C: ConnectionExt> GdbServer<'t, C> {
    pub(crate) fn handle_command(
        &mut self,
        cmd: Command<'_>,
    ) -> Result<Outcome, GdbServerError<C::Error>> {
        match cmd {
            Command::TargetHaltReason => self.handle_halt_reason(),
            Command::ReadGeneralRegisters => self.handle_read_all_registers(),
            Command::WriteGeneralRegisters(data) => self.handle_write_all_registers(data),
            Command::ReadRegister(regno) => self.handle_read_register(regno),
            Command::WriteRegister { regno, bytes } => self.handle_write_register(regno, bytes),
            Command::ReadMemory { addr, len } => self.handle_read_memory(addr, len),
            Command::WriteMemory { addr, data } | Command::WriteMemoryBinary { addr, data } => {
                self.handle_write_memory(addr, data)
            }
            Command::Resume { mode, addr } => self.handle_resume(mode, addr),
            Command::VContQuery => self.handle_vcont_query(),
            Command::InsertMatchpoint(spec) => self.handle_insert_matchpoint(spec),
            Command::RemoveMatchpoint(spec) => self.handle_remove_matchpoint(spec),
            // Single inferior, single thread: thread selection always
            // succeeds, and the one thread is always alive.
            Command::SetThread | Command::ThreadAlive => {
                self.send_ok()?;
                Ok(Outcome::Handled)
            }
            Command::QSupported(features) => self.handle_q_supported(features),
            Command::QAttached => self.handle_q_attached(),
            Command::QCurrentThread => self.handle_q_current_thread(),
            Command::QThreadInfoFirst => self.handle_q_thread_info_first(),
            Command::QThreadInfoNext => self.handle_q_thread_info_next(),
            Command::QRcmd(cmd) => self.handle_monitor_cmd(cmd),
            Command::QStartNoAckMode => self.handle_start_no_ack_mode(),
            Command::QXferFeaturesRead {
                annex,
                offset,
                length,
            } => self.handle_xfer_features_read(annex, offset, length),
            Command::Kill => self.handle_kill(),
            Command::VKill => self.handle_kill(),
            Command::Detach => self.handle_detach(),
            Command::FileIoReply { retcode, ctrl_c } => self.handle_fileio_reply(retcode, ctrl_c),
            Command::Unknown(body) => {
                log::debug!(
                    target: "rsp",
                    "unknown packet {:?}; empty reply",
                    String::from_utf8_lossy(body)
                );
                self.send_empty()?;
                Ok(Outcome::Handled)
            }
        }
    }
}
