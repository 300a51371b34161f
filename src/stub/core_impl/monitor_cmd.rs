//! `qRcmd`: the `monitor` command surface.

use crate::conn::ConnectionExt;
use crate::protocol::ResponseWriter;
use crate::stub::GdbServer;
use crate::stub::GdbServerError;
use crate::stub::Outcome;
use crate::target::ResetKind;

const MONITOR_HELP: &str = "monitor commands:\n\
                            \x20 reset [warm|cold]  reset the core\n\
                            \x20 cyclecount         cycles since cold reset\n\
                            \x20 instrcount         instructions since cold reset\n";

impl<'t, C: ConnectionExt> GdbServer<'t, C> {
    pub(crate) fn handle_monitor_cmd(
        &mut self,
        cmd: &[u8],
    ) -> Result<Outcome, GdbServerError<C::Error>> {
        let cmd = String::from_utf8_lossy(cmd);
        let cmd = cmd.trim();
        log::debug!("monitor command: {cmd:?}");

        match cmd {
            "reset" | "reset warm" => return self.monitor_reset(ResetKind::Warm),
            "reset cold" => return self.monitor_reset(ResetKind::Cold),
            "cyclecount" => {
                let text = format!("{}\n", self.target.cycle_count());
                return self.send_console_text(&text);
            }
            "instrcount" => {
                let text = format!("{}\n", self.target.instr_count());
                return self.send_console_text(&text);
            }
            "help" => return self.send_console_text(MONITOR_HELP),
            _ => {}
        }

        // Not one of ours; offer it to the back-end.
        let mut out = String::new();
        let handled = self.target.command(cmd, &mut out);
        match self.check(handled)? {
            Ok(true) if out.is_empty() => self.send_ok()?,
            Ok(true) => return self.send_console_text(&out),
            Ok(false) => self.send_empty()?,
            Err(code) => self.send_error(code)?,
        }
        Ok(Outcome::Handled)
    }

    fn monitor_reset(&mut self, kind: ResetKind) -> Result<Outcome, GdbServerError<C::Error>> {
        let reset = self.target.reset(kind);
        // Whatever was patched into the old memory image is gone.
        self.matchpoints.discard();
        self.last_stop = None;
        match self.check(reset)? {
            Ok(()) => self.send_ok()?,
            Err(code) => self.send_error(code)?,
        }
        Ok(Outcome::Handled)
    }

    /// `qRcmd` output travels back as one hex-encoded blob.
    fn send_console_text(&mut self, text: &str) -> Result<Outcome, GdbServerError<C::Error>> {
        let mut res = ResponseWriter::new();
        res.write_hex_buf(text.as_bytes());
        self.send_frame(res)?;
        Ok(Outcome::Handled)
    }
}
