//! Registers, memory, queries, and session-ending packets.

use crate::arch;
use crate::conn::ConnectionExt;
use crate::protocol::ResponseWriter;
use crate::protocol::MAX_PACKET_SIZE;
use crate::stub::stop_reason::write_stop_reply;
use crate::stub::DisconnectReason;
use crate::stub::GdbServer;
use crate::stub::GdbServerError;
use crate::stub::KillBehaviour;
use crate::stub::Outcome;
use crate::stub::ProtocolFeatures;
use crate::target::ResetKind;

impl<'t, C: ConnectionExt> GdbServer<'t, C> {
    /// `?`: report why the target last stopped, or `S05` if it has never
    /// run.
    pub(crate) fn handle_halt_reason(&mut self) -> Result<Outcome, GdbServerError<C::Error>> {
        let mut res = ResponseWriter::new();
        match self.last_stop {
            Some(reason) => write_stop_reply(&mut res, reason, self.features),
            None => res.write_str("S05"),
        }
        self.send_frame(res)?;
        Ok(Outcome::Handled)
    }

    /// `g`: the whole register file, packed little-endian per register.
    pub(crate) fn handle_read_all_registers(
        &mut self,
    ) -> Result<Outcome, GdbServerError<C::Error>> {
        let mut res = ResponseWriter::new();
        for reg in 0..arch::NUM_REGS {
            let read = self.target.read_register(reg);
            match self.check(read)? {
                Ok(value) => res.write_hex_buf(&value.to_le_bytes()),
                Err(code) => {
                    self.send_error(code)?;
                    return Ok(Outcome::Handled);
                }
            }
        }
        self.send_frame(res)?;
        Ok(Outcome::Handled)
    }

    /// `G`: write the whole register file.
    pub(crate) fn handle_write_all_registers(
        &mut self,
        data: &[u8],
    ) -> Result<Outcome, GdbServerError<C::Error>> {
        if data.len() != arch::NUM_REGS * arch::XLEN_BYTES {
            self.send_error(0x01)?;
            return Ok(Outcome::Handled);
        }

        for (reg, chunk) in data.chunks_exact(arch::XLEN_BYTES).enumerate() {
            let value = u32::from_le_bytes(chunk.try_into().unwrap());
            let write = self.target.write_register(reg, value);
            if let Err(code) = self.check(write)? {
                self.send_error(code)?;
                return Ok(Outcome::Handled);
            }
        }
        self.send_ok()?;
        Ok(Outcome::Handled)
    }

    /// `p nn`
    pub(crate) fn handle_read_register(
        &mut self,
        regno: usize,
    ) -> Result<Outcome, GdbServerError<C::Error>> {
        let read = self.target.read_register(regno);
        match self.check(read)? {
            Ok(value) => {
                let mut res = ResponseWriter::new();
                res.write_hex_buf(&value.to_le_bytes());
                self.send_frame(res)?;
            }
            Err(code) => self.send_error(code)?,
        }
        Ok(Outcome::Handled)
    }

    /// `P nn=v`
    pub(crate) fn handle_write_register(
        &mut self,
        regno: usize,
        bytes: &[u8],
    ) -> Result<Outcome, GdbServerError<C::Error>> {
        if bytes.len() != arch::XLEN_BYTES {
            self.send_error(0x03)?;
            return Ok(Outcome::Handled);
        }
        let value = u32::from_le_bytes(bytes.try_into().unwrap());
        let write = self.target.write_register(regno, value);
        match self.check(write)? {
            Ok(()) => self.send_ok()?,
            Err(code) => self.send_error(code)?,
        }
        Ok(Outcome::Handled)
    }

    /// `m addr,len`: read through the matchpoint store so installed traps
    /// stay invisible.
    pub(crate) fn handle_read_memory(
        &mut self,
        addr: u32,
        len: usize,
    ) -> Result<Outcome, GdbServerError<C::Error>> {
        let len = len.min(MAX_PACKET_SIZE);
        let mut buf = vec![0u8; len];
        let read = self
            .matchpoints
            .read_through(&mut *self.target, addr, &mut buf);
        match self.check(read)? {
            Ok(0) if len > 0 => self.send_error(0x02)?,
            Ok(n) => {
                let mut res = ResponseWriter::new();
                res.write_hex_buf(&buf[..n]);
                self.send_frame(res)?;
            }
            Err(code) => self.send_error(code)?,
        }
        Ok(Outcome::Handled)
    }

    /// `M`/`X`: write through the matchpoint store so saved bytes track
    /// debugger writes without disarming traps.
    pub(crate) fn handle_write_memory(
        &mut self,
        addr: u32,
        data: &[u8],
    ) -> Result<Outcome, GdbServerError<C::Error>> {
        let write = self
            .matchpoints
            .write_through(&mut *self.target, addr, data);
        match self.check(write)? {
            Ok(n) if n == data.len() => self.send_ok()?,
            Ok(_) => self.send_error(0x02)?,
            Err(code) => self.send_error(code)?,
        }
        Ok(Outcome::Handled)
    }

    /// `qSupported`: record what the client can do, advertise what we can.
    pub(crate) fn handle_q_supported(
        &mut self,
        client_features: &[u8],
    ) -> Result<Outcome, GdbServerError<C::Error>> {
        for feature in client_features.split(|b| *b == b';') {
            match feature {
                b"swbreak+" => self.features.insert(ProtocolFeatures::CLIENT_SWBREAK),
                b"hwbreak+" => self.features.insert(ProtocolFeatures::CLIENT_HWBREAK),
                b"multiprocess+" => self.features.insert(ProtocolFeatures::CLIENT_MULTIPROCESS),
                _ => {}
            }
        }

        let mut res = ResponseWriter::new();
        res.write_str(&format!(
            "PacketSize={MAX_PACKET_SIZE:x};QStartNoAckMode+;multiprocess+;\
             swbreak+;hwbreak+;vContSupported+;qXfer:features:read+"
        ));
        self.send_frame(res)?;
        Ok(Outcome::Handled)
    }

    /// `qAttached`: we created the inferior rather than attaching, but
    /// reporting "attached" keeps GDB from killing it on quit.
    pub(crate) fn handle_q_attached(&mut self) -> Result<Outcome, GdbServerError<C::Error>> {
        let mut res = ResponseWriter::new();
        res.write_str("1");
        self.send_frame(res)?;
        Ok(Outcome::Handled)
    }

    /// `qC`
    pub(crate) fn handle_q_current_thread(&mut self) -> Result<Outcome, GdbServerError<C::Error>> {
        let mut res = ResponseWriter::new();
        if self.features.contains(ProtocolFeatures::CLIENT_MULTIPROCESS) {
            res.write_str("QCp1.1");
        } else {
            res.write_str("QC1");
        }
        self.send_frame(res)?;
        Ok(Outcome::Handled)
    }

    /// `qfThreadInfo`
    pub(crate) fn handle_q_thread_info_first(
        &mut self,
    ) -> Result<Outcome, GdbServerError<C::Error>> {
        let mut res = ResponseWriter::new();
        if self.features.contains(ProtocolFeatures::CLIENT_MULTIPROCESS) {
            res.write_str("mp1.1");
        } else {
            res.write_str("m1");
        }
        self.send_frame(res)?;
        Ok(Outcome::Handled)
    }

    /// `qsThreadInfo`: the one thread was already listed.
    pub(crate) fn handle_q_thread_info_next(
        &mut self,
    ) -> Result<Outcome, GdbServerError<C::Error>> {
        let mut res = ResponseWriter::new();
        res.write_str("l");
        self.send_frame(res)?;
        Ok(Outcome::Handled)
    }

    /// `k` / `vKill`: apply the kill policy.
    pub(crate) fn handle_kill(&mut self) -> Result<Outcome, GdbServerError<C::Error>> {
        match self.kill_behaviour {
            KillBehaviour::ExitOnKill => {
                // The debugger may drop the connection as soon as it sees
                // the reply, so don't insist on an ack.
                let mut res = ResponseWriter::new();
                res.write_str("OK");
                self.send_frame_unacked(res)?;
                Ok(Outcome::Disconnect(DisconnectReason::Kill))
            }
            KillBehaviour::ResetOnKill => {
                let reset = self.target.reset(ResetKind::Cold);
                self.matchpoints.discard();
                self.last_stop = None;
                match self.check(reset)? {
                    Ok(()) => self.send_ok()?,
                    Err(code) => self.send_error(code)?,
                }
                Ok(Outcome::Handled)
            }
        }
    }

    /// `D`: detach: restore all patched memory, reply, drop the session.
    pub(crate) fn handle_detach(&mut self) -> Result<Outcome, GdbServerError<C::Error>> {
        let removed = self.matchpoints.remove_all(&mut *self.target);
        if let Err(code) = self.check(removed)? {
            log::warn!(target: "break", "failed to restore breakpoints on detach (E{code:02x})");
        }

        let mut res = ResponseWriter::new();
        res.write_str("OK");
        self.send_frame_unacked(res)?;
        Ok(Outcome::Disconnect(DisconnectReason::Disconnect))
    }
}
