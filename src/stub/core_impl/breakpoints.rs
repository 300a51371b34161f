//! `Z`/`z` matchpoint management.

use crate::conn::ConnectionExt;
use crate::protocol::commands::MatchpointSpec;
use crate::stub::GdbServer;
use crate::stub::GdbServerError;
use crate::stub::Outcome;
use crate::target::MatchKind;

impl<'t, C: ConnectionExt> GdbServer<'t, C> {
    /// `Z k,addr,len`: offer the matchpoint to the target; if it declines a
    /// software breakpoint, plant one ourselves through memory.
    pub(crate) fn handle_insert_matchpoint(
        &mut self,
        spec: MatchpointSpec,
    ) -> Result<Outcome, GdbServerError<C::Error>> {
        let kind = match MatchKind::from_rsp_type(spec.ty) {
            Some(kind) => kind,
            None => {
                log::warn!(target: "break", "unknown matchpoint type {}", spec.ty);
                self.send_empty()?;
                return Ok(Outcome::Handled);
            }
        };

        let inserted = self.target.insert_matchpoint(spec.addr, kind, spec.len);
        match self.check(inserted)? {
            Ok(true) => self.send_ok()?,
            Ok(false) if kind == MatchKind::SwBreak => {
                let planted = self
                    .matchpoints
                    .insert(&mut *self.target, spec.addr, spec.len);
                match self.check(planted)? {
                    Ok(()) => self.send_ok()?,
                    Err(code) => self.send_error(code)?,
                }
            }
            // No hardware support and no software fallback: empty reply
            // tells GDB the packet is unsupported.
            Ok(false) => self.send_empty()?,
            Err(code) => self.send_error(code)?,
        }
        Ok(Outcome::Handled)
    }

    /// `z k,addr,len`
    pub(crate) fn handle_remove_matchpoint(
        &mut self,
        spec: MatchpointSpec,
    ) -> Result<Outcome, GdbServerError<C::Error>> {
        let kind = match MatchKind::from_rsp_type(spec.ty) {
            Some(kind) => kind,
            None => {
                self.send_empty()?;
                return Ok(Outcome::Handled);
            }
        };

        // Ours first: a software breakpoint the target declined never made
        // it into the target's own bookkeeping.
        if kind == MatchKind::SwBreak && self.matchpoints.contains(spec.addr) {
            let removed = self.matchpoints.remove(&mut *self.target, spec.addr);
            match self.check(removed)? {
                Ok(()) => self.send_ok()?,
                Err(code) => self.send_error(code)?,
            }
            return Ok(Outcome::Handled);
        }

        let removed = self.target.remove_matchpoint(spec.addr, kind, spec.len);
        match self.check(removed)? {
            // GDB may remove matchpoints it never successfully set; both
            // answers are a success.
            Ok(_) => self.send_ok()?,
            Err(code) => self.send_error(code)?,
        }
        Ok(Outcome::Handled)
    }
}
