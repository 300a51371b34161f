//! `QStartNoAckMode`.

use crate::conn::ConnectionExt;
use crate::stub::GdbServer;
use crate::stub::GdbServerError;
use crate::stub::Outcome;
use crate::stub::ProtocolFeatures;

impl<'t, C: ConnectionExt> GdbServer<'t, C> {
    pub(crate) fn handle_start_no_ack_mode(
        &mut self,
    ) -> Result<Outcome, GdbServerError<C::Error>> {
        // The OK itself is still exchanged under the old regime; the ack for
        // it is consumed inside send_frame, and everything after runs bare.
        self.send_ok()?;
        self.features.insert(ProtocolFeatures::NO_ACK_MODE);
        log::debug!(target: "rsp", "no-ack mode on");
        Ok(Outcome::Handled)
    }
}
