//! `qXfer:features:read`: stream the target description.

use crate::arch;
use crate::conn::ConnectionExt;
use crate::protocol::ResponseWriter;
use crate::stub::GdbServer;
use crate::stub::GdbServerError;
use crate::stub::Outcome;

impl<'t, C: ConnectionExt> GdbServer<'t, C> {
    pub(crate) fn handle_xfer_features_read(
        &mut self,
        annex: &[u8],
        offset: usize,
        length: usize,
    ) -> Result<Outcome, GdbServerError<C::Error>> {
        if annex != b"target.xml" {
            let mut res = ResponseWriter::new();
            res.write_str("E00");
            self.send_frame(res)?;
            return Ok(Outcome::Handled);
        }

        let xml = arch::TARGET_XML.as_bytes();
        let mut res = ResponseWriter::new();

        if offset >= xml.len() {
            res.write(b'l');
        } else {
            let end = (offset + length).min(xml.len());
            // 'm' promises more data past this window, 'l' is the last one.
            res.write(if end < xml.len() { b'm' } else { b'l' });
            res.write_all(&xml[offset..end]);
        }

        self.send_frame(res)?;
        Ok(Outcome::Handled)
    }
}
