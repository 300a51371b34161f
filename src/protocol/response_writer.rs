/// Builds an outgoing RSP packet, computing the single-byte checksum as
/// payload bytes are appended.
///
/// The writer renders into an owned buffer rather than straight onto the
/// connection: the engine must hold the finished frame anyway, so it can be
/// retransmitted verbatim if the peer naks.
pub struct ResponseWriter {
    payload: Vec<u8>,
    checksum: u8,
}

impl ResponseWriter {
    pub fn new() -> ResponseWriter {
        ResponseWriter {
            payload: Vec::new(),
            checksum: 0,
        }
    }

    /// Consumes self, returning the complete `$<payload>#<hh>` frame.
    pub fn finish(self) -> Vec<u8> {
        log::trace!(
            target: "rsp",
            "--> ${}#{:02x}",
            String::from_utf8_lossy(&self.payload),
            self.checksum
        );

        let mut frame = Vec::with_capacity(self.payload.len() + 4);
        frame.push(b'$');
        frame.extend_from_slice(&self.payload);
        frame.push(b'#');
        frame.extend_from_slice(format!("{:02x}", self.checksum).as_bytes());
        frame
    }

    /// Write a single payload byte, escaping it if it collides with a frame
    /// metacharacter.
    pub fn write(&mut self, byte: u8) {
        match byte {
            b'$' | b'#' | b'*' | b'}' => {
                self.push_raw(b'}');
                self.push_raw(byte ^ 0x20);
            }
            _ => self.push_raw(byte),
        }
    }

    pub fn write_all(&mut self, data: &[u8]) {
        for b in data {
            self.write(*b);
        }
    }

    pub fn write_str(&mut self, s: &str) {
        self.write_all(s.as_bytes());
    }

    /// Write a single byte as two lowercase hex digits.
    pub fn write_hex(&mut self, byte: u8) {
        const DIGITS: &[u8; 16] = b"0123456789abcdef";
        self.push_raw(DIGITS[(byte >> 4) as usize]);
        self.push_raw(DIGITS[(byte & 0xf) as usize]);
    }

    /// Write an entire buffer as a hex string (two chars per byte).
    pub fn write_hex_buf(&mut self, data: &[u8]) {
        for b in data {
            self.write_hex(*b);
        }
    }

    /// Write a number as big-endian hex with no leading zeroes.
    pub fn write_num(&mut self, value: u64) {
        self.write_str(&format!("{value:x}"));
    }

    fn push_raw(&mut self, byte: u8) {
        self.checksum = self.checksum.wrapping_add(byte);
        self.payload.push(byte);
    }
}

impl Default for ResponseWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_reply() {
        let res = ResponseWriter::new();
        assert_eq!(res.finish(), b"$#00");
    }

    #[test]
    fn checksum_matches_payload_sum() {
        let mut res = ResponseWriter::new();
        res.write_str("S05");
        assert_eq!(res.finish(), b"$S05#b8");
    }

    #[test]
    fn metacharacters_are_escaped() {
        let mut res = ResponseWriter::new();
        res.write(b'}');
        let frame = res.finish();
        // '}' 0x7d -> "} ]" (0x7d, 0x5d); checksum = 0x7d + 0x5d = 0xda
        assert_eq!(frame, b"$}]#da");
    }

    #[test]
    fn hex_rendering_is_lowercase() {
        let mut res = ResponseWriter::new();
        res.write_hex_buf(&[0xde, 0xad]);
        let frame = res.finish();
        assert!(frame.starts_with(b"$dead#"));
    }
}
