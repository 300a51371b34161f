use crate::protocol::MAX_PACKET_SIZE;

/// Something the decoder surfaced from the raw byte stream.
#[derive(Debug, PartialEq, Eq)]
pub enum RecvEvent {
    /// A complete frame whose checksum verified. The payload has already had
    /// `}`-escapes and run-length sequences decoded.
    Packet(Vec<u8>),
    /// A complete frame whose checksum did not verify, or that was otherwise
    /// malformed (bad escape, oversize). The engine naks and the peer
    /// retransmits.
    Corrupt,
    /// A bare `+` acknowledgement.
    Ack,
    /// A bare `-`, requesting retransmission of our last packet.
    Nack,
    /// A bare `0x03` outside any frame.
    Interrupt,
}

enum State {
    Idle,
    InPayload,
    InEscape,
    InRunLength,
    InChecksumHi,
    InChecksumLo,
}

/// Receives a packet incrementally using a streaming state machine, so the
/// engine never blocks on a partial frame.
///
/// Checksums cover the payload bytes *as transmitted* (escapes and run-length
/// markers included), so the running sum is updated before any decoding.
pub struct RecvPacketStateMachine {
    state: State,
    payload: Vec<u8>,
    checksum: u8,
    sent_checksum: u8,
    malformed: bool,
}

impl RecvPacketStateMachine {
    pub fn new() -> RecvPacketStateMachine {
        RecvPacketStateMachine {
            state: State::Idle,
            payload: Vec::new(),
            checksum: 0,
            sent_checksum: 0,
            malformed: false,
        }
    }

    fn start_frame(&mut self) {
        self.state = State::InPayload;
        self.payload.clear();
        self.checksum = 0;
        self.malformed = false;
    }

    /// Pump a single byte through the decoder, possibly completing an event.
    pub fn pump(&mut self, byte: u8) -> Option<RecvEvent> {
        match self.state {
            State::Idle => match byte {
                b'$' => {
                    self.start_frame();
                    None
                }
                b'+' => Some(RecvEvent::Ack),
                b'-' => Some(RecvEvent::Nack),
                0x03 => Some(RecvEvent::Interrupt),
                // Line noise between frames is discarded.
                _ => None,
            },
            State::InPayload => {
                match byte {
                    // A '$' mid-frame means we lost sync; resynchronise on
                    // the new frame and let the peer's retry recover the old
                    // one.
                    b'$' => self.start_frame(),
                    b'#' => self.state = State::InChecksumHi,
                    b'}' => {
                        self.checksum = self.checksum.wrapping_add(byte);
                        self.state = State::InEscape;
                    }
                    b'*' => {
                        self.checksum = self.checksum.wrapping_add(byte);
                        if self.payload.is_empty() {
                            self.malformed = true;
                        }
                        self.state = State::InRunLength;
                    }
                    _ => {
                        self.checksum = self.checksum.wrapping_add(byte);
                        self.push(byte);
                    }
                }
                None
            }
            State::InEscape => {
                self.checksum = self.checksum.wrapping_add(byte);
                self.push(byte ^ 0x20);
                self.state = State::InPayload;
                None
            }
            State::InRunLength => {
                self.checksum = self.checksum.wrapping_add(byte);
                // `X*n` denotes X repeated n-28 times; X itself is already in
                // the buffer, so append the remaining n-29 copies.
                match (byte.checked_sub(29), self.payload.last().copied()) {
                    (Some(extra), Some(run_byte)) => {
                        for _ in 0..extra {
                            self.push(run_byte);
                        }
                    }
                    _ => self.malformed = true,
                }
                self.state = State::InPayload;
                None
            }
            State::InChecksumHi => {
                self.sent_checksum = hex_digit(byte).unwrap_or_else(|| {
                    self.malformed = true;
                    0
                }) << 4;
                self.state = State::InChecksumLo;
                None
            }
            State::InChecksumLo => {
                self.sent_checksum |= hex_digit(byte).unwrap_or_else(|| {
                    self.malformed = true;
                    0
                });
                self.state = State::Idle;

                if self.malformed || self.sent_checksum != self.checksum {
                    log::debug!(
                        "dropped corrupt frame (checksum sent {:02x}, calculated {:02x})",
                        self.sent_checksum,
                        self.checksum
                    );
                    return Some(RecvEvent::Corrupt);
                }

                let payload = std::mem::take(&mut self.payload);
                log::trace!(
                    target: "rsp",
                    "<-- ${}#{:02x}",
                    String::from_utf8_lossy(&payload),
                    self.sent_checksum
                );
                Some(RecvEvent::Packet(payload))
            }
        }
    }

    fn push(&mut self, byte: u8) {
        if self.payload.len() >= MAX_PACKET_SIZE {
            self.malformed = true;
        } else {
            self.payload.push(byte);
        }
    }
}

fn hex_digit(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}
