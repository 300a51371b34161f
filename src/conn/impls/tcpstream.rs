use std::io::Read;
use std::io::Write;
use std::net::TcpStream;

use crate::conn::Connection;
use crate::conn::ConnectionExt;

/// Non-blocking probe for a pending byte.
///
/// The socket lives in blocking mode (established at session start, so
/// `read` can simply block); this flips it to non-blocking just for the
/// probe and restores it before returning. MSG_PEEK leaves the byte queued
/// for the next `read`.
fn probe(stream: &TcpStream) -> std::io::Result<Option<u8>> {
    stream.set_nonblocking(true)?;

    let mut byte = [0u8; 1];
    let pending = match stream.peek(&mut byte) {
        // A readable socket yielding zero bytes is the peer hanging up.
        Ok(0) => Err(std::io::ErrorKind::UnexpectedEof.into()),
        Ok(_) => Ok(Some(byte[0])),
        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
        Err(e) => Err(e),
    };

    stream.set_nonblocking(false)?;
    pending
}

impl Connection for TcpStream {
    type Error = std::io::Error;

    fn write(&mut self, byte: u8) -> Result<(), Self::Error> {
        Write::write_all(self, &[byte])
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<(), Self::Error> {
        Write::write_all(self, buf)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Write::flush(self)
    }

    fn on_session_start(&mut self) -> Result<(), Self::Error> {
        // Replies are a handful of bytes each; leaving Nagle's algorithm on
        // batches them behind the peer's acks and wrecks stepping latency.
        self.set_nodelay(true)?;
        // Establish the blocking-read invariant `probe` relies on.
        self.set_nonblocking(false)
    }
}

impl ConnectionExt for TcpStream {
    fn read(&mut self) -> Result<u8, Self::Error> {
        let mut byte = [0u8; 1];
        Read::read_exact(self, &mut byte)?;
        Ok(byte[0])
    }

    fn peek(&mut self) -> Result<Option<u8>, Self::Error> {
        probe(self)
    }
}
