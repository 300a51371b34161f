//! Traits to perform in-order, serial, byte-wise I/O with the debugger.

mod impls;

pub use impls::InMemoryPipe;
pub use impls::StdioConnection;

/// A trait to perform in-order, serial, byte-wise I/O.
///
/// This is the only interface the server requires of its transport: a
/// reliable ordered octet stream. It is implemented for
/// [`TcpStream`](std::net::TcpStream), for a stdin/stdout pair
/// ([`StdioConnection`]), and for the in-memory [`InMemoryPipe`] used by the
/// test-suite.
pub trait Connection {
    /// Transport-specific error type.
    type Error;

    /// Write a single byte.
    fn write(&mut self, byte: u8) -> Result<(), Self::Error>;

    /// Write the entire buffer, blocking until complete.
    ///
    /// This method's default implementation calls `self.write()` on each byte
    /// in the buffer. If a more efficient implementation exists (such as
    /// calling `write_all()` on an underlying `std::io::Write` object), this
    /// method should be overwritten.
    fn write_all(&mut self, buf: &[u8]) -> Result<(), Self::Error> {
        for b in buf {
            self.write(*b)?;
        }
        Ok(())
    }

    /// Flush this Connection, ensuring that all intermediately buffered
    /// contents reach their destination.
    fn flush(&mut self) -> Result<(), Self::Error>;

    /// Called once when a debugging session begins, _before_ any RSP packets
    /// have been exchanged.
    ///
    /// This method's default implementation is a no-op.
    fn on_session_start(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Extends [`Connection`] with `read` and `peek` methods.
pub trait ConnectionExt: Connection {
    /// Read a single byte, blocking until one is available.
    fn read(&mut self) -> Result<u8, Self::Error>;

    /// Peek a single byte. This MUST be a **non-blocking** operation,
    /// returning `None` if no byte is available.
    ///
    /// Returns a byte (if one is available) without removing that byte from
    /// the queue. Subsequent calls to `peek` MUST return the same byte.
    ///
    /// The engine relies on this to notice a `0x03` interrupt while a resume
    /// is in flight.
    fn peek(&mut self) -> Result<Option<u8>, Self::Error>;
}
