use std::io::Read;
use std::io::Write;
use std::sync::mpsc;
use std::sync::mpsc::Receiver;
use std::sync::mpsc::TryRecvError;

use crate::conn::Connection;
use crate::conn::ConnectionExt;

/// A [`Connection`] over the process's standard I/O streams, for use with the
/// `--stdin` transport mode.
///
/// `stdin` cannot be polled without consuming through the blocking std API,
/// so a dedicated reader thread drains it into a channel; `peek` then becomes
/// a `try_recv` plus a one-byte pushback slot. The thread exits when stdin
/// reaches EOF, which surfaces to the engine as a closed connection.
pub struct StdioConnection {
    rx: Receiver<u8>,
    peeked: Option<u8>,
    stdout: std::io::Stdout,
}

impl StdioConnection {
    pub fn new() -> StdioConnection {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || {
            let mut stdin = std::io::stdin();
            let mut buf = [0u8];
            loop {
                match stdin.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        if tx.send(buf[0]).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        StdioConnection {
            rx,
            peeked: None,
            stdout: std::io::stdout(),
        }
    }
}

impl Default for StdioConnection {
    fn default() -> Self {
        Self::new()
    }
}

fn closed() -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "stdin closed")
}

impl Connection for StdioConnection {
    type Error = std::io::Error;

    fn write(&mut self, byte: u8) -> Result<(), Self::Error> {
        self.stdout.write_all(&[byte])
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<(), Self::Error> {
        self.stdout.write_all(buf)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.stdout.flush()
    }
}

impl ConnectionExt for StdioConnection {
    fn read(&mut self) -> Result<u8, Self::Error> {
        if let Some(byte) = self.peeked.take() {
            return Ok(byte);
        }
        self.rx.recv().map_err(|_| closed())
    }

    fn peek(&mut self) -> Result<Option<u8>, Self::Error> {
        if self.peeked.is_none() {
            self.peeked = match self.rx.try_recv() {
                Ok(byte) => Some(byte),
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => return Err(closed()),
            };
        }
        Ok(self.peeked)
    }
}
