use std::collections::VecDeque;

use crate::conn::Connection;
use crate::conn::ConnectionExt;

/// An in-memory [`Connection`] fed from a pre-scripted byte sequence.
///
/// Exists so the full engine can be exercised without a socket: the
/// test-suite scripts the debugger's side of the conversation up front, runs
/// a session to completion, and inspects everything the server wrote.
/// Reading past the end of the script reports a closed connection.
pub struct InMemoryPipe {
    input: VecDeque<u8>,
    output: Vec<u8>,
}

impl InMemoryPipe {
    /// Create a pipe whose read side will yield `script`, byte by byte.
    pub fn new(script: &[u8]) -> InMemoryPipe {
        InMemoryPipe {
            input: script.iter().copied().collect(),
            output: Vec::new(),
        }
    }

    /// Everything the server has written so far.
    pub fn sent(&self) -> &[u8] {
        &self.output
    }

    /// Append more scripted debugger input.
    pub fn push_input(&mut self, bytes: &[u8]) {
        self.input.extend(bytes.iter().copied());
    }
}

fn out_of_script() -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "end of scripted input")
}

impl Connection for InMemoryPipe {
    type Error = std::io::Error;

    fn write(&mut self, byte: u8) -> Result<(), Self::Error> {
        self.output.push(byte);
        Ok(())
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<(), Self::Error> {
        self.output.extend_from_slice(buf);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl ConnectionExt for InMemoryPipe {
    fn read(&mut self) -> Result<u8, Self::Error> {
        self.input.pop_front().ok_or_else(out_of_script)
    }

    fn peek(&mut self) -> Result<Option<u8>, Self::Error> {
        Ok(self.input.front().copied())
    }
}
