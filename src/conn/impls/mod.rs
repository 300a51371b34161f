mod memory;
mod stdio;
mod tcpstream;

pub use memory::InMemoryPipe;
pub use stdio::StdioConnection;
