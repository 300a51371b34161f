//! Software-breakpoint bookkeeping for targets without a debug unit.
//!
//! When a back-end declines `insert_matchpoint`, the engine plants the trap
//! instruction itself and records the displaced bytes here. Every memory
//! access the debugger makes is routed through this store so GDB, which
//! habitually re-reads instructions it has just patched, always sees the
//! program's original bytes, never the trap.

use std::collections::HashMap;

use crate::arch;
use crate::target::Target;
use crate::target::TargetError;
use crate::target::TargetResult;

struct SavedBytes {
    bytes: Vec<u8>,
}

/// Records software breakpoints by address: the displaced original bytes,
/// with the matching-width trap opcode installed in their place.
#[derive(Default)]
pub struct MatchpointStore {
    saved: HashMap<u32, SavedBytes>,
}

/// The trap opcode of the same width as the displaced instruction.
fn trap_opcode(len: usize) -> Vec<u8> {
    if len == 2 {
        arch::C_EBREAK.to_le_bytes().to_vec()
    } else {
        arch::EBREAK.to_le_bytes().to_vec()
    }
}

impl MatchpointStore {
    pub fn new() -> MatchpointStore {
        MatchpointStore::default()
    }

    /// Install a software breakpoint: save `len` bytes at `addr` and write
    /// the trap opcode over them. Re-inserting an existing breakpoint is a
    /// no-op.
    pub fn insert(&mut self, target: &mut dyn Target, addr: u32, len: usize) -> TargetResult<()> {
        if self.saved.contains_key(&addr) {
            return Ok(());
        }

        let len = if len == 2 { 2 } else { 4 };
        let mut original = vec![0u8; len];
        if target.read_memory(addr, &mut original)? != len {
            return Err(TargetError::BadAddress);
        }

        let trap = trap_opcode(len);
        if target.write_memory(addr, &trap)? != len {
            return Err(TargetError::BadAddress);
        }

        log::trace!(target: "break", "swbreak set at {addr:#010x} over {original:02x?}");
        self.saved.insert(addr, SavedBytes { bytes: original });
        Ok(())
    }

    /// Remove a software breakpoint, restoring the displaced bytes. Removing
    /// an address with no breakpoint succeeds (GDB may re-issue removals).
    pub fn remove(&mut self, target: &mut dyn Target, addr: u32) -> TargetResult<()> {
        if let Some(saved) = self.saved.remove(&addr) {
            target.write_memory(addr, &saved.bytes)?;
            log::trace!(target: "break", "swbreak cleared at {addr:#010x}");
        }
        Ok(())
    }

    /// Restore every breakpoint's original bytes and forget them (detach).
    pub fn remove_all(&mut self, target: &mut dyn Target) -> TargetResult<()> {
        let addrs: Vec<u32> = self.saved.keys().copied().collect();
        for addr in addrs {
            self.remove(target, addr)?;
        }
        Ok(())
    }

    /// Forget every breakpoint without touching memory (the target was just
    /// reset underneath us).
    pub fn discard(&mut self) {
        self.saved.clear();
    }

    /// Read memory through the store: the target's bytes, with any displaced
    /// originals overlaid so installed traps are invisible.
    pub fn read_through(
        &self,
        target: &mut dyn Target,
        addr: u32,
        buf: &mut [u8],
    ) -> TargetResult<usize> {
        let n = target.read_memory(addr, buf)?;
        let read_end = addr as u64 + n as u64;

        for (&bp_addr, saved) in &self.saved {
            let bp_end = bp_addr as u64 + saved.bytes.len() as u64;
            if bp_end <= addr as u64 || bp_addr as u64 >= read_end {
                continue;
            }
            for (i, byte) in saved.bytes.iter().enumerate() {
                let pos = bp_addr as u64 + i as u64;
                if pos >= addr as u64 && pos < read_end {
                    buf[(pos - addr as u64) as usize] = *byte;
                }
            }
        }

        Ok(n)
    }

    /// Write memory through the store: bytes landing on a displaced region
    /// update the saved copy, while the installed trap stays armed.
    pub fn write_through(
        &mut self,
        target: &mut dyn Target,
        addr: u32,
        data: &[u8],
    ) -> TargetResult<usize> {
        let n = target.write_memory(addr, data)?;
        let write_end = addr as u64 + n as u64;

        for (&bp_addr, saved) in self.saved.iter_mut() {
            let len = saved.bytes.len();
            let bp_end = bp_addr as u64 + len as u64;
            if bp_end <= addr as u64 || bp_addr as u64 >= write_end {
                continue;
            }

            // Capture the debugger's bytes into the saved copy, then re-arm
            // the trap the write just clobbered.
            for (i, byte) in saved.bytes.iter_mut().enumerate() {
                let pos = bp_addr as u64 + i as u64;
                if pos >= addr as u64 && pos < write_end {
                    *byte = data[(pos - addr as u64) as usize];
                }
            }
            let trap = trap_opcode(len);
            target.write_memory(bp_addr, &trap)?;
        }

        Ok(n)
    }

    pub fn contains(&self, addr: u32) -> bool {
        self.saved.contains_key(&addr)
    }
}
