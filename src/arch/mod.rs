//! RV32 architecture facts: the RSP register numbering, the trap and
//! system-call opcodes, and the target-description XML served over
//! `qXfer:features:read`.

/// Register numbering follows the GDB RISC-V layout: x0-x31 then the program
/// counter as register 32.
pub const NUM_REGS: usize = 33;
pub const PC_REGNUM: usize = 32;

/// Bytes per register for the advertised XLEN (RV32).
pub const XLEN_BYTES: usize = 4;

/// ABI register numbers the File-I/O plumbing needs.
pub const REG_A0: usize = 10;
pub const REG_A1: usize = 11;
pub const REG_A2: usize = 12;
pub const REG_A7: usize = 17;

/// `ebreak`
pub const EBREAK: u32 = 0x0010_0073;
/// `c.ebreak`
pub const C_EBREAK: u16 = 0x9002;
/// `ecall`
pub const ECALL: u32 = 0x0000_0073;

/// An instruction is compressed iff its low two bits are not `11`.
pub fn insn_is_compressed(first_half: u16) -> bool {
    first_half & 0b11 != 0b11
}

/// Target description served for the `target.xml` annex.
pub static TARGET_XML: &str = include_str!("rv32i.xml");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compressed_detection() {
        assert!(insn_is_compressed(C_EBREAK));
        assert!(!insn_is_compressed((EBREAK & 0xffff) as u16));
    }

    #[test]
    fn target_xml_advertises_rv32() {
        assert!(TARGET_XML.contains("riscv:rv32"));
        assert!(TARGET_XML.contains("name=\"pc\""));
    }
}
