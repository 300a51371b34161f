//! RV32IMC decode and execute.

use super::Simulator;
use super::Trap;

fn sext(value: u32, bits: u32) -> u32 {
    (((value << (32 - bits)) as i32) >> (32 - bits)) as u32
}

fn imm_i(insn: u32) -> u32 {
    sext(insn >> 20, 12)
}

fn imm_s(insn: u32) -> u32 {
    sext(((insn >> 20) & 0xfe0) | ((insn >> 7) & 0x1f), 12)
}

fn imm_b(insn: u32) -> u32 {
    sext(
        ((insn >> 19) & 0x1000) | ((insn << 4) & 0x800) | ((insn >> 20) & 0x7e0)
            | ((insn >> 7) & 0x1e),
        13,
    )
}

fn imm_u(insn: u32) -> u32 {
    insn & 0xffff_f000
}

fn imm_j(insn: u32) -> u32 {
    sext(
        ((insn >> 11) & 0x10_0000) | (insn & 0xf_f000) | ((insn >> 9) & 0x800)
            | ((insn >> 20) & 0x7fe),
        21,
    )
}

impl Simulator {
    pub(crate) fn exec32(&mut self, insn: u32) -> Result<(), Trap> {
        let rd = ((insn >> 7) & 0x1f) as usize;
        let rs1 = ((insn >> 15) & 0x1f) as usize;
        let rs2 = ((insn >> 20) & 0x1f) as usize;
        let funct3 = (insn >> 12) & 0x7;
        let funct7 = insn >> 25;

        let a = self.x[rs1];
        let b = self.x[rs2];
        let mut next_pc = self.pc.wrapping_add(4);

        match insn & 0x7f {
            // lui
            0x37 => self.x[rd] = imm_u(insn),
            // auipc
            0x17 => self.x[rd] = self.pc.wrapping_add(imm_u(insn)),
            // jal
            0x6f => {
                self.x[rd] = next_pc;
                next_pc = self.pc.wrapping_add(imm_j(insn));
            }
            // jalr
            0x67 => {
                let target = a.wrapping_add(imm_i(insn)) & !1;
                self.x[rd] = next_pc;
                next_pc = target;
            }
            // branches
            0x63 => {
                let taken = match funct3 {
                    0b000 => a == b,
                    0b001 => a != b,
                    0b100 => (a as i32) < (b as i32),
                    0b101 => (a as i32) >= (b as i32),
                    0b110 => a < b,
                    0b111 => a >= b,
                    _ => return Err(Trap::Illegal),
                };
                if taken {
                    next_pc = self.pc.wrapping_add(imm_b(insn));
                }
            }
            // loads
            0x03 => {
                let addr = a.wrapping_add(imm_i(insn));
                self.x[rd] = match funct3 {
                    0b000 => sext(self.load(addr, 1)?, 8),
                    0b001 => sext(self.load(addr, 2)?, 16),
                    0b010 => self.load(addr, 4)?,
                    0b100 => self.load(addr, 1)?,
                    0b101 => self.load(addr, 2)?,
                    _ => return Err(Trap::Illegal),
                };
            }
            // stores
            0x23 => {
                let addr = a.wrapping_add(imm_s(insn));
                match funct3 {
                    0b000 => self.store(addr, b, 1)?,
                    0b001 => self.store(addr, b, 2)?,
                    0b010 => self.store(addr, b, 4)?,
                    _ => return Err(Trap::Illegal),
                }
            }
            // op-imm
            0x13 => {
                let imm = imm_i(insn);
                let shamt = (imm & 0x1f) as u32;
                self.x[rd] = match funct3 {
                    0b000 => a.wrapping_add(imm),
                    0b010 => ((a as i32) < (imm as i32)) as u32,
                    0b011 => (a < imm) as u32,
                    0b100 => a ^ imm,
                    0b110 => a | imm,
                    0b111 => a & imm,
                    0b001 => a << shamt,
                    0b101 => {
                        if imm & 0x400 != 0 {
                            ((a as i32) >> shamt) as u32
                        } else {
                            a >> shamt
                        }
                    }
                    _ => return Err(Trap::Illegal),
                };
            }
            // op (including the M extension at funct7 = 0000001)
            0x33 => {
                self.x[rd] = if funct7 == 0x01 {
                    match funct3 {
                        0b000 => a.wrapping_mul(b),
                        0b001 => (((a as i32 as i64) * (b as i32 as i64)) >> 32) as u32,
                        0b010 => (((a as i32 as i64) * (b as u64 as i64)) >> 32) as u32,
                        0b011 => (((a as u64) * (b as u64)) >> 32) as u32,
                        0b100 => {
                            if b == 0 {
                                u32::MAX
                            } else {
                                (a as i32).wrapping_div(b as i32) as u32
                            }
                        }
                        0b101 => {
                            if b == 0 {
                                u32::MAX
                            } else {
                                a / b
                            }
                        }
                        0b110 => {
                            if b == 0 {
                                a
                            } else {
                                (a as i32).wrapping_rem(b as i32) as u32
                            }
                        }
                        0b111 => {
                            if b == 0 {
                                a
                            } else {
                                a % b
                            }
                        }
                        _ => return Err(Trap::Illegal),
                    }
                } else {
                    match (funct3, funct7) {
                        (0b000, 0x00) => a.wrapping_add(b),
                        (0b000, 0x20) => a.wrapping_sub(b),
                        (0b001, 0x00) => a << (b & 0x1f),
                        (0b010, 0x00) => ((a as i32) < (b as i32)) as u32,
                        (0b011, 0x00) => (a < b) as u32,
                        (0b100, 0x00) => a ^ b,
                        (0b101, 0x00) => a >> (b & 0x1f),
                        (0b101, 0x20) => ((a as i32) >> (b & 0x1f)) as u32,
                        (0b110, 0x00) => a | b,
                        (0b111, 0x00) => a & b,
                        _ => return Err(Trap::Illegal),
                    }
                };
            }
            // fence / fence.i: no-ops for a single in-order hart
            0x0f => {}
            // system: the counter CSRs; writes are dropped
            0x73 => {
                let csr = insn >> 20;
                match funct3 {
                    0b001 | 0b010 | 0b011 | 0b101 | 0b110 | 0b111 => {
                        self.x[rd] = self.read_csr(csr);
                    }
                    _ => return Err(Trap::Illegal),
                }
            }
            _ => return Err(Trap::Illegal),
        }

        self.pc = next_pc;
        Ok(())
    }

    pub(crate) fn exec16(&mut self, insn: u16) -> Result<(), Trap> {
        let insn = insn as u32;
        let funct3 = (insn >> 13) & 0x7;
        let mut next_pc = self.pc.wrapping_add(2);

        // x8-x15, the registers the three-bit fields can name
        let r_ = |field: u32| (8 + (field & 0x7)) as usize;

        match insn & 0b11 {
            0b00 => match funct3 {
                // c.addi4spn
                0b000 => {
                    let nzuimm = ((insn >> 7) & 0x30) | ((insn >> 1) & 0x3c0) | ((insn >> 4) & 0x4)
                        | ((insn >> 2) & 0x8);
                    if nzuimm == 0 {
                        return Err(Trap::Illegal);
                    }
                    self.x[r_(insn >> 2)] = self.x[2].wrapping_add(nzuimm);
                }
                // c.lw
                0b010 => {
                    let uimm =
                        ((insn >> 7) & 0x38) | ((insn >> 4) & 0x4) | ((insn << 1) & 0x40);
                    let addr = self.x[r_(insn >> 7)].wrapping_add(uimm);
                    self.x[r_(insn >> 2)] = self.load(addr, 4)?;
                }
                // c.sw
                0b110 => {
                    let uimm =
                        ((insn >> 7) & 0x38) | ((insn >> 4) & 0x4) | ((insn << 1) & 0x40);
                    let addr = self.x[r_(insn >> 7)].wrapping_add(uimm);
                    self.store(addr, self.x[r_(insn >> 2)], 4)?;
                }
                _ => return Err(Trap::Illegal),
            },
            0b01 => match funct3 {
                // c.addi (c.nop when rd = 0)
                0b000 => {
                    let rd = ((insn >> 7) & 0x1f) as usize;
                    let imm = sext(((insn >> 7) & 0x20) | ((insn >> 2) & 0x1f), 6);
                    if rd != 0 {
                        self.x[rd] = self.x[rd].wrapping_add(imm);
                    }
                }
                // c.jal
                0b001 => {
                    self.x[1] = next_pc;
                    next_pc = self.pc.wrapping_add(cj_imm(insn));
                }
                // c.li
                0b010 => {
                    let rd = ((insn >> 7) & 0x1f) as usize;
                    self.x[rd] = sext(((insn >> 7) & 0x20) | ((insn >> 2) & 0x1f), 6);
                }
                // c.addi16sp / c.lui
                0b011 => {
                    let rd = ((insn >> 7) & 0x1f) as usize;
                    if rd == 2 {
                        let imm = sext(
                            ((insn >> 3) & 0x200) | ((insn >> 2) & 0x10) | ((insn << 1) & 0x40)
                                | ((insn << 4) & 0x180)
                                | ((insn << 3) & 0x20),
                            10,
                        );
                        if imm == 0 {
                            return Err(Trap::Illegal);
                        }
                        self.x[2] = self.x[2].wrapping_add(imm);
                    } else {
                        let imm = sext(((insn >> 7) & 0x20) | ((insn >> 2) & 0x1f), 6) << 12;
                        if imm == 0 {
                            return Err(Trap::Illegal);
                        }
                        self.x[rd] = imm;
                    }
                }
                // c.srli / c.srai / c.andi / c.sub / c.xor / c.or / c.and
                0b100 => {
                    let rd = r_(insn >> 7);
                    match (insn >> 10) & 0x3 {
                        0b00 => {
                            let shamt = ((insn >> 7) & 0x20) | ((insn >> 2) & 0x1f);
                            if shamt >= 32 {
                                return Err(Trap::Illegal);
                            }
                            self.x[rd] >>= shamt;
                        }
                        0b01 => {
                            let shamt = ((insn >> 7) & 0x20) | ((insn >> 2) & 0x1f);
                            if shamt >= 32 {
                                return Err(Trap::Illegal);
                            }
                            self.x[rd] = ((self.x[rd] as i32) >> shamt) as u32;
                        }
                        0b10 => {
                            let imm = sext(((insn >> 7) & 0x20) | ((insn >> 2) & 0x1f), 6);
                            self.x[rd] &= imm;
                        }
                        _ => {
                            let rs2 = r_(insn >> 2);
                            if insn & 0x1000 != 0 {
                                return Err(Trap::Illegal);
                            }
                            self.x[rd] = match (insn >> 5) & 0x3 {
                                0b00 => self.x[rd].wrapping_sub(self.x[rs2]),
                                0b01 => self.x[rd] ^ self.x[rs2],
                                0b10 => self.x[rd] | self.x[rs2],
                                _ => self.x[rd] & self.x[rs2],
                            };
                        }
                    }
                }
                // c.j
                0b101 => next_pc = self.pc.wrapping_add(cj_imm(insn)),
                // c.beqz / c.bnez
                0b110 | 0b111 => {
                    let taken = (self.x[r_(insn >> 7)] == 0) == (funct3 == 0b110);
                    if taken {
                        next_pc = self.pc.wrapping_add(cb_imm(insn));
                    }
                }
                _ => return Err(Trap::Illegal),
            },
            0b10 => match funct3 {
                // c.slli
                0b000 => {
                    let rd = ((insn >> 7) & 0x1f) as usize;
                    let shamt = ((insn >> 7) & 0x20) | ((insn >> 2) & 0x1f);
                    if shamt >= 32 {
                        return Err(Trap::Illegal);
                    }
                    if rd != 0 {
                        self.x[rd] <<= shamt;
                    }
                }
                // c.lwsp
                0b010 => {
                    let rd = ((insn >> 7) & 0x1f) as usize;
                    let uimm =
                        ((insn >> 7) & 0x20) | ((insn >> 2) & 0x1c) | ((insn << 4) & 0xc0);
                    self.x[rd] = self.load(self.x[2].wrapping_add(uimm), 4)?;
                }
                // c.jr / c.mv / c.jalr / c.add (c.ebreak is intercepted by the
                // fetch path before execution)
                0b100 => {
                    let rs1 = ((insn >> 7) & 0x1f) as usize;
                    let rs2 = ((insn >> 2) & 0x1f) as usize;
                    match (insn & 0x1000 != 0, rs2) {
                        (false, 0) => {
                            if rs1 == 0 {
                                return Err(Trap::Illegal);
                            }
                            next_pc = self.x[rs1] & !1;
                        }
                        (false, _) => self.x[rs1] = self.x[rs2],
                        (true, 0) => {
                            let target = self.x[rs1] & !1;
                            self.x[1] = next_pc;
                            next_pc = target;
                        }
                        (true, _) => self.x[rs1] = self.x[rs1].wrapping_add(self.x[rs2]),
                    }
                }
                // c.swsp
                0b110 => {
                    let rs2 = ((insn >> 2) & 0x1f) as usize;
                    let uimm = ((insn >> 7) & 0x3c) | ((insn >> 1) & 0xc0);
                    self.store(self.x[2].wrapping_add(uimm), self.x[rs2], 4)?;
                }
                _ => return Err(Trap::Illegal),
            },
            _ => return Err(Trap::Illegal),
        }

        self.pc = next_pc;
        Ok(())
    }
}

/// The c.j / c.jal immediate.
fn cj_imm(insn: u32) -> u32 {
    sext(
        ((insn >> 1) & 0x800) | ((insn >> 7) & 0x10) | ((insn >> 1) & 0x300)
            | ((insn << 2) & 0x400)
            | ((insn >> 1) & 0x40)
            | ((insn << 1) & 0x80)
            | ((insn >> 2) & 0xe)
            | ((insn << 3) & 0x20),
        12,
    )
}

/// The c.beqz / c.bnez immediate.
fn cb_imm(insn: u32) -> u32 {
    sext(
        ((insn >> 4) & 0x100) | ((insn >> 7) & 0x18) | ((insn << 1) & 0xc0)
            | ((insn >> 2) & 0x6)
            | ((insn << 3) & 0x20),
        9,
    )
}

#[cfg(test)]
mod tests {
    use super::super::Simulator;
    use super::super::StopEvent;
    use super::super::SIGILL;
    use super::super::SIGTRAP;

    fn fresh() -> Simulator {
        let mut sim = Simulator::open(0x1000);
        sim.create_inferior();
        sim
    }

    #[test]
    fn lui_addi_sequence() {
        let mut sim = fresh();
        // lui x5, 0x12345 ; addi x5, x5, 0x678
        sim.write(0, &0x1234_52b7u32.to_le_bytes());
        sim.write(4, &0x6782_8293u32.to_le_bytes());
        sim.step();
        sim.step();
        assert_eq!(sim.read_register(5), Some(0x1234_5678));
    }

    #[test]
    fn branch_taken_and_not() {
        let mut sim = fresh();
        // beq x0, x0, +8
        sim.write(0, &0x0000_0463u32.to_le_bytes());
        sim.step();
        assert_eq!(sim.pc(), 8);

        // bne x0, x0, +8 at pc 8: falls through
        sim.write(8, &0x0000_1463u32.to_le_bytes());
        sim.step();
        assert_eq!(sim.pc(), 12);
    }

    #[test]
    fn load_store_roundtrip() {
        let mut sim = fresh();
        // addi x1, x0, 0x7f ; sb x1, 0x100(x0) ; lb x2, 0x100(x0)
        sim.write(0, &0x07f0_0093u32.to_le_bytes());
        sim.write(4, &0x1010_0023u32.to_le_bytes());
        sim.write(8, &0x1000_0103u32.to_le_bytes());
        for _ in 0..3 {
            assert_eq!(sim.step(), StopEvent::Stopped(SIGTRAP));
        }
        assert_eq!(sim.read_register(2), Some(0x7f));
    }

    #[test]
    fn mul_div() {
        let mut sim = fresh();
        // addi x1, x0, 6 ; addi x2, x0, 7 ; mul x3, x1, x2 ; divu x4, x3, x2
        sim.write(0, &0x0060_0093u32.to_le_bytes());
        sim.write(4, &0x0070_0113u32.to_le_bytes());
        sim.write(8, &0x0220_81b3u32.to_le_bytes());
        sim.write(12, &0x0221_d233u32.to_le_bytes());
        for _ in 0..4 {
            sim.step();
        }
        assert_eq!(sim.read_register(3), Some(42));
        assert_eq!(sim.read_register(4), Some(6));
    }

    #[test]
    fn compressed_li_and_jump() {
        let mut sim = fresh();
        // c.li x8, 9 (010 | imm5=0 | rd=01000 | imm=01001 | 01)
        let c_li: u16 = 0b010_0_01000_01001_01;
        sim.write(0, &c_li.to_le_bytes());
        sim.step();
        assert_eq!(sim.read_register(8), Some(9));
        assert_eq!(sim.pc(), 2);
    }

    #[test]
    fn illegal_instruction_signals() {
        let mut sim = fresh();
        sim.write(0, &0xffff_ffffu32.to_le_bytes());
        assert_eq!(sim.step(), StopEvent::Signalled(SIGILL));
    }

    #[test]
    fn rdcycle_reads_counter() {
        let mut sim = fresh();
        // addi x1, x0, 1 ; rdcycle x5 (csrrs x5, cycle, x0)
        sim.write(0, &0x0010_0093u32.to_le_bytes());
        sim.write(4, &0xc000_22f3u32.to_le_bytes());
        sim.step();
        sim.step();
        assert_eq!(sim.read_register(5), Some(1));
    }
}
