use crate::symbol::Register;

/// Sign-extend the low `bits` bits of `val` to a full 16-bit word.
#[inline]
pub fn sign_extend(val: u16, bits: u32) -> u16 {
    debug_assert!(bits > 0 && bits < 16);
    let shift = 16 - bits;
    // Shift the field to the top, then arithmetic shift back down
    (((val << shift) as i16) >> shift) as u16
}

/// Second operand of ADD/AND.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ImmOrReg {
    Reg(Register),
    /// Already sign-extended to 16 bits.
    Imm(u16),
}

/// A fully decoded instruction word.
///
/// Register fields are 3-bit indices and every offset/immediate is
/// sign-extended during decoding, so execution needs no further bit surgery.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Instruction {
    Add { dest: Register, src_reg: Register, src: ImmOrReg },
    And { dest: Register, src_reg: Register, src: ImmOrReg },
    Not { dest: Register, src_reg: Register },
    /// `cond` is the 3-bit n/z/p mask from the instruction word.
    Br { cond: u16, offset: u16 },
    Jmp { base: Register },
    Jsr { offset: u16 },
    Jsrr { base: Register },
    Ld { dest: Register, offset: u16 },
    Ldi { dest: Register, offset: u16 },
    Ldr { dest: Register, base: Register, offset: u16 },
    Lea { dest: Register, offset: u16 },
    St { src_reg: Register, offset: u16 },
    Sti { src_reg: Register, offset: u16 },
    Str { src_reg: Register, base: Register, offset: u16 },
    Trap { vector: u8 },
}

/// Extract a 3-bit register field starting at `shift`.
#[inline]
fn reg(word: u16, shift: u32) -> Register {
    match (word >> shift) & 0b111 {
        0 => Register::R0,
        1 => Register::R1,
        2 => Register::R2,
        3 => Register::R3,
        4 => Register::R4,
        5 => Register::R5,
        6 => Register::R6,
        _ => Register::R7,
    }
}

impl Instruction {
    /// Decode one instruction word. Returns `None` for the reserved opcode
    /// (0b1101) and for RTI, which this machine does not implement.
    pub fn decode(word: u16) -> Option<Instruction> {
        let instr = match word >> 12 {
            0b0000 => Instruction::Br {
                cond: (word >> 9) & 0b111,
                offset: sign_extend(word, 9),
            },
            0b0001 => Instruction::Add {
                dest: reg(word, 9),
                src_reg: reg(word, 6),
                src: decode_imm_or_reg(word),
            },
            0b0010 => Instruction::Ld {
                dest: reg(word, 9),
                offset: sign_extend(word, 9),
            },
            0b0011 => Instruction::St {
                src_reg: reg(word, 9),
                offset: sign_extend(word, 9),
            },
            0b0100 => {
                if word & 0x0800 != 0 {
                    Instruction::Jsr {
                        offset: sign_extend(word, 11),
                    }
                } else {
                    Instruction::Jsrr { base: reg(word, 6) }
                }
            }
            0b0101 => Instruction::And {
                dest: reg(word, 9),
                src_reg: reg(word, 6),
                src: decode_imm_or_reg(word),
            },
            0b0110 => Instruction::Ldr {
                dest: reg(word, 9),
                base: reg(word, 6),
                offset: sign_extend(word, 6),
            },
            0b0111 => Instruction::Str {
                src_reg: reg(word, 9),
                base: reg(word, 6),
                offset: sign_extend(word, 6),
            },
            // RTI: privilege semantics are not implemented
            0b1000 => return None,
            0b1001 => Instruction::Not {
                dest: reg(word, 9),
                src_reg: reg(word, 6),
            },
            0b1010 => Instruction::Ldi {
                dest: reg(word, 9),
                offset: sign_extend(word, 9),
            },
            0b1011 => Instruction::Sti {
                src_reg: reg(word, 9),
                offset: sign_extend(word, 9),
            },
            0b1100 => Instruction::Jmp { base: reg(word, 6) },
            // Reserved opcode
            0b1101 => return None,
            0b1110 => Instruction::Lea {
                dest: reg(word, 9),
                offset: sign_extend(word, 9),
            },
            _ => Instruction::Trap {
                vector: (word & 0xFF) as u8,
            },
        };
        Some(instr)
    }
}

/// ADD/AND mode bit 5 selects between SR2 and a 5-bit immediate.
#[inline]
fn decode_imm_or_reg(word: u16) -> ImmOrReg {
    if word & 0b100000 == 0 {
        ImmOrReg::Reg(reg(word, 0))
    } else {
        ImmOrReg::Imm(sign_extend(word, 5))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_extend_imm5() {
        // All 32 encodings of a 5-bit immediate
        for raw in 0u16..32 {
            let ext = sign_extend(raw, 5) as i16;
            let expected = if raw & 0x10 != 0 {
                raw as i16 - 32
            } else {
                raw as i16
            };
            assert_eq!(ext, expected, "sign_extend({raw:#07b}, 5)");
            assert!((-16..=15).contains(&ext));
        }
    }

    #[test]
    fn sign_extend_cases() {
        #[rustfmt::skip]
        let cases = [
            // (input, bits, expected)
            (0x0000, 9, 0x0000),
            (0x0001, 9, 0x0001),
            (0x00ff, 9, 0x00ff),
            (0x01ff, 9, 0xffff),
            (0x0100, 9, 0xff00),
            (0x003f, 6, 0xffff),
            (0x001f, 6, 0x001f),
            (0x07ff, 11, 0xffff),
            (0x03ff, 11, 0x03ff),
        ];
        for (input, bits, expected) in cases {
            assert_eq!(
                sign_extend(input, bits),
                expected,
                "sign_extend(0x{input:04x}, {bits})"
            );
        }
    }

    #[test]
    fn decode_add_imm() {
        let instr = Instruction::decode(0b0001_010_111_1_00111).unwrap();
        assert_eq!(
            instr,
            Instruction::Add {
                dest: Register::R2,
                src_reg: Register::R7,
                src: ImmOrReg::Imm(7),
            }
        );
    }

    #[test]
    fn decode_add_neg_imm() {
        let instr = Instruction::decode(0b0001_010_011_1_11011).unwrap();
        assert_eq!(
            instr,
            Instruction::Add {
                dest: Register::R2,
                src_reg: Register::R3,
                src: ImmOrReg::Imm(-5i16 as u16),
            }
        );
    }

    #[test]
    fn decode_add_reg() {
        let instr = Instruction::decode(0b0001_010_010_0_00_010).unwrap();
        assert_eq!(
            instr,
            Instruction::Add {
                dest: Register::R2,
                src_reg: Register::R2,
                src: ImmOrReg::Reg(Register::R2),
            }
        );
    }

    #[test]
    fn decode_br_backwards() {
        let instr = Instruction::decode(0b0000_111_111111110).unwrap();
        assert_eq!(
            instr,
            Instruction::Br {
                cond: 0b111,
                offset: -2i16 as u16,
            }
        );
    }

    #[test]
    fn decode_jsr_modes() {
        assert_eq!(
            Instruction::decode(0b0100_1_00000000100).unwrap(),
            Instruction::Jsr { offset: 4 }
        );
        assert_eq!(
            Instruction::decode(0b0100_000_011_000000).unwrap(),
            Instruction::Jsrr { base: Register::R3 }
        );
    }

    #[test]
    fn decode_not() {
        assert_eq!(
            Instruction::decode(0b1001_001_010_111111).unwrap(),
            Instruction::Not {
                dest: Register::R1,
                src_reg: Register::R2,
            }
        );
    }

    #[test]
    fn decode_reserved() {
        assert_eq!(Instruction::decode(0b1101_0000_0000_0000), None);
        // RTI is treated as illegal as well
        assert_eq!(Instruction::decode(0b1000_0000_0000_0000), None);
    }

    #[test]
    fn decode_trap() {
        assert_eq!(
            Instruction::decode(0xF025).unwrap(),
            Instruction::Trap { vector: 0x25 }
        );
    }
}
