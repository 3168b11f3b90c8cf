use miette::Result;

use crate::error;
use crate::obj::ObjFile;
use crate::runtime::MEMORY_MAX;
use crate::symbol::{Flag, LabelRef, Register, SymbolTable};

/// Assembly intermediate representation: origin, one statement per emitted
/// word, and the symbol table filled during parsing.
pub struct Air {
    /// Memory address to start program at
    orig: Option<u16>,
    ast: Vec<AirStmt>,
    symbols: SymbolTable,
}

impl Air {
    pub fn new() -> Self {
        Air {
            orig: None,
            ast: Vec::new(),
            symbols: SymbolTable::new(),
        }
    }

    pub fn set_orig(&mut self, val: u16) {
        self.orig = Some(val);
    }

    pub fn orig(&self) -> Option<u16> {
        self.orig
    }

    /// Address the next added statement will occupy. Each statement is
    /// exactly one word since the preprocessor already expanded directives.
    pub fn next_addr(&self) -> u16 {
        self.orig
            .unwrap_or(0x3000)
            .wrapping_add(self.ast.len() as u16)
    }

    pub fn add_stmt(&mut self, stmt: AirStmt) {
        self.ast.push(stmt)
    }

    /// Record a label at the next statement address.
    pub fn add_label(&mut self, name: &str) -> Result<(), u16> {
        self.symbols.insert(name, self.next_addr())
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn get(&self, idx: usize) -> &AirStmt {
        &self.ast[idx]
    }

    pub fn len(&self) -> usize {
        self.ast.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ast.is_empty()
    }

    /// Pass 2: resolve label references and encode every statement into its
    /// word. Fails without partial output on the first unresolvable or
    /// out-of-range operand.
    pub fn to_obj(&self, src: &str) -> Result<ObjFile> {
        let orig = self.orig.unwrap_or(0x3000);
        if orig as usize + self.ast.len() > MEMORY_MAX {
            return Err(error::emit_too_long(orig, self.ast.len()));
        }
        let mut words = Vec::with_capacity(self.ast.len());
        for (idx, stmt) in self.ast.iter().enumerate() {
            let addr = orig.wrapping_add(idx as u16);
            words.push(stmt.emit(addr, &self.symbols, src)?);
        }
        Ok(ObjFile::new(orig, words))
    }
}

impl Default for Air {
    fn default() -> Self {
        Air::new()
    }
}

/// Single LC3 statement, one emitted word each.
#[derive(PartialEq, Eq, Debug)]
pub enum AirStmt {
    /// Add SR1 (source register 1) with SR2 and store in DR (destination register)
    Add {
        dest: Register,
        src_reg: Register,
        src_reg_imm: ImmediateOrReg,
    },
    /// Bitwise-and SR1 with SR2 and store in DR
    And {
        dest: Register,
        src_reg: Register,
        src_reg_imm: ImmediateOrReg,
    },
    /// Branch to a label if the condition code matches the flag mask
    Branch { flag: Flag, dest_label: LabelRef },
    /// Set PC to BR to perform a jump on the next cycle. RET desugars to
    /// a jump through R7.
    Jump { base: Register },
    /// Store the return address in R7 and jump to the label
    JumpSub { dest_label: LabelRef },
    /// Jump to subroutine stored at BR
    JumpSubReg { base: Register },
    /// Load value directly from a labelled memory address into DR
    Load { dest: Register, src_label: LabelRef },
    /// Load through the pointer stored at the labelled address
    LoadInd { dest: Register, src_label: LabelRef },
    /// Load from BR plus a 6-bit offset
    LoadOffs {
        dest: Register,
        base: Register,
        offset: u16,
    },
    /// Load the address of the label itself
    LoadEAddr { dest: Register, src_label: LabelRef },
    Not { dest: Register, src_reg: Register },
    /// RTI is encoded but not executable on this machine
    Interrupt,
    Store { src_reg: Register, dest_label: LabelRef },
    StoreInd { src_reg: Register, dest_label: LabelRef },
    StoreOffs {
        src_reg: Register,
        base: Register,
        offset: u16,
    },
    Trap { trap_vect: u8 },
    /// Preprocessed .fill/.blkw/.stringz data
    RawWord { word: u16 },
}

// ADD and AND support an immediate second operand
#[derive(PartialEq, Eq, Debug)]
pub enum ImmediateOrReg {
    Reg(Register),
    /// 5-bit two's complement
    Imm5(u8),
}

impl ImmediateOrReg {
    /// Low 6 bits of the encoding: mode bit plus register or immediate.
    fn encode(&self) -> u16 {
        match self {
            ImmediateOrReg::Reg(reg) => *reg as u16,
            ImmediateOrReg::Imm5(imm) => 1 << 5 | (*imm as u16 & 0x1F),
        }
    }
}

impl AirStmt {
    /// Encode this statement into its instruction word. `addr` is the
    /// address the word will occupy, used for PC-relative offsets.
    pub fn emit(&self, addr: u16, symbols: &SymbolTable, src: &str) -> Result<u16> {
        let word = match self {
            AirStmt::Add {
                dest,
                src_reg,
                src_reg_imm,
            } => {
                0b0001 << 12
                    | (*dest as u16) << 9
                    | (*src_reg as u16) << 6
                    | src_reg_imm.encode()
            }
            AirStmt::And {
                dest,
                src_reg,
                src_reg_imm,
            } => {
                0b0101 << 12
                    | (*dest as u16) << 9
                    | (*src_reg as u16) << 6
                    | src_reg_imm.encode()
            }
            AirStmt::Branch { flag, dest_label } => {
                let offs = resolve_offs(dest_label, addr, 9, symbols, src)?;
                flag.mask() << 9 | offs
            }
            AirStmt::Jump { base } => 0b1100 << 12 | (*base as u16) << 6,
            AirStmt::JumpSub { dest_label } => {
                let offs = resolve_offs(dest_label, addr, 11, symbols, src)?;
                0b0100 << 12 | 1 << 11 | offs
            }
            AirStmt::JumpSubReg { base } => 0b0100 << 12 | (*base as u16) << 6,
            AirStmt::Load { dest, src_label } => {
                let offs = resolve_offs(src_label, addr, 9, symbols, src)?;
                0b0010 << 12 | (*dest as u16) << 9 | offs
            }
            AirStmt::LoadInd { dest, src_label } => {
                let offs = resolve_offs(src_label, addr, 9, symbols, src)?;
                0b1010 << 12 | (*dest as u16) << 9 | offs
            }
            AirStmt::LoadOffs { dest, base, offset } => {
                0b0110 << 12 | (*dest as u16) << 9 | (*base as u16) << 6 | (offset & 0x3F)
            }
            AirStmt::LoadEAddr { dest, src_label } => {
                let offs = resolve_offs(src_label, addr, 9, symbols, src)?;
                0b1110 << 12 | (*dest as u16) << 9 | offs
            }
            AirStmt::Not { dest, src_reg } => {
                0b1001 << 12 | (*dest as u16) << 9 | (*src_reg as u16) << 6 | 0x3F
            }
            AirStmt::Interrupt => 0b1000 << 12,
            AirStmt::Store { src_reg, dest_label } => {
                let offs = resolve_offs(dest_label, addr, 9, symbols, src)?;
                0b0011 << 12 | (*src_reg as u16) << 9 | offs
            }
            AirStmt::StoreInd { src_reg, dest_label } => {
                let offs = resolve_offs(dest_label, addr, 9, symbols, src)?;
                0b1011 << 12 | (*src_reg as u16) << 9 | offs
            }
            AirStmt::StoreOffs { src_reg, base, offset } => {
                0b0111 << 12 | (*src_reg as u16) << 9 | (*base as u16) << 6 | (offset & 0x3F)
            }
            AirStmt::Trap { trap_vect } => 0b1111 << 12 | *trap_vect as u16,
            AirStmt::RawWord { word } => *word,
        };
        Ok(word)
    }
}

/// Resolve a label to its PC-relative offset from the instruction at `addr`,
/// masked to `bits`. The base is `addr + 1` to match the incremented PC.
fn resolve_offs(
    label: &LabelRef,
    addr: u16,
    bits: u32,
    symbols: &SymbolTable,
    src: &str,
) -> Result<u16> {
    let target = symbols
        .get(&label.name)
        .ok_or_else(|| error::emit_undefined_label(label.span, src, &label.name))?;
    let offs = target as i32 - (addr as i32 + 1);
    let limit = 1i32 << (bits - 1);
    if offs < -limit || offs >= limit {
        return Err(error::emit_offs_range(label.span, src, &label.name, offs, bits));
    }
    Ok(offs as u16 & ((1u16 << bits) - 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emit(stmt: AirStmt, addr: u16, symbols: &SymbolTable) -> u16 {
        stmt.emit(addr, symbols, "").unwrap()
    }

    #[test]
    fn emit_add_imm() {
        let stmt = AirStmt::Add {
            dest: Register::R2,
            src_reg: Register::R7,
            src_reg_imm: ImmediateOrReg::Imm5(7),
        };
        assert_eq!(emit(stmt, 0x3000, &SymbolTable::new()), 0b0001_010_111_1_00111);
    }

    #[test]
    fn emit_add_neg_imm() {
        let stmt = AirStmt::Add {
            dest: Register::R2,
            src_reg: Register::R2,
            src_reg_imm: ImmediateOrReg::Imm5(-5i8 as u8),
        };
        assert_eq!(emit(stmt, 0x3000, &SymbolTable::new()), 0b0001_010_010_1_11011);
    }

    #[test]
    fn emit_and_reg() {
        let stmt = AirStmt::And {
            dest: Register::R0,
            src_reg: Register::R1,
            src_reg_imm: ImmediateOrReg::Reg(Register::R2),
        };
        assert_eq!(emit(stmt, 0x3000, &SymbolTable::new()), 0b0101_000_001_0_00_010);
    }

    #[test]
    fn emit_branch_backwards() {
        let mut symbols = SymbolTable::new();
        symbols.insert("loop", 0x3001).unwrap();
        let stmt = AirStmt::Branch {
            flag: Flag::Nzp,
            dest_label: LabelRef::unplaced("loop"),
        };
        // From x3002: offset = x3001 - x3003 = -2
        assert_eq!(emit(stmt, 0x3002, &symbols), 0b0000_111_111111110);
    }

    #[test]
    fn emit_branch_forward() {
        let mut symbols = SymbolTable::new();
        symbols.insert("done", 0x3005).unwrap();
        let stmt = AirStmt::Branch {
            flag: Flag::Z,
            dest_label: LabelRef::unplaced("done"),
        };
        assert_eq!(emit(stmt, 0x3000, &symbols), 0b0000_010_000000100);
    }

    #[test]
    fn emit_undefined_label_fails() {
        let stmt = AirStmt::Branch {
            flag: Flag::Nzp,
            dest_label: LabelRef::unplaced("nowhere"),
        };
        assert!(stmt.emit(0x3000, &SymbolTable::new(), "").is_err());
    }

    #[test]
    fn emit_offset_out_of_range_fails() {
        let mut symbols = SymbolTable::new();
        symbols.insert("far", 0x3000 + 300).unwrap();
        let stmt = AirStmt::Branch {
            flag: Flag::Nzp,
            dest_label: LabelRef::unplaced("far"),
        };
        // 9-bit offset maxes out at +255
        assert!(stmt.emit(0x3000, &symbols, "").is_err());
        let near = AirStmt::JumpSub {
            dest_label: LabelRef::unplaced("far"),
        };
        // 11-bit offset is fine with the same distance
        assert!(near.emit(0x3000, &symbols, "").is_ok());
    }

    #[test]
    fn emit_not_sets_low_bits() {
        let stmt = AirStmt::Not {
            dest: Register::R1,
            src_reg: Register::R2,
        };
        assert_eq!(emit(stmt, 0x3000, &SymbolTable::new()), 0b1001_001_010_111111);
    }

    #[test]
    fn emit_ret_is_jmp_r7() {
        let stmt = AirStmt::Jump { base: Register::R7 };
        assert_eq!(emit(stmt, 0x3000, &SymbolTable::new()), 0b1100_000_111_000000);
    }

    #[test]
    fn emit_str_offset_masked() {
        let stmt = AirStmt::StoreOffs {
            src_reg: Register::R4,
            base: Register::R5,
            offset: -1i16 as u16,
        };
        assert_eq!(emit(stmt, 0x3000, &SymbolTable::new()), 0b0111_100_101_111111);
    }

    #[test]
    fn to_obj_rejects_oversized_program() {
        let mut air = Air::new();
        air.set_orig(0xFFFF);
        air.add_stmt(AirStmt::RawWord { word: 1 });
        air.add_stmt(AirStmt::RawWord { word: 2 });
        assert!(air.to_obj("").is_err());
    }
}
