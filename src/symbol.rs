use std::ops::Range;
use std::str::FromStr;

use fxhash::FxBuildHasher;
use indexmap::IndexMap;
use miette::SourceSpan;

/// Used to refer to offsets from the start of a source file.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct SrcOffset(pub usize);

/// Location within source
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Span {
    offs: SrcOffset,
    len: usize,
}

impl Span {
    pub fn new(offs: SrcOffset, len: usize) -> Self {
        Span { offs, len }
    }

    pub fn dummy() -> Self {
        Span {
            offs: SrcOffset(0),
            len: 0,
        }
    }

    pub fn offs(&self) -> usize {
        self.offs.0
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn end(&self) -> usize {
        self.offs.0 + self.len
    }
}

impl From<Span> for SourceSpan {
    fn from(value: Span) -> Self {
        SourceSpan::new(value.offs().into(), value.len())
    }
}

impl From<Span> for Range<usize> {
    fn from(value: Span) -> Self {
        value.offs()..value.end()
    }
}

/// Label reference inside an instruction operand, resolved during emission.
///
/// Equality ignores the span as it exists only for diagnostics.
#[derive(Clone, Eq, Debug)]
pub struct LabelRef {
    pub name: String,
    pub span: Span,
}

impl LabelRef {
    pub fn new(name: &str, span: Span) -> Self {
        LabelRef {
            name: name.to_string(),
            span,
        }
    }

    /// For tests and desugared statements where no source location exists.
    pub fn unplaced(name: &str) -> Self {
        LabelRef {
            name: name.to_string(),
            span: Span::dummy(),
        }
    }
}

impl PartialEq for LabelRef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

/// Case-sensitive map of label -> absolute memory address.
///
/// Filled during pass 1, queried during emission. Insertion order is kept so
/// that listings print labels in source order.
#[derive(Default, Debug)]
pub struct SymbolTable {
    map: IndexMap<String, u16, FxBuildHasher>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            map: IndexMap::with_hasher(FxBuildHasher::default()),
        }
    }

    /// Record a label definition. Returns the previous address if the label
    /// already exists, leaving the table unchanged.
    pub fn insert(&mut self, name: &str, addr: u16) -> Result<(), u16> {
        if let Some(prev) = self.map.get(name) {
            return Err(*prev);
        }
        let _ = self.map.insert(name.to_string(), addr);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<u16> {
        self.map.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u16)> {
        self.map.iter().map(|(name, addr)| (name.as_str(), *addr))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Represents the CPU registers.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum Register {
    R0 = 0,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    /// Also the subroutine return address.
    R7,
}

impl FromStr for Register {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "0" => Ok(Register::R0),
            "1" => Ok(Register::R1),
            "2" => Ok(Register::R2),
            "3" => Ok(Register::R3),
            "4" => Ok(Register::R4),
            "5" => Ok(Register::R5),
            "6" => Ok(Register::R6),
            "7" => Ok(Register::R7),
            _ => Err(()),
        }
    }
}

/// Condition mask requested by a BR instruction.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Flag {
    /// -
    N,
    /// 0
    Z,
    /// +
    P,
    /// <= 0
    Nz,
    /// >= 0
    Zp,
    /// != 0
    Np,
    /// Unconditional
    Nzp,
}

impl Flag {
    /// Bit mask in instruction encoding order: n = bit 2, z = bit 1, p = bit 0.
    pub fn mask(self) -> u16 {
        match self {
            Flag::N => 0b100,
            Flag::Z => 0b010,
            Flag::P => 0b001,
            Flag::Nz => 0b110,
            Flag::Zp => 0b011,
            Flag::Np => 0b101,
            Flag::Nzp => 0b111,
        }
    }

    /// Build from the n/z/p letters of a branch mnemonic, in any order.
    /// An empty suffix is the unconditional branch.
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        let mut n = false;
        let mut z = false;
        let mut p = false;
        for c in suffix.chars() {
            match c.to_ascii_lowercase() {
                'n' if !n => n = true,
                'z' if !z => z = true,
                'p' if !p => p = true,
                _ => return None,
            }
        }
        Some(match (n, z, p) {
            (true, false, false) => Flag::N,
            (false, true, false) => Flag::Z,
            (false, false, true) => Flag::P,
            (true, true, false) => Flag::Nz,
            (false, true, true) => Flag::Zp,
            (true, false, true) => Flag::Np,
            _ => Flag::Nzp,
        })
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum InstrKind {
    Add,
    And,
    Br(Flag),
    Jmp,
    Jsr,
    Jsrr,
    Ld,
    Ldi,
    Ldr,
    Lea,
    Not,
    Ret,
    Rti,
    St,
    Sti,
    Str,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TrapKind {
    Generic,
    Getc,
    Out,
    Puts,
    In,
    Putsp,
    Halt,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DirKind {
    Orig,
    End,
    Stringz,
    Blkw,
    Fill,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_suffix_permutations() {
        for suffix in ["nzp", "npz", "znp", "zpn", "pnz", "pzn", ""] {
            assert_eq!(Flag::from_suffix(suffix), Some(Flag::Nzp));
        }
        assert_eq!(Flag::from_suffix("zp"), Some(Flag::Zp));
        assert_eq!(Flag::from_suffix("pz"), Some(Flag::Zp));
        assert_eq!(Flag::from_suffix("n"), Some(Flag::N));
        assert_eq!(Flag::from_suffix("x"), None);
        assert_eq!(Flag::from_suffix("nn"), None);
    }

    #[test]
    fn symbol_table_rejects_duplicates() {
        let mut table = SymbolTable::new();
        assert!(table.insert("loop", 0x3000).is_ok());
        assert_eq!(table.insert("loop", 0x3005), Err(0x3000));
        assert_eq!(table.get("loop"), Some(0x3000));
    }

    #[test]
    fn symbol_table_case_sensitive() {
        let mut table = SymbolTable::new();
        assert!(table.insert("Loop", 0x3000).is_ok());
        assert!(table.insert("loop", 0x3001).is_ok());
        assert_eq!(table.get("Loop"), Some(0x3000));
        assert_eq!(table.get("loop"), Some(0x3001));
    }
}
