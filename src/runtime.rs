use std::fmt;

use crate::instr::{ImmOrReg, Instruction};
use crate::symbol::Register;

/// LC3 can address 64K words of memory.
pub const MEMORY_MAX: usize = 0x10000;

/// Flat array of 65536 16-bit cells.
///
/// Addresses are `u16`, so an out-of-range cell access is unrepresentable;
/// the only bounds check left is on bulk loads.
pub struct Memory {
    cells: Box<[u16; MEMORY_MAX]>,
}

impl Memory {
    pub fn new() -> Self {
        Memory {
            cells: Box::new([0; MEMORY_MAX]),
        }
    }

    #[inline]
    pub fn read(&self, addr: u16) -> u16 {
        self.cells[addr as usize]
    }

    #[inline]
    pub fn write(&mut self, addr: u16, val: u16) {
        self.cells[addr as usize] = val;
    }

    /// Copy `words` into memory starting at `orig`. Fails without touching
    /// any cell when the block would run past the end of the address space.
    pub fn load(&mut self, orig: u16, words: &[u16]) -> Result<(), ExecError> {
        let start = orig as usize;
        if start + words.len() > MEMORY_MAX {
            return Err(ExecError::ObjTooLarge {
                orig,
                len: words.len(),
            });
        }
        self.cells[start..start + words.len()].copy_from_slice(words);
        Ok(())
    }

    /// Point-in-time copy of the full address space.
    pub fn snapshot(&self) -> Vec<u16> {
        self.cells.to_vec()
    }
}

impl Default for Memory {
    fn default() -> Self {
        Memory::new()
    }
}

/// Condition code set from the result of the last flag-affecting instruction.
/// Exactly one of the three is active at any time.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CondCode {
    N,
    Z,
    P,
}

impl CondCode {
    /// Mask in BR encoding order: n = bit 2, z = bit 1, p = bit 0.
    pub fn mask(self) -> u16 {
        match self {
            CondCode::N => 0b100,
            CondCode::Z => 0b010,
            CondCode::P => 0b001,
        }
    }
}

/// 8 general-purpose registers, the program counter and the condition code.
pub struct RegisterFile {
    gpr: [u16; 8],
    pc: u16,
    cc: CondCode,
}

impl RegisterFile {
    pub fn new() -> Self {
        RegisterFile {
            gpr: [0; 8],
            pc: 0,
            // The machine powers on with a zero in every register
            cc: CondCode::Z,
        }
    }

    #[inline]
    pub fn get(&self, reg: Register) -> u16 {
        self.gpr[reg as usize]
    }

    #[inline]
    pub fn set(&mut self, reg: Register, val: u16) {
        self.gpr[reg as usize] = val;
    }

    #[inline]
    pub fn pc(&self) -> u16 {
        self.pc
    }

    #[inline]
    pub fn set_pc(&mut self, pc: u16) {
        self.pc = pc;
    }

    pub fn cc(&self) -> CondCode {
        self.cc
    }

    /// Recompute the condition code from a result value: zero dominates,
    /// then the sign bit decides between N and P.
    #[inline]
    pub fn set_flags(&mut self, val: u16) {
        self.cc = if val == 0 {
            CondCode::Z
        } else if val & 0x8000 != 0 {
            CondCode::N
        } else {
            CondCode::P
        };
    }

    pub fn view(&self) -> [u16; 8] {
        self.gpr
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        RegisterFile::new()
    }
}

/// Character port used by the I/O traps. Owned by the caller; a core without
/// one fails those traps instead of blocking.
pub trait IoPort {
    fn read_char(&mut self) -> std::io::Result<u8>;
    fn write_char(&mut self, byte: u8) -> std::io::Result<()>;
}

/// Why a `step` call stopped the machine.
#[derive(Debug)]
pub enum ExecError {
    /// Reserved opcode or RTI.
    IllegalInstruction { word: u16, addr: u16 },
    /// Trap needed character I/O but no port is attached or it failed.
    IoUnavailable { vector: u8 },
    /// Unknown trap vector.
    UnknownTrap { vector: u8, addr: u16 },
    /// Object code does not fit in memory starting at its origin.
    ObjTooLarge { orig: u16, len: usize },
    /// Object code stream without even an origin word.
    EmptyObj,
}

impl std::error::Error for ExecError {}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IllegalInstruction { word, addr } => {
                write!(f, "illegal instruction x{word:04X} at x{addr:04X}")
            }
            Self::IoUnavailable { vector } => {
                write!(f, "trap x{vector:02X} requires an I/O port but none is usable")
            }
            Self::UnknownTrap { vector, addr } => {
                write!(f, "unknown trap vector x{vector:02X} at x{addr:04X}")
            }
            Self::ObjTooLarge { orig, len } => {
                write!(f, "{len} words at origin x{orig:04X} exceed the address space")
            }
            Self::EmptyObj => write!(f, "object code contains no origin word"),
        }
    }
}

/// Whether the core will execute further instructions.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Status {
    Running,
    /// Deliberate stop via the HALT trap.
    Halted,
    /// Stopped by an execution error; committed state stays inspectable.
    Faulted,
}

/// One LC3 machine: exclusively owns its memory and register file and
/// advances by exactly one fetch-decode-execute cycle per `step`.
pub struct Core {
    mem: Memory,
    regs: RegisterFile,
    status: Status,
    port: Option<Box<dyn IoPort>>,
}

impl Core {
    pub fn new() -> Self {
        Core {
            mem: Memory::new(),
            regs: RegisterFile::new(),
            status: Status::Running,
            port: None,
        }
    }

    pub fn with_port(port: Box<dyn IoPort>) -> Self {
        Core {
            port: Some(port),
            ..Core::new()
        }
    }

    /// Install object code: the first word is the origin, the rest are
    /// stored from that address up. On success PC is set to the origin and
    /// the core is ready to run; on failure memory is left untouched.
    pub fn load_obj(&mut self, words: &[u16]) -> Result<(), ExecError> {
        let (&orig, prog) = words.split_first().ok_or(ExecError::EmptyObj)?;
        self.mem.load(orig, prog)?;
        self.regs.set_pc(orig);
        self.status = Status::Running;
        Ok(())
    }

    pub fn pc(&self) -> u16 {
        self.regs.pc()
    }

    pub fn cc(&self) -> CondCode {
        self.regs.cc()
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// Snapshot of the 8 general-purpose registers.
    pub fn registers_view(&self) -> [u16; 8] {
        self.regs.view()
    }

    /// Snapshot of all 65536 memory cells.
    pub fn memory_view(&self) -> Vec<u16> {
        self.mem.snapshot()
    }

    /// Execute one instruction cycle. A halted or faulted core does nothing
    /// and reports success, so callers may poll freely.
    pub fn step(&mut self) -> Result<(), ExecError> {
        if self.status != Status::Running {
            return Ok(());
        }
        let fetch_pc = self.regs.pc();
        let word = self.mem.read(fetch_pc);
        // PC is incremented before any operand arithmetic so that
        // PC-relative offsets are based on the following instruction.
        self.regs.set_pc(fetch_pc.wrapping_add(1));

        let instr = match Instruction::decode(word) {
            Some(instr) => instr,
            None => {
                return self.fault(ExecError::IllegalInstruction {
                    word,
                    addr: fetch_pc,
                })
            }
        };
        self.execute(instr, fetch_pc)
    }

    fn execute(&mut self, instr: Instruction, fetch_pc: u16) -> Result<(), ExecError> {
        match instr {
            Instruction::Add { dest, src_reg, src } => {
                let res = self.regs.get(src_reg).wrapping_add(self.operand(src));
                self.regs.set(dest, res);
                self.regs.set_flags(res);
            }
            Instruction::And { dest, src_reg, src } => {
                let res = self.regs.get(src_reg) & self.operand(src);
                self.regs.set(dest, res);
                self.regs.set_flags(res);
            }
            Instruction::Not { dest, src_reg } => {
                let res = !self.regs.get(src_reg);
                self.regs.set(dest, res);
                self.regs.set_flags(res);
            }
            Instruction::Br { cond, offset } => {
                if self.regs.cc().mask() & cond != 0 {
                    self.regs.set_pc(self.regs.pc().wrapping_add(offset));
                }
            }
            Instruction::Jmp { base } => {
                self.regs.set_pc(self.regs.get(base));
            }
            Instruction::Jsr { offset } => {
                self.regs.set(Register::R7, self.regs.pc());
                self.regs.set_pc(self.regs.pc().wrapping_add(offset));
            }
            Instruction::Jsrr { base } => {
                // Base register is read first since it may be R7 itself
                let target = self.regs.get(base);
                self.regs.set(Register::R7, self.regs.pc());
                self.regs.set_pc(target);
            }
            Instruction::Ld { dest, offset } => {
                let val = self.mem.read(self.regs.pc().wrapping_add(offset));
                self.regs.set(dest, val);
                self.regs.set_flags(val);
            }
            Instruction::Ldi { dest, offset } => {
                let ptr = self.mem.read(self.regs.pc().wrapping_add(offset));
                let val = self.mem.read(ptr);
                self.regs.set(dest, val);
                self.regs.set_flags(val);
            }
            Instruction::Ldr { dest, base, offset } => {
                let val = self.mem.read(self.regs.get(base).wrapping_add(offset));
                self.regs.set(dest, val);
                self.regs.set_flags(val);
            }
            Instruction::Lea { dest, offset } => {
                let val = self.regs.pc().wrapping_add(offset);
                self.regs.set(dest, val);
                self.regs.set_flags(val);
            }
            Instruction::St { src_reg, offset } => {
                let addr = self.regs.pc().wrapping_add(offset);
                self.mem.write(addr, self.regs.get(src_reg));
            }
            Instruction::Sti { src_reg, offset } => {
                let ptr = self.mem.read(self.regs.pc().wrapping_add(offset));
                self.mem.write(ptr, self.regs.get(src_reg));
            }
            Instruction::Str { src_reg, base, offset } => {
                let addr = self.regs.get(base).wrapping_add(offset);
                self.mem.write(addr, self.regs.get(src_reg));
            }
            Instruction::Trap { vector } => return self.trap(vector, fetch_pc),
        }
        Ok(())
    }

    #[inline]
    fn operand(&self, src: ImmOrReg) -> u16 {
        match src {
            ImmOrReg::Reg(reg) => self.regs.get(reg),
            ImmOrReg::Imm(val) => val,
        }
    }

    fn trap(&mut self, vector: u8, fetch_pc: u16) -> Result<(), ExecError> {
        match vector {
            // getc: read one character into r0, no echo
            0x20 => {
                let ch = self.read_port(vector)?;
                self.regs.set(Register::R0, ch as u16);
            }
            // out: write low byte of r0
            0x21 => {
                let ch = (self.regs.get(Register::R0) & 0xFF) as u8;
                self.write_port(vector, ch)?;
            }
            // puts: write one character per word starting at r0 until null
            0x22 => {
                for addr in self.regs.get(Register::R0)..=u16::MAX {
                    let ch = (self.mem.read(addr) & 0xFF) as u8;
                    if ch == 0 {
                        break;
                    }
                    self.write_port(vector, ch)?;
                }
            }
            // in: read one character into r0 with echo
            0x23 => {
                let ch = self.read_port(vector)?;
                self.regs.set(Register::R0, ch as u16);
                self.write_port(vector, ch)?;
            }
            // putsp: packed string, two characters per word, low byte first
            0x24 => {
                'string: for addr in self.regs.get(Register::R0)..=u16::MAX {
                    let word = self.mem.read(addr);
                    for ch in [(word & 0xFF) as u8, (word >> 8) as u8] {
                        if ch == 0 {
                            break 'string;
                        }
                        self.write_port(vector, ch)?;
                    }
                }
            }
            // halt: deliberate stop, later steps are no-ops
            0x25 => self.status = Status::Halted,
            _ => {
                return self.fault(ExecError::UnknownTrap {
                    vector,
                    addr: fetch_pc,
                })
            }
        }
        Ok(())
    }

    fn read_port(&mut self, vector: u8) -> Result<u8, ExecError> {
        let read = self.port.as_mut().and_then(|port| port.read_char().ok());
        match read {
            Some(ch) => Ok(ch),
            None => Err(self.io_fault(vector)),
        }
    }

    fn write_port(&mut self, vector: u8, byte: u8) -> Result<(), ExecError> {
        let wrote = self
            .port
            .as_mut()
            .is_some_and(|port| port.write_char(byte).is_ok());
        if wrote {
            Ok(())
        } else {
            Err(self.io_fault(vector))
        }
    }

    fn io_fault(&mut self, vector: u8) -> ExecError {
        self.status = Status::Faulted;
        ExecError::IoUnavailable { vector }
    }

    fn fault(&mut self, err: ExecError) -> Result<(), ExecError> {
        self.status = Status::Faulted;
        Err(err)
    }
}

impl Default for Core {
    fn default() -> Self {
        Core::new()
    }
}
