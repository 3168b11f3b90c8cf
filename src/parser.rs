use std::borrow::Cow;
use std::fmt::Display;
use std::iter::Peekable;
use std::vec::IntoIter;

use miette::Result;

use crate::air::{Air, AirStmt, ImmediateOrReg};
use crate::error;
use crate::lexer::{cursor::Cursor, LiteralKind, Token, TokenKind};
use crate::symbol::{DirKind, InstrKind, LabelRef, Register, Span, TrapKind};

/// Replaces data directives .fill, .blkw, .stringz with equivalent raw words
/// so that every remaining token stream statement emits exactly one word.
/// Lexing stops at .end, so anything following it is ignored entirely.
pub fn preprocess(src: &str) -> Result<Vec<Token>> {
    let mut res: Vec<Token> = Vec::new();
    let mut cur = Cursor::new(src);

    loop {
        let dir = cur.advance_real()?;
        match dir.kind {
            // .fill becomes one raw word holding the literal
            TokenKind::Dir(DirKind::Fill) => {
                let val = cur.advance_real()?;
                match val.kind {
                    TokenKind::Lit(LiteralKind::Hex(lit)) => res.push(Token::byte(lit)),
                    TokenKind::Lit(LiteralKind::Dec(lit)) => res.push(Token::byte(lit as u16)),
                    _ => return Err(error::preproc_bad_lit(val.span, src, false)),
                }
            }
            // .blkw becomes a run of zeroed words
            TokenKind::Dir(DirKind::Blkw) => {
                let val = cur.advance_real()?;
                let count = match val.kind {
                    TokenKind::Lit(LiteralKind::Hex(lit)) => lit,
                    TokenKind::Lit(LiteralKind::Dec(lit)) if lit >= 0 => lit as u16,
                    TokenKind::Lit(LiteralKind::Dec(_)) => {
                        return Err(error::preproc_bad_lit(val.span, src, true))
                    }
                    _ => return Err(error::preproc_bad_lit(val.span, src, false)),
                };
                for _ in 0..count {
                    res.push(Token::nullbyte());
                }
            }
            // .stringz becomes one word per character plus a null terminator
            TokenKind::Dir(DirKind::Stringz) => {
                let val = cur.advance_real()?;
                match val.kind {
                    TokenKind::Lit(LiteralKind::Str) => {
                        let str_raw = &src[val.span.offs()..val.span.end()];
                        // Drop the enclosing quotes
                        for c in unescape(&str_raw[1..str_raw.len() - 1]).chars() {
                            res.push(Token::byte(c as u16));
                        }
                        res.push(Token::nullbyte());
                    }
                    _ => return Err(error::preproc_no_str(val.span, src)),
                }
            }
            TokenKind::Dir(DirKind::End) => {
                res.push(dir);
                break;
            }
            TokenKind::Eof => break,
            _ => res.push(dir),
        }
    }
    Ok(res)
}

fn unescape(s: &str) -> Cow<str> {
    if s.find('\\').is_none() {
        return Cow::Borrowed(s);
    }
    let mut result = String::new();
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some('\\') => result.push('\\'),
            Some('"') => result.push('"'),
            Some('0') => result.push('\0'),
            Some(c) => {
                result.push('\\');
                result.push(c);
            }
            // Trailing backslash; include it as is
            None => result.push('\\'),
        }
    }
    Cow::Owned(result)
}

/// Transforms the preprocessed token stream into AIR, building the symbol
/// table (pass 1) as statements are accepted.
pub struct AsmParser<'a> {
    /// Reference to the source file
    src: &'a str,
    /// Peekable iterator over preprocessed tokens
    toks: Peekable<IntoIter<Token>>,
    /// Assembly intermediate representation
    air: Air,
}

impl<'a> AsmParser<'a> {
    pub fn new(src: &'a str) -> Result<Self> {
        let toks = preprocess(src)?;
        Ok(AsmParser {
            src,
            toks: toks.into_iter().peekable(),
            air: Air::new(),
        })
    }

    fn get_span(&self, span: Span) -> &str {
        &self.src[span.offs()..span.end()]
    }

    /// Create AIR out of the token stream.
    pub fn parse(mut self) -> Result<Air> {
        // The first statement must set the origin
        match self.toks.next() {
            Some(tok) if tok.kind == TokenKind::Dir(DirKind::Orig) => {
                let orig = self.expect_lit(Bits::Unsigned(16))?;
                self.air.set_orig(orig);
            }
            _ => return Err(error::parse_missing_orig(self.src)),
        }

        loop {
            // Record prefix labels at the next statement address
            while let Some(label) = self.optional_label() {
                let name = &self.src[label.span.offs()..label.span.end()];
                if let Err(prev) = self.air.add_label(name) {
                    return Err(error::parse_duplicate_label(label.span, self.src, prev));
                }
            }

            let Some(tok) = self.toks.next() else {
                return Err(error::parse_missing_end(self.src));
            };
            match tok.kind {
                TokenKind::Dir(DirKind::End) => break,
                TokenKind::Instr(instr_kind) => self.parse_instr(instr_kind)?,
                TokenKind::Trap(trap_kind) => self.parse_trap(trap_kind)?,
                TokenKind::Byte(val) => self.air.add_stmt(AirStmt::RawWord { word: val }),
                _ => {
                    return Err(error::parse_generic_unexpected(
                        self.src,
                        "instruction, trap, or directive",
                        &tok,
                    ))
                }
            }
        }
        // Consume self to return AIR
        Ok(self.air)
    }

    /// Return label or leave iter untouched and return None
    fn optional_label(&mut self) -> Option<Token> {
        match self.toks.peek() {
            Some(tok) if tok.kind == TokenKind::Label => self.toks.next(),
            _ => None,
        }
    }

    /// Process operand tokens to form valid instruction AIR
    fn parse_instr(&mut self, kind: InstrKind) -> Result<()> {
        let stmt = match kind {
            InstrKind::Add => {
                let (dest, src_reg, src_reg_imm) = self.expect_arith_operands()?;
                AirStmt::Add {
                    dest,
                    src_reg,
                    src_reg_imm,
                }
            }
            InstrKind::And => {
                let (dest, src_reg, src_reg_imm) = self.expect_arith_operands()?;
                AirStmt::And {
                    dest,
                    src_reg,
                    src_reg_imm,
                }
            }
            InstrKind::Br(flag) => {
                let dest_label = self.expect_label()?;
                AirStmt::Branch { flag, dest_label }
            }
            InstrKind::Jmp => {
                let base = self.expect_reg()?;
                AirStmt::Jump { base }
            }
            // RET is a jump through the return address register
            InstrKind::Ret => AirStmt::Jump {
                base: Register::R7,
            },
            InstrKind::Jsr => {
                let dest_label = self.expect_label()?;
                AirStmt::JumpSub { dest_label }
            }
            InstrKind::Jsrr => {
                let base = self.expect_reg()?;
                AirStmt::JumpSubReg { base }
            }
            InstrKind::Ld => {
                let dest = self.expect_reg()?;
                let src_label = self.expect_label()?;
                AirStmt::Load { dest, src_label }
            }
            InstrKind::Ldi => {
                let dest = self.expect_reg()?;
                let src_label = self.expect_label()?;
                AirStmt::LoadInd { dest, src_label }
            }
            InstrKind::Ldr => {
                let dest = self.expect_reg()?;
                let base = self.expect_reg()?;
                let offset = self.expect_lit(Bits::Signed(6))?;
                AirStmt::LoadOffs { dest, base, offset }
            }
            InstrKind::Lea => {
                let dest = self.expect_reg()?;
                let src_label = self.expect_label()?;
                AirStmt::LoadEAddr { dest, src_label }
            }
            InstrKind::Not => {
                let dest = self.expect_reg()?;
                let src_reg = self.expect_reg()?;
                AirStmt::Not { dest, src_reg }
            }
            InstrKind::Rti => AirStmt::Interrupt,
            InstrKind::St => {
                let src_reg = self.expect_reg()?;
                let dest_label = self.expect_label()?;
                AirStmt::Store {
                    src_reg,
                    dest_label,
                }
            }
            InstrKind::Sti => {
                let src_reg = self.expect_reg()?;
                let dest_label = self.expect_label()?;
                AirStmt::StoreInd {
                    src_reg,
                    dest_label,
                }
            }
            InstrKind::Str => {
                let src_reg = self.expect_reg()?;
                let base = self.expect_reg()?;
                let offset = self.expect_lit(Bits::Signed(6))?;
                AirStmt::StoreOffs {
                    src_reg,
                    base,
                    offset,
                }
            }
        };

        self.air.add_stmt(stmt);
        Ok(())
    }

    fn parse_trap(&mut self, kind: TrapKind) -> Result<()> {
        // Convert keyword trap to trap vector
        let trap_vect = match kind {
            TrapKind::Generic => self.expect_lit(Bits::Unsigned(8))?,
            TrapKind::Getc => 0x20,
            TrapKind::Out => 0x21,
            TrapKind::Puts => 0x22,
            TrapKind::In => 0x23,
            TrapKind::Putsp => 0x24,
            TrapKind::Halt => 0x25,
        } as u8;

        self.air.add_stmt(AirStmt::Trap { trap_vect });
        Ok(())
    }

    /// Shared operand shape of ADD and AND: two registers and either a third
    /// register or a 5-bit immediate.
    fn expect_arith_operands(&mut self) -> Result<(Register, Register, ImmediateOrReg)> {
        let dest = self.expect_reg()?;
        let src_reg = self.expect_reg()?;
        let third = match self.toks.peek() {
            Some(tok) if matches!(tok.kind, TokenKind::Reg(_)) => {
                ImmediateOrReg::Reg(self.expect_reg()?)
            }
            Some(tok) if matches!(tok.kind, TokenKind::Lit(_)) => {
                let val = self.expect_lit(Bits::Signed(5))?;
                ImmediateOrReg::Imm5(val as u8)
            }
            Some(tok) => {
                return Err(error::parse_generic_unexpected(
                    self.src,
                    "register or numeric literal",
                    tok,
                ))
            }
            None => return Err(error::parse_eof(self.src)),
        };
        Ok((dest, src_reg, third))
    }

    fn expect(&mut self, expected: TokenKind) -> Result<Token> {
        match self.toks.next() {
            Some(tok) if tok.kind == expected => Ok(tok),
            Some(unexpected) => Err(error::parse_generic_unexpected(
                self.src,
                &expected.to_string(),
                &unexpected,
            )),
            None => Err(error::parse_eof(self.src)),
        }
    }

    fn expect_where(
        &mut self,
        mut check: impl FnMut(&TokenKind) -> bool,
        expected: &str,
    ) -> Result<Token> {
        match self.toks.next() {
            Some(tok) if check(&tok.kind) => Ok(tok),
            Some(unexpected) => Err(error::parse_generic_unexpected(
                self.src,
                expected,
                &unexpected,
            )),
            None => Err(error::parse_eof(self.src)),
        }
    }

    fn expect_label(&mut self) -> Result<LabelRef> {
        let tok = self.expect(TokenKind::Label)?;
        Ok(LabelRef::new(self.get_span(tok.span), tok.span))
    }

    fn expect_reg(&mut self) -> Result<Register> {
        match self
            .expect_where(|kind| matches!(kind, TokenKind::Reg(_)), "register")?
            .kind
        {
            TokenKind::Reg(reg) => Ok(reg),
            _ => unreachable!(),
        }
    }

    /// Take a numeric literal and validate that it fits the field width.
    fn expect_lit(&mut self, bits: Bits) -> Result<u16> {
        let tok = self.expect_where(
            |kind| {
                matches!(
                    kind,
                    TokenKind::Lit(LiteralKind::Dec(_) | LiteralKind::Hex(_))
                )
            },
            "numeric literal",
        )?;
        let (val, is_negative) = match tok.kind {
            TokenKind::Lit(LiteralKind::Dec(val)) => (val as u16, val < 0),
            TokenKind::Lit(LiteralKind::Hex(val)) => (val, false),
            _ => unreachable!(),
        };
        let in_range = match bits {
            Bits::Signed(num_bits) => {
                let val = val as i16 as i32;
                let limit = 1i32 << (num_bits - 1);
                (-limit..limit).contains(&val)
            }
            Bits::Unsigned(num_bits) => {
                !is_negative && (val as u32) < (1u32 << num_bits)
            }
        };
        if in_range {
            Ok(val)
        } else {
            Err(error::parse_lit_range(
                tok.span,
                self.src,
                val,
                &bits.to_string(),
            ))
        }
    }
}

// Convenient way to pass around bit limits
enum Bits {
    Signed(u32),
    Unsigned(u32),
}

impl Display for Bits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let val = match self {
            Bits::Signed(val) => val,
            Bits::Unsigned(val) => val,
        };
        f.write_str(&val.to_string())
    }
}
