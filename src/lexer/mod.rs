use std::fmt;

use miette::Result;

use crate::error;
use crate::lexer::cursor::Cursor;
use crate::symbol::{DirKind, Flag, InstrKind, Register, Span, TrapKind};

pub mod cursor;

/// Lexed unit of source with its location.
#[derive(Clone, PartialEq, Debug)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Token { kind, span }
    }

    /// Raw word injected by the preprocessor in place of data directives.
    pub fn byte(val: u16) -> Self {
        Token::new(TokenKind::Byte(val), Span::dummy())
    }

    pub fn nullbyte() -> Self {
        Token::byte(0)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LiteralKind {
    /// Prefixed with `x` or `0x`, always non-negative.
    Hex(u16),
    /// Prefixed with `#`, two's complement.
    Dec(i16),
    /// Value is lexed lazily via the token span to avoid the allocation.
    Str,
}

#[derive(Clone, PartialEq, Debug)]
pub enum TokenKind {
    Label,
    Instr(InstrKind),
    Trap(TrapKind),
    Lit(LiteralKind),
    Dir(DirKind),
    Reg(Register),
    /// Preprocessor-emitted raw word; does not exist in lexed source.
    Byte(u16),
    Whitespace,
    Comment,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let desc = match self {
            TokenKind::Label => "label",
            TokenKind::Instr(_) => "instruction",
            TokenKind::Trap(_) => "trap",
            TokenKind::Lit(LiteralKind::Str) => "string literal",
            TokenKind::Lit(_) => "numeric literal",
            TokenKind::Dir(_) => "directive",
            TokenKind::Reg(_) => "register",
            TokenKind::Byte(_) => "raw word",
            TokenKind::Whitespace => "whitespace",
            TokenKind::Comment => "comment",
            TokenKind::Eof => "end of file",
        };
        f.write_str(desc)
    }
}

/// Test if a character is considered to be whitespace.
///
/// Commas and colons are essentially whitespace in LC3: commas separate
/// operands, colons may trail label definitions.
pub(crate) fn is_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\n' | '\t' | '\r' | ',' | ':')
}

/// Test if a character is considered an LC3 identifier character.
pub(crate) fn is_id(c: char) -> bool {
    matches!(c, 'a'..='z' | 'A'..='Z' | '0'..='9' | '_')
}

/// Lex an entire source into a token stream, dropping whitespace and comments.
pub fn tokenize(src: &str) -> Result<Vec<Token>> {
    let mut cur = Cursor::new(src);
    let mut toks = Vec::new();
    loop {
        let tok = cur.advance_real()?;
        match tok.kind {
            TokenKind::Eof => break,
            _ => toks.push(tok),
        }
    }
    Ok(toks)
}

impl Cursor<'_> {
    /// Advance to the next semantic token, skipping whitespace and comments.
    pub fn advance_real(&mut self) -> Result<Token> {
        loop {
            let tok = self.advance_token()?;
            match tok.kind {
                TokenKind::Whitespace | TokenKind::Comment => continue,
                _ => return Ok(tok),
            }
        }
    }

    pub fn advance_token(&mut self) -> Result<Token> {
        self.start_token();
        let first_char = match self.bump() {
            Some(c) => c,
            None => return Ok(Token::new(TokenKind::Eof, self.token_span())),
        };
        let kind = match first_char {
            ';' => {
                self.take_while(|c| c != '\n');
                TokenKind::Comment
            }
            c if is_whitespace(c) => {
                self.take_while(is_whitespace);
                TokenKind::Whitespace
            }
            // Decimal literal
            '#' => {
                if self.first() == '-' {
                    let _ = self.bump();
                }
                self.take_while(|c| c.is_ascii_digit());
                let val = self.token_str()[1..]
                    .parse::<i16>()
                    .map_err(|e| error::lex_invalid_lit(self.token_span(), self.src(), e))?;
                TokenKind::Lit(LiteralKind::Dec(val))
            }
            // String literal, with escapes handled by the preprocessor
            '"' => loop {
                match self.bump() {
                    Some('\\') => {
                        let _ = self.bump();
                    }
                    Some('"') => break TokenKind::Lit(LiteralKind::Str),
                    Some('\n') | None => {
                        return Err(error::lex_unclosed_str(self.token_span(), self.src()))
                    }
                    Some(_) => continue,
                }
            },
            // Directive
            '.' => {
                self.take_while(is_id);
                match self.token_str()[1..].to_ascii_lowercase().as_str() {
                    "orig" => TokenKind::Dir(DirKind::Orig),
                    "end" => TokenKind::Dir(DirKind::End),
                    "stringz" => TokenKind::Dir(DirKind::Stringz),
                    "blkw" => TokenKind::Dir(DirKind::Blkw),
                    "fill" => TokenKind::Dir(DirKind::Fill),
                    _ => return Err(error::lex_invalid_dir(self.token_span(), self.src())),
                }
            }
            c if is_id(c) => {
                self.take_while(is_id);
                self.classify_word()?
            }
            _ => return Err(error::lex_unknown(self.token_span(), self.src())),
        };
        Ok(Token::new(kind, self.token_span()))
    }

    /// Sort a bare identifier into mnemonic, trap, register, hex literal or
    /// label. Mnemonics are case-insensitive, labels are not.
    fn classify_word(&self) -> Result<TokenKind> {
        let word = self.token_str();
        let lower = word.to_ascii_lowercase();

        let kind = match lower.as_str() {
            "add" => TokenKind::Instr(InstrKind::Add),
            "and" => TokenKind::Instr(InstrKind::And),
            "jmp" => TokenKind::Instr(InstrKind::Jmp),
            "jsr" => TokenKind::Instr(InstrKind::Jsr),
            "jsrr" => TokenKind::Instr(InstrKind::Jsrr),
            "ld" => TokenKind::Instr(InstrKind::Ld),
            "ldi" => TokenKind::Instr(InstrKind::Ldi),
            "ldr" => TokenKind::Instr(InstrKind::Ldr),
            "lea" => TokenKind::Instr(InstrKind::Lea),
            "not" => TokenKind::Instr(InstrKind::Not),
            "ret" => TokenKind::Instr(InstrKind::Ret),
            "rti" => TokenKind::Instr(InstrKind::Rti),
            "st" => TokenKind::Instr(InstrKind::St),
            "sti" => TokenKind::Instr(InstrKind::Sti),
            "str" => TokenKind::Instr(InstrKind::Str),
            "trap" => TokenKind::Trap(TrapKind::Generic),
            "getc" => TokenKind::Trap(TrapKind::Getc),
            "out" => TokenKind::Trap(TrapKind::Out),
            "puts" => TokenKind::Trap(TrapKind::Puts),
            "in" => TokenKind::Trap(TrapKind::In),
            "putsp" => TokenKind::Trap(TrapKind::Putsp),
            "halt" => TokenKind::Trap(TrapKind::Halt),
            _ => {
                if let Some(reg) = lower.strip_prefix('r').and_then(|n| n.parse().ok()) {
                    TokenKind::Reg(reg)
                } else if let Some(flag) =
                    lower.strip_prefix("br").and_then(Flag::from_suffix)
                {
                    TokenKind::Instr(InstrKind::Br(flag))
                } else if let Some(hex) = strip_hex_prefix(word) {
                    let val = u16::from_str_radix(hex, 16)
                        .map_err(|e| error::lex_invalid_lit(self.token_span(), self.src(), e))?;
                    TokenKind::Lit(LiteralKind::Hex(val))
                } else {
                    TokenKind::Label
                }
            }
        };
        Ok(kind)
    }
}

/// A word is a hex literal if stripping `x`, `X` or `0x` leaves only hex digits.
fn strip_hex_prefix(word: &str) -> Option<&str> {
    let hex = word
        .strip_prefix("0x")
        .or_else(|| word.strip_prefix("0X"))
        .or_else(|| word.strip_prefix('x'))
        .or_else(|| word.strip_prefix('X'))?;
    if !hex.is_empty() && hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        Some(hex)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lex_instruction_line() {
        assert_eq!(
            kinds("add r0, r1, #7"),
            vec![
                TokenKind::Instr(InstrKind::Add),
                TokenKind::Reg(Register::R0),
                TokenKind::Reg(Register::R1),
                TokenKind::Lit(LiteralKind::Dec(7)),
            ]
        );
    }

    #[test]
    fn lex_case_insensitive_mnemonics() {
        assert_eq!(kinds("ADD Add add"), vec![TokenKind::Instr(InstrKind::Add); 3]);
    }

    #[test]
    fn lex_hex_forms() {
        assert_eq!(
            kinds("x3000 X3000 0x3000"),
            vec![TokenKind::Lit(LiteralKind::Hex(0x3000)); 3]
        );
    }

    #[test]
    fn lex_negative_dec() {
        assert_eq!(kinds("#-16"), vec![TokenKind::Lit(LiteralKind::Dec(-16))]);
    }

    #[test]
    fn lex_comment_stripped() {
        assert_eq!(
            kinds("halt ; stop the machine"),
            vec![TokenKind::Trap(TrapKind::Halt)]
        );
    }

    #[test]
    fn lex_branch_permutations() {
        assert_eq!(
            kinds("br brnzp BRpzn brzp"),
            vec![
                TokenKind::Instr(InstrKind::Br(Flag::Nzp)),
                TokenKind::Instr(InstrKind::Br(Flag::Nzp)),
                TokenKind::Instr(InstrKind::Br(Flag::Nzp)),
                TokenKind::Instr(InstrKind::Br(Flag::Zp)),
            ]
        );
    }

    #[test]
    fn lex_label_with_colon() {
        assert_eq!(
            kinds("loop: add r0, r0, #1"),
            vec![
                TokenKind::Label,
                TokenKind::Instr(InstrKind::Add),
                TokenKind::Reg(Register::R0),
                TokenKind::Reg(Register::R0),
                TokenKind::Lit(LiteralKind::Dec(1)),
            ]
        );
    }

    #[test]
    fn lex_word_starting_like_branch_is_label() {
        assert_eq!(kinds("break"), vec![TokenKind::Label]);
    }

    #[test]
    fn lex_unclosed_string() {
        assert!(tokenize("label .stringz \"oops").is_err());
    }

    #[test]
    fn lex_invalid_directive() {
        assert!(tokenize(".bogus").is_err());
    }

    #[test]
    fn lex_oversized_literal() {
        assert!(tokenize("x10000").is_err());
        assert!(tokenize("#40000").is_err());
    }
}
