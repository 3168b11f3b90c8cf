use std::num::ParseIntError;

use miette::{miette, LabeledSpan, Report, Severity};

use crate::lexer::Token;
use crate::symbol::Span;

// Lexer errors

pub fn lex_invalid_dir(span: Span, src: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "lex::dir",
        help = "valid directives are .orig, .fill, .blkw, .stringz, .end",
        labels = vec![LabeledSpan::at(span, "incorrect directive")],
        "Encountered an invalid directive.",
    )
    .with_source_code(src.to_string())
}

pub fn lex_unclosed_str(span: Span, src: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "lex::str_lit",
        help = "make sure to close string literals with a \" character.",
        labels = vec![LabeledSpan::at(span, "incorrect literal")],
        "Encountered an unterminated string literal.",
    )
    .with_source_code(src.to_string())
}

pub fn lex_invalid_lit(span: Span, src: &str, e: ParseIntError) -> Report {
    miette!(
        severity = Severity::Error,
        code = "lex::bad_lit",
        help = "ranges from -32,768 to 32,767 or 0 to 65,535 are allowed",
        labels = vec![LabeledSpan::at(span, "incorrect literal")],
        "Encountered an invalid literal: {e}",
    )
    .with_source_code(src.to_string())
}

pub fn lex_unknown(span: Span, src: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "lex::unknown",
        help = "make sure that your int literals start with #",
        labels = vec![LabeledSpan::at(span, "unknown token")],
        "Encountered an unknown token",
    )
    .with_source_code(src.to_string())
}

// Preprocessor errors

pub fn preproc_bad_lit(span: Span, src: &str, is_present: bool) -> Report {
    let (help, label) = if is_present {
        (
            "this directive expects a positive literal",
            "negative literal",
        )
    } else {
        (
            "this directive requires an integer or hex literal to follow",
            "not a numeric literal",
        )
    };
    miette!(
        severity = Severity::Error,
        code = "preproc::bad_lit",
        help = help,
        labels = vec![LabeledSpan::at(span, label)],
        "Expected valid integer or hex literal",
    )
    .with_source_code(src.to_string())
}

pub fn preproc_no_str(span: Span, src: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "preproc::stringz",
        help = ".stringz requires a valid string literal like \"hello\n\"",
        labels = vec![LabeledSpan::at(span, "not a string literal")],
        "Expected a valid string literal.",
    )
    .with_source_code(src.to_string())
}

// Parser errors

pub fn parse_missing_orig(src: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "parse::missing_orig",
        help = "start your program with `.orig x3000` or similar",
        labels = vec![LabeledSpan::at_offset(0, "first statement")],
        "Expected .orig directive before the first statement",
    )
    .with_source_code(src.to_string())
}

pub fn parse_missing_end(src: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "parse::missing_end",
        help = "terminate your program with the .end directive",
        labels = vec![LabeledSpan::at_offset(src.len().saturating_sub(1), "end of file")],
        "Program is not terminated by .end",
    )
    .with_source_code(src.to_string())
}

pub fn parse_duplicate_label(span: Span, src: &str, prev_addr: u16) -> Report {
    miette!(
        severity = Severity::Error,
        code = "parse::duplicate_label",
        help = format!("the label already refers to address x{prev_addr:04X}"),
        labels = vec![LabeledSpan::at(span, "duplicate label")],
        "Duplicate prefix label"
    )
    .with_source_code(src.to_string())
}

pub fn parse_generic_unexpected(src: &str, expected: &str, found: &Token) -> Report {
    miette!(
        severity = Severity::Error,
        code = "parse::unexpected_token",
        help = "check the operands for this instruction",
        labels = vec![LabeledSpan::at(found.span, "unexpected token")],
        "Expected token of type {expected}, found {}",
        found.kind
    )
    .with_source_code(src.to_string())
}

pub fn parse_eof(src: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "parse::unexpected_eof",
        help = "you may be missing operands in your last statement",
        labels = vec![LabeledSpan::at_offset(src.len().saturating_sub(1), "unexpected token")],
        "Unexpected end of file",
    )
    .with_source_code(src.to_string())
}

pub fn parse_lit_range(span: Span, src: &str, val: u16, bits: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "parse::lit_range",
        help = format!("this instruction expects literals that can be contained in {bits} bits"),
        labels = vec![LabeledSpan::at(span, "out-of-range literal")],
        "Found numeric literal {val} of incorrect size",
    )
    .with_source_code(src.to_string())
}

// Emission (pass 2) errors

pub fn emit_undefined_label(span: Span, src: &str, name: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "emit::undefined_label",
        help = "labels are case-sensitive and must be defined somewhere in the file",
        labels = vec![LabeledSpan::at(span, "undefined label")],
        "Reference to undefined label `{name}`",
    )
    .with_source_code(src.to_string())
}

pub fn emit_offs_range(span: Span, src: &str, name: &str, offs: i32, bits: u32) -> Report {
    let limit = 1i32 << (bits - 1);
    miette!(
        severity = Severity::Error,
        code = "emit::offs_range",
        help = format!(
            "this operand is encoded as a {bits}-bit offset, allowing a range of {} to {}",
            -limit,
            limit - 1
        ),
        labels = vec![LabeledSpan::at(span, "label is too far away")],
        "Label `{name}` is {offs} words away from this instruction",
    )
    .with_source_code(src.to_string())
}

pub fn emit_too_long(orig: u16, len: usize) -> Report {
    miette!(
        severity = Severity::Error,
        code = "emit::too_long",
        help = "lower the origin address or shrink reserved data blocks",
        "Program of {len} words loaded at x{orig:04X} does not fit in 65536 words of memory",
    )
}
