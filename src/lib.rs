// Assembling
mod parser;
pub use parser::AsmParser;
mod air;
pub use air::{Air, AirStmt};
mod obj;
pub use obj::ObjFile;

// Running
mod instr;
pub use instr::Instruction;
mod runtime;
pub use runtime::{CondCode, Core, ExecError, IoPort, Status};
mod term;
pub use term::ConsolePort;

mod error;
mod lexer;
mod symbol;
pub use symbol::SymbolTable;

/// Amount of lines to show as context, each side of focus line (line containing span).
pub const DIAGNOSTIC_CONTEXT_LINES: usize = 8;

/// Assemble a source file into object code: parsing builds the symbol table
/// in pass 1, emission resolves and encodes in pass 2. Any error aborts the
/// whole assembly with a source-located diagnostic and no partial output.
pub fn assemble(src: &str) -> miette::Result<ObjFile> {
    let parser = AsmParser::new(src)?;
    let air = parser.parse()?;
    air.to_obj(src)
}
