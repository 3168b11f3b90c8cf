use std::io::{stdin, stdout, IsTerminal, Read, Write};

use console::Term;

use crate::runtime::IoPort;

/// Character port backed by the process terminal. Reads are unbuffered when
/// stdin is an interactive terminal, and plain byte reads when input is
/// piped, so blackbox tests can feed scripted input.
pub struct ConsolePort;

impl IoPort for ConsolePort {
    fn read_char(&mut self) -> std::io::Result<u8> {
        if stdin().is_terminal() {
            let cons = Term::stdout();
            let ch = cons.read_char()?;
            Ok(ch as u8)
        } else {
            let mut buf = [0; 1];
            stdin().read_exact(&mut buf)?;
            Ok(buf[0])
        }
    }

    fn write_char(&mut self, byte: u8) -> std::io::Result<()> {
        let mut out = stdout();
        out.write_all(&[byte])?;
        out.flush()
    }
}
