use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;
use miette::{bail, IntoDiagnostic, Result};

use braid::{assemble, ConsolePort, Core, ObjFile, Status};

/// Braid is an assembler and stepping simulator for the LC3 teaching architecture.
#[derive(Parser)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Quickly provide a `.asm` file to run
    path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Run text `.asm` or binary `.obj` file directly and output to terminal
    Run {
        /// `.asm` or `.obj` file to run
        name: PathBuf,
        /// Stop after this many instruction cycles
        #[arg(short, long)]
        limit: Option<u64>,
    },
    /// Create binary `.obj` file to run later or view compiled data
    Compile {
        /// `.asm` file to compile
        name: PathBuf,
        /// Destination to output .obj file
        dest: Option<PathBuf>,
    },
    /// Check a `.asm` file without running or outputting binary
    Check {
        /// File to check
        name: PathBuf,
    },
    /// Print the object words and symbol table for a `.asm` file
    Dump {
        /// `.asm` file to inspect
        name: PathBuf,
    },
}

fn main() -> miette::Result<()> {
    use MsgColor::*;
    let args = Args::parse();

    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new() //
                .context_lines(braid::DIAGNOSTIC_CONTEXT_LINES)
                .build(),
        )
    }))?;

    if let Some(command) = args.command {
        match command {
            Command::Run { name, limit } => run(&name, limit),
            Command::Compile { name, dest } => {
                file_message(Green, "Assembling", &name);
                let contents = fs::read_to_string(&name).into_diagnostic()?;
                let obj = assemble(&contents)?;

                let out_file_name = dest.unwrap_or_else(|| name.with_extension("obj"));
                let mut file = File::create(&out_file_name).into_diagnostic()?;
                file.write_all(&obj.to_bytes()).into_diagnostic()?;

                message(Green, "Finished", "emit binary");
                file_message(Green, "Saved", &out_file_name);
                Ok(())
            }
            Command::Check { name } => {
                file_message(Green, "Checking", &name);
                let contents = fs::read_to_string(&name).into_diagnostic()?;
                let _ = assemble(&contents)?;
                message(Green, "Success", "no errors found!");
                Ok(())
            }
            Command::Dump { name } => {
                file_message(Green, "Assembling", &name);
                let contents = fs::read_to_string(&name).into_diagnostic()?;
                let parser = braid::AsmParser::new(&contents)?;
                let air = parser.parse()?;
                let obj = air.to_obj(&contents)?;

                println!("------- Object --------");
                for (i, word) in obj.words().iter().enumerate() {
                    let addr = obj.orig().wrapping_add(i as u16);
                    println!("x{addr:04X}: x{word:04X}  {word:#018b}");
                }
                if !air.symbols().is_empty() {
                    println!("------- Symbols -------");
                    for (name, addr) in air.symbols().iter() {
                        println!("x{addr:04X}: {name}");
                    }
                }
                Ok(())
            }
        }
    } else if let Some(path) = args.path {
        run(&path, None)
    } else {
        println!("\n~ braid v{VERSION} ~");
        println!("{SHORT_INFO}");
        Ok(())
    }
}

#[allow(unused)]
enum MsgColor {
    Green,
    Cyan,
    Red,
}

fn file_message(color: MsgColor, left: &str, right: &PathBuf) {
    message(color, left, format!("target {}", right.display()));
}

fn message(color: MsgColor, left: &str, right: impl std::fmt::Display) {
    let left = match color {
        MsgColor::Green => left.green(),
        MsgColor::Cyan => left.cyan(),
        MsgColor::Red => left.red(),
    };
    println!("{left:>12} {right}");
}

fn run(name: &PathBuf, limit: Option<u64>) -> Result<()> {
    let obj = load_program(name)?;

    let mut core = Core::with_port(Box::new(ConsolePort));
    core.load_obj(&obj.to_words()).into_diagnostic()?;

    message(MsgColor::Green, "Running", "emitted binary");
    let mut cycles: u64 = 0;
    while core.status() == Status::Running {
        core.step().into_diagnostic()?;
        cycles += 1;
        if limit.is_some_and(|limit| cycles >= limit) {
            message(MsgColor::Cyan, "Stopped", "cycle limit reached");
            break;
        }
    }
    if core.status() == Status::Halted {
        println!("\n{:>12}", "Halted".cyan());
    }

    dump_registers(&core);
    file_message(MsgColor::Green, "Completed", name);
    Ok(())
}

fn load_program(name: &PathBuf) -> Result<ObjFile> {
    let Some(ext) = name.extension() else {
        bail!("File has no extension. Exiting...");
    };
    match ext.to_str() {
        Some("obj" | "lc3") => {
            // Read to byte buffer
            let mut file = File::open(name).into_diagnostic()?;
            let mut buffer = Vec::new();
            let _ = file.read_to_end(&mut buffer).into_diagnostic()?;
            ObjFile::from_bytes(&buffer)
        }
        Some("asm") => {
            file_message(MsgColor::Green, "Assembling", name);
            let contents = fs::read_to_string(name).into_diagnostic()?;
            assemble(&contents)
        }
        _ => bail!("File has unknown extension. Exiting..."),
    }
}

fn dump_registers(core: &Core) {
    println!("------ Registers ------");
    for (i, reg) in core.registers_view().iter().enumerate() {
        println!("r{i}: x{reg:04X} {:>10}", *reg as i16);
    }
    println!("pc: x{:04X}", core.pc());
    println!("-----------------------");
}

const SHORT_INFO: &str = r"
Welcome to braid, an assembler and stepping simulator
for the LC3 teaching architecture.
Please use `-h` or `--help` to access the usage instructions.
";

const VERSION: &str = env!("CARGO_PKG_VERSION");
