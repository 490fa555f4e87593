//! LC-3 VM - CLI Entry Point
//!
//! Commands:
//! - `lc3-vm <image>...` - Load object images and run until HALT
//! - `lc3-vm run <image>...` - Same, with run options
//! - `lc3-vm disasm <image>` - Disassemble an object image
//! - `lc3-vm debug <image>...` - Interactive debugger

use clap::{ArgAction, Parser, Subcommand};
use log::LevelFilter;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};
use std::path::{Path, PathBuf};

use lc3vm::{ConsoleError, CpuError, Image, Machine, RawModeGuard, TerminalConsole};

/// Normal HALT.
const EXIT_HALT: i32 = 0;
/// An image could not be loaded.
const EXIT_LOAD: i32 = 1;
/// No image given.
const EXIT_USAGE: i32 = 2;
/// Reserved opcode or console failure.
const EXIT_FAULT: i32 = 3;
/// The program halted but `--dump-state` could not be written.
const EXIT_DUMP: i32 = 4;
/// Ctrl-C.
const EXIT_INTERRUPT: i32 = 130;

/// Instructions between checks for Ctrl-C.
const INTERRUPT_CHECK_INTERVAL: u64 = 4096;

#[derive(Parser)]
#[command(name = "lc3-vm")]
#[command(version)]
#[command(about = "An emulator for the LC-3 educational computer")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Object images to load, in order
    images: Vec<String>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Run images until HALT
    Run {
        /// Object images to load, in order
        images: Vec<String>,
        /// Initial PC (x3000, 0x3000 or decimal); defaults to the first image's origin
        #[arg(long, value_parser = parse_addr)]
        pc: Option<u16>,
        /// Stop after this many instructions
        #[arg(short, long)]
        max_cycles: Option<u64>,
        /// Write final registers and state as JSON
        #[arg(long)]
        dump_state: Option<PathBuf>,
    },
    /// Disassemble an object image
    Disasm {
        /// Path to the object image
        image: String,
    },
    /// Interactive debugger
    #[cfg(feature = "tui")]
    Debug {
        /// Object images to load, in order
        images: Vec<String>,
        /// Initial PC; defaults to the first image's origin
        #[arg(long, value_parser = parse_addr)]
        pc: Option<u16>,
        /// Characters to feed the program's keyboard
        #[arg(short, long, default_value = "")]
        input: String,
    },
}

struct RunOptions {
    pc: Option<u16>,
    max_cycles: Option<u64>,
    dump_state: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let code = match cli.command {
        Some(Commands::Run { images, pc, max_cycles, dump_state }) => {
            run_images(&images, RunOptions { pc, max_cycles, dump_state })
        }
        Some(Commands::Disasm { image }) => disassemble_file(&image),
        #[cfg(feature = "tui")]
        Some(Commands::Debug { images, pc, input }) => debug_images(&images, pc, input),
        None => run_images(&cli.images, RunOptions { pc: None, max_cycles: None, dump_state: None }),
    };

    std::process::exit(code);
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    // A second init only fails if a logger is already installed.
    let _ = TermLogger::init(level, Config::default(), TerminalMode::Stderr, ColorChoice::Auto);
}

/// Parse an address written as `x3000`, `0x3000` or decimal.
fn parse_addr(s: &str) -> Result<u16, String> {
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix('x')) {
        u16::from_str_radix(hex, 16)
    } else {
        s.parse::<u16>()
    };
    parsed.map_err(|e| format!("invalid address '{}': {}", s, e))
}

/// Load every image in order. Prints the failure and returns `None` if
/// any of them cannot be read.
fn load_all(paths: &[String]) -> Option<Vec<Image>> {
    let mut images = Vec::with_capacity(paths.len());
    for path in paths {
        match lc3vm::load_image(path) {
            Ok(image) => {
                log::info!("loaded {} ({} words at x{:04X})", path, image.len(), image.origin);
                images.push(image);
            }
            Err(e) => {
                eprintln!("❌ Failed to load image {}: {}", path, e);
                return None;
            }
        }
    }
    Some(images)
}

fn run_images(paths: &[String], opts: RunOptions) -> i32 {
    if paths.is_empty() {
        eprintln!("lc3-vm [image-file1] ...");
        return EXIT_USAGE;
    }

    let Some(images) = load_all(paths) else {
        return EXIT_LOAD;
    };

    let mut machine = Machine::new();
    for image in &images {
        machine.load_image(image);
    }
    let start = opts.pc.unwrap_or(images[0].origin);
    machine.regs.jump(start);

    // Held for the whole run; dropped before anything is reported.
    let guard = match RawModeGuard::enable() {
        Ok(guard) => Some(guard),
        Err(e) => {
            log::warn!("console stays in line mode: {}", e);
            None
        }
    };
    let mut console = TerminalConsole::new();
    let result = execute(&mut machine, &mut console, opts.max_cycles);
    drop(guard);

    let mut dumped = true;
    if let Some(path) = &opts.dump_state {
        if let Err(e) = dump_state(&machine, path) {
            eprintln!("❌ Failed to write state to {}: {}", path.display(), e);
            dumped = false;
        }
    }

    match &result {
        Ok(()) if !machine.is_halted() => {
            eprintln!();
            eprintln!("⚠️  Reached max cycles limit ({}) at x{:04X}", machine.cycles, machine.regs.pc);
        }
        Ok(()) => {}
        Err(CpuError::Console(ConsoleError::Interrupted)) => eprintln!(),
        Err(e) => {
            eprintln!();
            eprintln!("❌ Machine fault: {}", e);
        }
    }

    exit_code(&result, dumped)
}

/// Map the outcome of a run to the process exit status.
fn exit_code(result: &Result<(), CpuError>, dumped: bool) -> i32 {
    match result {
        Ok(()) if dumped => EXIT_HALT,
        Ok(()) => EXIT_DUMP,
        Err(CpuError::Console(ConsoleError::Interrupted)) => EXIT_INTERRUPT,
        Err(_) => EXIT_FAULT,
    }
}

/// Run to HALT (or the cycle limit), checking for Ctrl-C between batches.
fn execute(
    machine: &mut Machine,
    console: &mut TerminalConsole,
    max_cycles: Option<u64>,
) -> Result<(), CpuError> {
    let limit = max_cycles.unwrap_or(u64::MAX);

    while machine.is_running() && machine.cycles < limit {
        let batch = INTERRUPT_CHECK_INTERVAL.min(limit - machine.cycles);
        machine.run_limited(console, batch)?;
        console.drain_events()?;
    }

    Ok(())
}

fn dump_state(machine: &Machine, path: &Path) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(&machine.snapshot())?;
    std::fs::write(path, json)
}

fn disassemble_file(path: &str) -> i32 {
    let image = match lc3vm::load_image(path) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("❌ Failed to load image {}: {}", path, e);
            return EXIT_LOAD;
        }
    };

    print!("{}", lc3vm::disassemble(image.origin, &image.words));
    EXIT_HALT
}

#[cfg(feature = "tui")]
fn debug_images(paths: &[String], pc: Option<u16>, input: String) -> i32 {
    if paths.is_empty() {
        eprintln!("lc3-vm debug [image-file1] ...");
        return EXIT_USAGE;
    }

    let Some(images) = load_all(paths) else {
        return EXIT_LOAD;
    };
    let start = pc.unwrap_or(images[0].origin);

    match lc3vm::run_debugger(images, start, input) {
        Ok(()) => EXIT_HALT,
        Err(e) => {
            eprintln!("❌ Debugger error: {}", e);
            EXIT_FAULT
        }
    }
}
