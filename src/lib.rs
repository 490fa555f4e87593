//! # LC-3 VM
//!
//! An emulator for the LC-3, a 16-bit educational computer.
//!
//! The machine is an explicit [`Machine`] value owned by the caller.
//! Console I/O is injected through the [`Console`] trait, so the same
//! machine runs against a real terminal, the debugger, or scripted
//! input in tests.

pub mod cpu;
pub mod console;
pub mod asm;

#[cfg(feature = "tui")]
pub mod tui;

#[cfg(feature = "wasm")]
pub mod wasm;

// Re-export commonly used types
pub use cpu::{Machine, MachineState, CpuError, Memory, Registers, Reg, Condition, Instruction};
pub use console::{Console, ConsoleError, BufferedConsole};
pub use asm::{Image, ImageError, load_image, disassemble};

#[cfg(feature = "terminal")]
pub use console::{RawModeGuard, TerminalConsole};

#[cfg(feature = "tui")]
pub use tui::run_debugger;
