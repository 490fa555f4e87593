//! TUI debugger for the LC-3 emulator.
//!
//! Provides an interactive terminal-based debugger with:
//! - Register and condition flag view
//! - Memory view
//! - Captured console output
//! - Step/run/breakpoint controls
//! - Disassembly view

mod app;
mod ui;

pub use app::{DebuggerApp, run_debugger};
