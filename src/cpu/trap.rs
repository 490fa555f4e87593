//! Trap routines.
//!
//! TRAP invokes one of six built-in I/O services instead of jumping into
//! an OS image. All console traffic goes through the injected [`Console`].
//! String traps read memory without device side effects and give up after
//! one full pass over the address space.

use crate::console::{Console, ConsoleError};
use crate::cpu::{Memory, Registers};
use crate::cpu::memory::MEMORY_SIZE;
use crate::cpu::registers::Reg;
use serde::{Serialize, Deserialize};

/// Prompt printed by the IN trap.
pub const IN_PROMPT: &str = "Enter a character: ";

/// The defined trap vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrapVector {
    /// Read a character into R0 without echo.
    Getc,
    /// Write the low byte of R0.
    Out,
    /// Write a one-character-per-word string at R0.
    Puts,
    /// Prompt, read a character into R0 with echo.
    In,
    /// Write a two-characters-per-word string at R0.
    Putsp,
    /// Stop the machine.
    Halt,
}

impl TrapVector {
    pub const GETC: u8 = 0x20;
    pub const OUT: u8 = 0x21;
    pub const PUTS: u8 = 0x22;
    pub const IN: u8 = 0x23;
    pub const PUTSP: u8 = 0x24;
    pub const HALT: u8 = 0x25;

    /// Look up a vector. Returns `None` for undefined vectors.
    pub fn from_u8(vector: u8) -> Option<Self> {
        match vector {
            Self::GETC => Some(TrapVector::Getc),
            Self::OUT => Some(TrapVector::Out),
            Self::PUTS => Some(TrapVector::Puts),
            Self::IN => Some(TrapVector::In),
            Self::PUTSP => Some(TrapVector::Putsp),
            Self::HALT => Some(TrapVector::Halt),
            _ => None,
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            TrapVector::Getc => Self::GETC,
            TrapVector::Out => Self::OUT,
            TrapVector::Puts => Self::PUTS,
            TrapVector::In => Self::IN,
            TrapVector::Putsp => Self::PUTSP,
            TrapVector::Halt => Self::HALT,
        }
    }

    /// Assembler alias, e.g. `HALT`.
    pub fn mnemonic(self) -> &'static str {
        match self {
            TrapVector::Getc => "GETC",
            TrapVector::Out => "OUT",
            TrapVector::Puts => "PUTS",
            TrapVector::In => "IN",
            TrapVector::Putsp => "PUTSP",
            TrapVector::Halt => "HALT",
        }
    }
}

/// What the machine should do after a trap returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapOutcome {
    Continue,
    Halt,
}

/// Run the trap routine for `vector`.
///
/// R7 has already been set by the caller. Undefined vectors do nothing
/// and execution resumes after the TRAP.
pub fn dispatch(
    regs: &mut Registers,
    mem: &Memory,
    vector: u8,
    io: &mut dyn Console,
) -> Result<TrapOutcome, ConsoleError> {
    let Some(trap) = TrapVector::from_u8(vector) else {
        log::warn!("ignoring undefined trap vector x{:02X} at x{:04X}", vector, regs.pc.wrapping_sub(1));
        return Ok(TrapOutcome::Continue);
    };

    match trap {
        TrapVector::Getc => {
            let ch = io.read_char()?;
            regs.set(Reg::R0, ch as u16);
        }

        TrapVector::Out => {
            io.write_char(regs.get(Reg::R0) as u8)?;
            io.flush()?;
        }

        TrapVector::Puts => {
            let mut addr = regs.get(Reg::R0);
            for _ in 0..MEMORY_SIZE {
                let word = mem.peek(addr);
                if word == 0 {
                    break;
                }
                io.write_char(word as u8)?;
                addr = addr.wrapping_add(1);
            }
            io.flush()?;
        }

        TrapVector::In => {
            io.write_str(IN_PROMPT)?;
            io.flush()?;
            let ch = io.read_char()?;
            io.write_char(ch)?;
            io.flush()?;
            regs.set(Reg::R0, ch as u16);
        }

        TrapVector::Putsp => {
            let mut addr = regs.get(Reg::R0);
            'words: for _ in 0..MEMORY_SIZE {
                let word = mem.peek(addr);
                for byte in word.to_le_bytes() {
                    if byte == 0 {
                        break 'words;
                    }
                    io.write_char(byte)?;
                }
                addr = addr.wrapping_add(1);
            }
            io.flush()?;
        }

        TrapVector::Halt => {
            io.flush()?;
            log::debug!("HALT at x{:04X}", regs.pc.wrapping_sub(1));
            return Ok(TrapOutcome::Halt);
        }
    }

    Ok(TrapOutcome::Continue)
}
