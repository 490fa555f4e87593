//! LC-3 registers.
//!
//! The machine has:
//! - R0-R7: eight 16-bit general purpose registers
//! - PC: 16-bit program counter
//! - COND: condition register, exactly one of N, Z or P

use serde::{Serialize, Deserialize};
use std::fmt;

/// Address the program counter starts at when no image says otherwise.
pub const PC_START: u16 = 0x3000;

/// Index of a general purpose register (0-7).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Reg(u8);

impl Reg {
    pub const R0: Reg = Reg(0);
    pub const R1: Reg = Reg(1);
    pub const R2: Reg = Reg(2);
    pub const R3: Reg = Reg(3);
    pub const R4: Reg = Reg(4);
    pub const R5: Reg = Reg(5);
    pub const R6: Reg = Reg(6);
    /// Link register; holds the return address after JSR and TRAP.
    pub const R7: Reg = Reg(7);

    /// Create from the low three bits of `index`.
    #[inline]
    pub const fn new(index: u16) -> Self {
        Reg((index & 0x7) as u8)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}

/// Condition flag.
///
/// Stored as a single value rather than three bits, so "exactly one
/// flag set" holds by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    /// Last result had bit 15 set.
    Neg,
    /// Last result was zero.
    Zero,
    /// Last result was non-zero with bit 15 clear.
    Pos,
}

impl Condition {
    /// Classify a word by its two's complement sign.
    pub fn of(value: u16) -> Self {
        if value == 0 {
            Condition::Zero
        } else if value & 0x8000 != 0 {
            Condition::Neg
        } else {
            Condition::Pos
        }
    }

    /// The N/Z/P bit pattern used by BR (n = bit 2, z = bit 1, p = bit 0).
    pub fn nzp(self) -> u8 {
        match self {
            Condition::Neg => 0b100,
            Condition::Zero => 0b010,
            Condition::Pos => 0b001,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = match self {
            Condition::Neg => 'N',
            Condition::Zero => 'Z',
            Condition::Pos => 'P',
        };
        write!(f, "{}", c)
    }
}

/// The LC-3 register file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    /// R0-R7
    pub gpr: [u16; 8],

    /// Program counter
    pub pc: u16,

    /// Condition register
    pub cond: Condition,
}

impl Registers {
    /// Create a new register file: everything zero, PC at `PC_START`, Z set.
    pub fn new() -> Self {
        Self {
            gpr: [0; 8],
            pc: PC_START,
            cond: Condition::Zero,
        }
    }

    /// Reset all registers to their power-on values.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    #[inline]
    pub fn get(&self, r: Reg) -> u16 {
        self.gpr[r.index()]
    }

    #[inline]
    pub fn set(&mut self, r: Reg, value: u16) {
        self.gpr[r.index()] = value;
    }

    /// Set COND from the current value of `r`.
    pub fn update_flags(&mut self, r: Reg) {
        self.cond = Condition::of(self.get(r));
    }

    /// Write `value` to `r` and update COND from it.
    ///
    /// Every instruction that writes a general purpose register goes
    /// through here; nothing else touches COND.
    pub fn set_with_flags(&mut self, r: Reg, value: u16) {
        self.set(r, value);
        self.update_flags(r);
    }

    /// Increment the program counter by 1 (wrapping).
    /// Returns the old value.
    pub fn advance_pc(&mut self) -> u16 {
        let old = self.pc;
        self.pc = self.pc.wrapping_add(1);
        old
    }

    /// Set the program counter to an absolute address.
    pub fn jump(&mut self, addr: u16) {
        self.pc = addr;
    }

    /// PC-relative address: PC + offset, wrapping.
    #[inline]
    pub fn pc_relative(&self, offset: i16) -> u16 {
        self.pc.wrapping_add_signed(offset)
    }

    /// Base+offset address: R[base] + offset, wrapping.
    #[inline]
    pub fn base_relative(&self, base: Reg, offset: i16) -> u16 {
        self.get(base).wrapping_add_signed(offset)
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}
