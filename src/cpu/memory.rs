//! LC-3 memory subsystem.
//!
//! 65,536 sixteen-bit words addressed by a `u16`, so every address is in
//! range and address arithmetic simply wraps. Two addresses are keyboard
//! device registers whose contents are refreshed from the console when
//! the status register is read.

use crate::console::{Console, ConsoleError};
use serde::{Serialize, Deserialize};

/// The number of words in memory.
pub const MEMORY_SIZE: usize = 1 << 16;

/// Keyboard status register. Bit 15 is set when a character is ready.
pub const KBSR: u16 = 0xFE00;

/// Keyboard data register. Holds the last character read.
pub const KBDR: u16 = 0xFE02;

/// LC-3 memory: 65,536 words.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u16>", into = "Vec<u16>")]
pub struct Memory {
    cells: Vec<u16>,
}

impl TryFrom<Vec<u16>> for Memory {
    type Error = String;

    fn try_from(cells: Vec<u16>) -> Result<Self, Self::Error> {
        if cells.len() != MEMORY_SIZE {
            return Err(format!(
                "memory must hold {} words, got {}",
                MEMORY_SIZE,
                cells.len()
            ));
        }
        Ok(Self { cells })
    }
}

impl From<Memory> for Vec<u16> {
    fn from(mem: Memory) -> Self {
        mem.cells
    }
}

impl Memory {
    /// Create a new memory with all words zeroed.
    pub fn new() -> Self {
        Self {
            cells: vec![0; MEMORY_SIZE],
        }
    }

    /// Read a word as an instruction would.
    ///
    /// Reading `KBSR` first polls the console: if a character is waiting
    /// it is latched into `KBDR` and the ready bit is set, otherwise the
    /// status register is cleared.
    pub fn read(&mut self, addr: u16, io: &mut dyn Console) -> Result<u16, ConsoleError> {
        if addr == KBSR {
            if io.poll()? {
                let ch = io.read_char()?;
                self.poke(KBSR, 1 << 15);
                self.poke(KBDR, ch as u16);
            } else {
                self.poke(KBSR, 0);
            }
        }
        Ok(self.peek(addr))
    }

    /// Write a word. Plain store, no device side effects.
    #[inline]
    pub fn write(&mut self, addr: u16, value: u16) {
        self.poke(addr, value);
    }

    /// Read a word without device side effects.
    #[inline]
    pub fn peek(&self, addr: u16) -> u16 {
        self.cells[addr as usize]
    }

    /// Write a word directly.
    #[inline]
    pub fn poke(&mut self, addr: u16, value: u16) {
        self.cells[addr as usize] = value;
    }

    /// Clear all memory to zeros.
    pub fn clear(&mut self) {
        self.cells.fill(0);
    }

    /// Copy `words` into memory starting at `origin`.
    ///
    /// Words that would fall past the end of memory are dropped.
    /// Returns how many words were placed.
    pub fn load(&mut self, origin: u16, words: &[u16]) -> usize {
        let start = origin as usize;
        let count = words.len().min(MEMORY_SIZE - start);
        self.cells[start..start + count].copy_from_slice(&words[..count]);
        count
    }

    /// Dump memory contents (for debugging).
    pub fn dump(&self, start: u16, count: usize) -> Vec<(u16, u16)> {
        (0..count)
            .map(|i| {
                let addr = start.wrapping_add(i as u16);
                (addr, self.peek(addr))
            })
            .collect()
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let non_zero = self.cells.iter().filter(|&&w| w != 0).count();

        f.debug_struct("Memory")
            .field("non_zero_cells", &non_zero)
            .field("total_cells", &MEMORY_SIZE)
            .finish()
    }
}
