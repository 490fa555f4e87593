//! CPU emulation for the LC-3.
//!
//! This module implements the complete LC-3 architecture:
//! - 65,536 sixteen-bit memory words with keyboard device registers
//! - 8 general purpose registers, PC and a N/Z/P condition register
//! - 16-opcode instruction set with built-in trap routines

pub mod memory;
pub mod registers;
pub mod decode;
pub mod trap;
pub mod execute;

pub use memory::{Memory, KBDR, KBSR, MEMORY_SIZE};
pub use registers::{Condition, Reg, Registers, PC_START};
pub use decode::{Instruction, JsrTarget, Operand, decode, encode, sign_extend};
pub use trap::TrapVector;
pub use execute::{CpuError, Machine, MachineState, Snapshot};
