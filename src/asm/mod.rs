//! Object images and disassembly for LC-3 programs.
//!
//! This module provides:
//! - The object image loader (big-endian origin + words)
//! - A disassembler (words → readable text)

pub mod disasm;
pub mod image;

pub use disasm::{disassemble, disassemble_instruction};
pub use image::{Image, ImageError, load_image, save_image};
