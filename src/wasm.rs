//! WebAssembly bindings for the LC-3 emulator.
//!
//! This module provides JavaScript-friendly wrappers around the core
//! machine. Console traffic is buffered: the page pushes keystrokes with
//! `push_input` and collects output with `take_output`.

use wasm_bindgen::prelude::*;
use crate::{BufferedConsole, Image, Machine, Reg};
use crate::asm::disasm::disassemble_instruction;

/// Initialize panic hook for better error messages in console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// WebAssembly-friendly machine wrapper.
#[wasm_bindgen]
pub struct WasmMachine {
    machine: Machine,
    console: BufferedConsole,
    images: Vec<Image>,
}

#[wasm_bindgen]
impl WasmMachine {
    /// Create a new machine instance.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            machine: Machine::new(),
            console: BufferedConsole::new(),
            images: Vec::new(),
        }
    }

    /// Load an object image and point the PC at its origin.
    /// Returns the number of words placed.
    #[wasm_bindgen]
    pub fn load_image(&mut self, bytes: &[u8]) -> Result<usize, JsError> {
        let image = Image::from_bytes(bytes)
            .map_err(|e| JsError::new(&format!("{}", e)))?;

        let placed = self.machine.load_image(&image);
        self.machine.regs.jump(image.origin);
        self.images.push(image);
        Ok(placed)
    }

    /// Step one instruction. Returns the disassembled instruction.
    #[wasm_bindgen]
    pub fn step(&mut self) -> Result<String, JsError> {
        let pc = self.machine.regs.pc;
        self.machine.step(&mut self.console)
            .map_err(|e| JsError::new(&format!("{}", e)))?;

        Ok(disassemble_instruction(self.machine.mem.peek(pc)))
    }

    /// Run until halt, fault or max cycles. Returns total cycles.
    #[wasm_bindgen]
    pub fn run(&mut self, max_cycles: u32) -> Result<u64, JsError> {
        self.machine.run_limited(&mut self.console, max_cycles as u64)
            .map_err(|e| JsError::new(&format!("{}", e)))?;
        Ok(self.machine.cycles)
    }

    /// Reset the machine and reload every image.
    #[wasm_bindgen]
    pub fn reset(&mut self) {
        self.machine.reset();
        for image in &self.images {
            self.machine.load_image(image);
        }
        if let Some(first) = self.images.first() {
            self.machine.regs.jump(first.origin);
        }
        self.console = BufferedConsole::new();
    }

    /// Queue keyboard input.
    #[wasm_bindgen]
    pub fn push_input(&mut self, text: &str) {
        self.console.push_input(text);
    }

    /// Drain console output.
    #[wasm_bindgen]
    pub fn take_output(&mut self) -> String {
        String::from_utf8_lossy(&self.console.take_output()).into_owned()
    }

    #[wasm_bindgen]
    pub fn is_running(&self) -> bool {
        self.machine.is_running()
    }

    #[wasm_bindgen]
    pub fn is_halted(&self) -> bool {
        self.machine.is_halted()
    }

    #[wasm_bindgen]
    pub fn cycles(&self) -> u64 {
        self.machine.cycles
    }

    #[wasm_bindgen]
    pub fn pc(&self) -> u16 {
        self.machine.regs.pc
    }

    /// Get a general purpose register (0-7).
    #[wasm_bindgen]
    pub fn register(&self, index: u16) -> u16 {
        self.machine.regs.get(Reg::new(index))
    }

    /// Condition flag as "N", "Z" or "P".
    #[wasm_bindgen]
    pub fn condition(&self) -> String {
        self.machine.regs.cond.to_string()
    }

    #[wasm_bindgen]
    pub fn state(&self) -> String {
        format!("{:?}", self.machine.state)
    }

    /// Memory word without device side effects.
    #[wasm_bindgen]
    pub fn memory_at(&self, addr: u16) -> u16 {
        self.machine.mem.peek(addr)
    }

    /// R0-R7 as a typed array.
    #[wasm_bindgen]
    pub fn registers(&self) -> js_sys::Uint16Array {
        js_sys::Uint16Array::from(&self.machine.regs.gpr[..])
    }

    /// `count` words from `start`, wrapping at the top of memory.
    #[wasm_bindgen]
    pub fn memory_range(&self, start: u16, count: u32) -> js_sys::Uint16Array {
        let words = memory_words(&self.machine, start, count as usize);
        js_sys::Uint16Array::from(&words[..])
    }

    /// Registers, state and cycle count as JSON.
    #[wasm_bindgen]
    pub fn registers_json(&self) -> Result<String, JsError> {
        serde_json::to_string(&self.machine.snapshot())
            .map_err(|e| JsError::new(&format!("{}", e)))
    }
}

impl Default for WasmMachine {
    fn default() -> Self {
        Self::new()
    }
}

fn memory_words(machine: &Machine, start: u16, count: usize) -> Vec<u16> {
    machine.mem.dump(start, count).into_iter().map(|(_, word)| word).collect()
}

/// Disassemble a single instruction word.
#[wasm_bindgen]
pub fn wasm_disassemble(word: u16) -> String {
    disassemble_instruction(word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_words_wrap() {
        let mut machine = Machine::new();
        machine.mem.poke(0xFFFF, 1);
        machine.mem.poke(0x0000, 2);

        assert_eq!(memory_words(&machine, 0xFFFF, 3), vec![1, 2, 0]);
    }
}
