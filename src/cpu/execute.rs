//! Execution engine for the LC-3.
//!
//! Implements the fetch-decode-execute cycle and all instruction behaviors.

use crate::console::{Console, ConsoleError};
use crate::cpu::{Memory, Registers};
use crate::cpu::decode::{self, Instruction, JsrTarget, Operand};
use crate::cpu::registers::{Condition, Reg};
use crate::cpu::trap::{self, TrapOutcome};
use crate::asm::image::Image;
use crate::asm::disasm::format_instruction;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Machine execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MachineState {
    /// Fetching and executing instructions.
    Running,
    /// Stopped by the HALT trap.
    Halted,
    /// Stopped by a reserved opcode or a console failure.
    Faulted,
}

/// An LC-3 machine: registers, memory and run state.
///
/// The console is not part of the machine; it is passed to every call
/// that may touch a device.
#[derive(Clone, Serialize, Deserialize)]
pub struct Machine {
    /// Register file.
    pub regs: Registers,
    /// Main memory.
    pub mem: Memory,
    /// Current execution state.
    pub state: MachineState,
    /// Instructions executed so far.
    pub cycles: u64,
    /// Last executed instruction (for debugging).
    last_instr: Option<Instruction>,
}

/// Summary of the machine without memory, for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub regs: Registers,
    pub state: MachineState,
    pub cycles: u64,
}

impl Machine {
    /// Create a machine with zeroed memory, PC at x3000 and Z set.
    pub fn new() -> Self {
        Self {
            regs: Registers::new(),
            mem: Memory::new(),
            state: MachineState::Running,
            cycles: 0,
            last_instr: None,
        }
    }

    /// Reset the machine to its initial state.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.mem.clear();
        self.state = MachineState::Running;
        self.cycles = 0;
        self.last_instr = None;
    }

    /// Place an image in memory. Does not move the PC.
    ///
    /// Returns how many words were placed.
    pub fn load_image(&mut self, image: &Image) -> usize {
        let placed = self.mem.load(image.origin, &image.words);
        log::debug!("loaded {} words at x{:04X}", placed, image.origin);
        placed
    }

    /// Place a sequence of instructions at `origin` and point the PC there.
    pub fn load_program(&mut self, origin: u16, program: &[Instruction]) {
        let words: Vec<u16> = program.iter().map(decode::encode).collect();
        self.mem.load(origin, &words);
        self.regs.jump(origin);
    }

    /// Execute a single instruction.
    ///
    /// Returns the instruction that was executed, or an error. A reserved
    /// opcode or console failure leaves the machine `Faulted`.
    pub fn step(&mut self, io: &mut dyn Console) -> Result<Instruction, CpuError> {
        if self.state != MachineState::Running {
            return Err(CpuError::NotRunning(self.state));
        }

        // Fetch
        let pc = self.regs.advance_pc();
        let raw = match self.mem.read(pc, io) {
            Ok(raw) => raw,
            Err(e) => return Err(self.fault(e.into())),
        };

        // Decode
        let instr = decode::decode(raw);
        log::trace!("x{:04X}: {:04X}  {}", pc, raw, format_instruction(&instr));

        // Execute
        if let Err(e) = self.execute(instr, pc, io) {
            return Err(self.fault(e));
        }

        self.cycles += 1;
        self.last_instr = Some(instr);

        Ok(instr)
    }

    /// Run until halt or error.
    ///
    /// Returns the number of instructions executed.
    pub fn run(&mut self, io: &mut dyn Console) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;

        while self.state == MachineState::Running {
            self.step(io)?;
        }

        Ok(self.cycles - start_cycles)
    }

    /// Run for at most `max_cycles` instructions.
    pub fn run_limited(&mut self, io: &mut dyn Console, max_cycles: u64) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;
        let limit = self.cycles.saturating_add(max_cycles);

        while self.state == MachineState::Running && self.cycles < limit {
            self.step(io)?;
        }

        Ok(self.cycles - start_cycles)
    }

    fn fault(&mut self, e: CpuError) -> CpuError {
        match e {
            // The user stopped the program; the caller reports it.
            CpuError::Console(ConsoleError::Interrupted) => {
                log::debug!("interrupted at x{:04X}", self.regs.pc)
            }
            _ => log::error!("machine fault: {}", e),
        }
        self.state = MachineState::Faulted;
        e
    }

    /// Execute a decoded instruction. `pc` is the address it was fetched
    /// from; `self.regs.pc` already points past it.
    fn execute(&mut self, instr: Instruction, pc: u16, io: &mut dyn Console) -> Result<(), CpuError> {
        let regs = &mut self.regs;

        match instr {
            // ==================== Operate ====================

            Instruction::Add { dr, sr1, src2 } => {
                let value = regs.get(sr1).wrapping_add(operand(regs, src2));
                regs.set_with_flags(dr, value);
            }

            Instruction::And { dr, sr1, src2 } => {
                let value = regs.get(sr1) & operand(regs, src2);
                regs.set_with_flags(dr, value);
            }

            Instruction::Not { dr, sr } => {
                let value = !regs.get(sr);
                regs.set_with_flags(dr, value);
            }

            // ==================== Data Movement ====================

            Instruction::Ld { dr, offset } => {
                let addr = regs.pc_relative(offset);
                let value = self.mem.read(addr, io)?;
                regs.set_with_flags(dr, value);
            }

            Instruction::Ldi { dr, offset } => {
                let pointer = self.mem.read(regs.pc_relative(offset), io)?;
                let value = self.mem.read(pointer, io)?;
                regs.set_with_flags(dr, value);
            }

            Instruction::Ldr { dr, base, offset } => {
                let addr = regs.base_relative(base, offset);
                let value = self.mem.read(addr, io)?;
                regs.set_with_flags(dr, value);
            }

            Instruction::Lea { dr, offset } => {
                let addr = regs.pc_relative(offset);
                regs.set_with_flags(dr, addr);
            }

            Instruction::St { sr, offset } => {
                let addr = regs.pc_relative(offset);
                self.mem.write(addr, regs.get(sr));
            }

            Instruction::Sti { sr, offset } => {
                let value = regs.get(sr);
                let addr = self.mem.read(regs.pc_relative(offset), io)?;
                self.mem.write(addr, value);
            }

            Instruction::Str { sr, base, offset } => {
                let addr = regs.base_relative(base, offset);
                self.mem.write(addr, regs.get(sr));
            }

            // ==================== Control ====================

            Instruction::Br { n, z, p, offset } => {
                if decode::branch_taken(n, z, p, regs.cond) {
                    let target = regs.pc_relative(offset);
                    regs.jump(target);
                }
            }

            Instruction::Jmp { base } => {
                let target = regs.get(base);
                regs.jump(target);
            }

            Instruction::Jsr { target } => {
                let link = regs.pc;
                let dest = match target {
                    JsrTarget::Offset(offset) => regs.pc_relative(offset),
                    // Read before R7 is overwritten, so JSRR R7 works.
                    JsrTarget::Base(base) => regs.get(base),
                };
                regs.set(Reg::R7, link);
                regs.jump(dest);
            }

            Instruction::Trap { vector } => {
                let link = regs.pc;
                regs.set(Reg::R7, link);
                if trap::dispatch(regs, &self.mem, vector, io)? == TrapOutcome::Halt {
                    self.state = MachineState::Halted;
                }
            }

            // ==================== Reserved ====================

            Instruction::Rti => {
                return Err(CpuError::ReservedOpcode { opcode: 0b1000, pc });
            }

            Instruction::Res => {
                return Err(CpuError::ReservedOpcode { opcode: 0b1101, pc });
            }
        }

        Ok(())
    }

    /// Get the last executed instruction.
    pub fn last_instruction(&self) -> Option<Instruction> {
        self.last_instr
    }

    /// Current condition flag.
    pub fn condition(&self) -> Condition {
        self.regs.cond
    }

    /// Register/flag/state summary without memory.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            regs: self.regs.clone(),
            state: self.state,
            cycles: self.cycles,
        }
    }

    /// Check if the machine halted cleanly.
    pub fn is_halted(&self) -> bool {
        self.state == MachineState::Halted
    }

    /// Check if the machine stopped on a fault.
    pub fn is_faulted(&self) -> bool {
        self.state == MachineState::Faulted
    }

    /// Check if the machine is running.
    pub fn is_running(&self) -> bool {
        self.state == MachineState::Running
    }
}

/// Value of the second ADD/AND operand.
fn operand(regs: &Registers, src2: Operand) -> u16 {
    match src2 {
        Operand::Reg(r) => regs.get(r),
        Operand::Imm(imm) => imm as u16,
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Machine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Machine")
            .field("state", &self.state)
            .field("cycles", &self.cycles)
            .field("regs", &self.regs)
            .finish()
    }
}

/// Errors that can occur during execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpuError {
    #[error("machine not running: {0:?}")]
    NotRunning(MachineState),

    #[error("reserved opcode {opcode:04b} at x{pc:04X}")]
    ReservedOpcode { opcode: u8, pc: u16 },

    #[error("console error: {0}")]
    Console(#[from] ConsoleError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::BufferedConsole;
    use crate::cpu::decode::encode;
    use crate::cpu::trap::TrapVector;
    use proptest::prelude::*;

    const ORIGIN: u16 = 0x3000;

    fn halt() -> Instruction {
        Instruction::Trap { vector: TrapVector::HALT }
    }

    fn machine_with(program: &[Instruction]) -> Machine {
        let mut m = Machine::new();
        m.load_program(ORIGIN, program);
        m
    }

    #[test]
    fn test_halt() {
        let mut m = machine_with(&[halt()]);
        let mut io = BufferedConsole::new();

        let executed = m.run(&mut io).unwrap();

        assert_eq!(executed, 1);
        assert!(m.is_halted());
        assert_eq!(m.regs.pc, ORIGIN + 1);
        assert_eq!(m.regs.get(Reg::R7), ORIGIN + 1);
    }

    #[test]
    fn test_step_after_halt() {
        let mut m = machine_with(&[halt()]);
        let mut io = BufferedConsole::new();
        m.run(&mut io).unwrap();

        assert_eq!(m.step(&mut io), Err(CpuError::NotRunning(MachineState::Halted)));
    }

    #[test]
    fn test_add_registers() {
        let mut m = machine_with(&[
            Instruction::Add { dr: Reg::R0, sr1: Reg::R1, src2: Operand::Reg(Reg::R2) },
        ]);
        m.regs.set(Reg::R1, 5);
        m.regs.set(Reg::R2, 3);

        m.step(&mut BufferedConsole::new()).unwrap();

        assert_eq!(m.regs.get(Reg::R0), 8);
        assert_eq!(m.condition(), Condition::Pos);
    }

    #[test]
    fn test_add_immediate_wraps_to_zero() {
        let mut m = machine_with(&[
            Instruction::Add { dr: Reg::R0, sr1: Reg::R1, src2: Operand::Imm(1) },
        ]);
        m.regs.set(Reg::R1, 0xFFFF);
        m.regs.set(Reg::R0, 9);

        m.step(&mut BufferedConsole::new()).unwrap();

        assert_eq!(m.regs.get(Reg::R0), 0);
        assert_eq!(m.condition(), Condition::Zero);
    }

    #[test]
    fn test_and_immediate_negative() {
        let mut m = machine_with(&[
            Instruction::And { dr: Reg::R2, sr1: Reg::R2, src2: Operand::Imm(-16) },
        ]);
        m.regs.set(Reg::R2, 0x801F);

        m.step(&mut BufferedConsole::new()).unwrap();

        assert_eq!(m.regs.get(Reg::R2), 0x8010);
        assert_eq!(m.condition(), Condition::Neg);
    }

    #[test]
    fn test_not_uses_register_value() {
        let mut m = machine_with(&[Instruction::Not { dr: Reg::R0, sr: Reg::R3 }]);
        m.regs.set(Reg::R3, 0x00F0);

        m.step(&mut BufferedConsole::new()).unwrap();

        assert_eq!(m.regs.get(Reg::R0), 0xFF0F);
        assert_eq!(m.condition(), Condition::Neg);
    }

    #[test]
    fn test_ld_negative_offset() {
        let mut m = machine_with(&[Instruction::Ld { dr: Reg::R0, offset: -2 }]);
        // PC after fetch is x3001; x3001 - 2 = x2FFF
        m.mem.poke(0x2FFF, 0x1234);

        m.step(&mut BufferedConsole::new()).unwrap();

        assert_eq!(m.regs.get(Reg::R0), 0x1234);
        assert_eq!(m.condition(), Condition::Pos);
    }

    #[test]
    fn test_ldi_double_indirection() {
        let mut m = machine_with(&[Instruction::Ldi { dr: Reg::R4, offset: 1 }]);
        m.mem.poke(0x3002, 0x4000);
        m.mem.poke(0x4000, 0x8001);

        m.step(&mut BufferedConsole::new()).unwrap();

        assert_eq!(m.regs.get(Reg::R4), 0x8001);
        assert_eq!(m.condition(), Condition::Neg);
    }

    #[test]
    fn test_ldr_and_str() {
        let mut m = machine_with(&[
            Instruction::Str { sr: Reg::R1, base: Reg::R2, offset: -1 },
            Instruction::Ldr { dr: Reg::R3, base: Reg::R2, offset: -1 },
        ]);
        m.regs.set(Reg::R1, 77);
        m.regs.set(Reg::R2, 0x4001);
        let mut io = BufferedConsole::new();

        m.step(&mut io).unwrap();
        assert_eq!(m.mem.peek(0x4000), 77);
        assert_eq!(m.condition(), Condition::Zero);

        m.step(&mut io).unwrap();
        assert_eq!(m.regs.get(Reg::R3), 77);
        assert_eq!(m.condition(), Condition::Pos);
    }

    #[test]
    fn test_stores_use_register_value() {
        let mut m = machine_with(&[
            Instruction::St { sr: Reg::R5, offset: 10 },
            Instruction::Sti { sr: Reg::R6, offset: 10 },
        ]);
        m.regs.set(Reg::R5, 0xBEEF);
        m.regs.set(Reg::R6, 0xCAFE);
        // STI pointer at x3002 + 10
        m.mem.poke(0x300C, 0x5000);
        let mut io = BufferedConsole::new();

        m.run_limited(&mut io, 2).unwrap();

        assert_eq!(m.mem.peek(0x300B), 0xBEEF);
        assert_eq!(m.mem.peek(0x5000), 0xCAFE);
    }

    #[test]
    fn test_lea_is_address_not_load() {
        let mut m = machine_with(&[Instruction::Lea { dr: Reg::R1, offset: -1 }]);

        m.step(&mut BufferedConsole::new()).unwrap();

        assert_eq!(m.regs.get(Reg::R1), 0x3000);
        assert_eq!(m.condition(), Condition::Pos);
    }

    #[test]
    fn test_lea_st_ld_roundtrip() {
        let mut m = machine_with(&[
            Instruction::Lea { dr: Reg::R0, offset: 7 },
            Instruction::St { sr: Reg::R0, offset: 6 },
            Instruction::Ld { dr: Reg::R2, offset: 5 },
            halt(),
        ]);

        m.run(&mut BufferedConsole::new()).unwrap();

        // All three address x3008.
        assert_eq!(m.regs.get(Reg::R0), 0x3008);
        assert_eq!(m.mem.peek(0x3008), 0x3008);
        assert_eq!(m.regs.get(Reg::R2), 0x3008);
    }

    #[test]
    fn test_branch_not_taken() {
        let mut m = machine_with(&[
            Instruction::Add { dr: Reg::R0, sr1: Reg::R0, src2: Operand::Imm(1) },
            Instruction::Br { n: true, z: false, p: false, offset: 5 },
        ]);
        let mut io = BufferedConsole::new();

        m.run_limited(&mut io, 2).unwrap();

        assert_eq!(m.condition(), Condition::Pos);
        assert_eq!(m.regs.pc, 0x3002);
    }

    #[test]
    fn test_branch_taken_backwards_loop() {
        // R0 = 3; loop: R0 -= 1; BRp loop; HALT
        let mut m = machine_with(&[
            Instruction::Add { dr: Reg::R0, sr1: Reg::R0, src2: Operand::Imm(3) },
            Instruction::Add { dr: Reg::R0, sr1: Reg::R0, src2: Operand::Imm(-1) },
            Instruction::Br { n: false, z: false, p: true, offset: -2 },
            halt(),
        ]);

        let executed = m.run(&mut BufferedConsole::new()).unwrap();

        assert_eq!(m.regs.get(Reg::R0), 0);
        assert_eq!(executed, 1 + 3 * 2 + 1);
    }

    #[test]
    fn test_unconditional_branch_mask() {
        let mut m = machine_with(&[Instruction::Br { n: true, z: true, p: true, offset: 0x10 }]);

        m.step(&mut BufferedConsole::new()).unwrap();

        assert_eq!(m.regs.pc, 0x3011);
    }

    #[test]
    fn test_jmp_and_ret() {
        let mut m = machine_with(&[Instruction::Jmp { base: Reg::R7 }]);
        m.regs.set(Reg::R7, 0x1234);

        m.step(&mut BufferedConsole::new()).unwrap();

        assert_eq!(m.regs.pc, 0x1234);
    }

    #[test]
    fn test_jsr_offset_links() {
        let mut m = machine_with(&[Instruction::Jsr { target: JsrTarget::Offset(-0x10) }]);

        m.step(&mut BufferedConsole::new()).unwrap();

        assert_eq!(m.regs.get(Reg::R7), 0x3001);
        assert_eq!(m.regs.pc, 0x2FF1);
    }

    #[test]
    fn test_jsrr_through_r7() {
        let mut m = machine_with(&[Instruction::Jsr { target: JsrTarget::Base(Reg::R7) }]);
        m.regs.set(Reg::R7, 0x4000);

        m.step(&mut BufferedConsole::new()).unwrap();

        assert_eq!(m.regs.pc, 0x4000);
        assert_eq!(m.regs.get(Reg::R7), 0x3001);
    }

    #[test]
    fn test_control_flow_leaves_flags() {
        let mut m = machine_with(&[
            Instruction::Add { dr: Reg::R0, sr1: Reg::R0, src2: Operand::Imm(-1) },
            Instruction::St { sr: Reg::R0, offset: 5 },
            Instruction::Jsr { target: JsrTarget::Offset(0) },
        ]);

        m.run_limited(&mut BufferedConsole::new(), 3).unwrap();

        assert_eq!(m.condition(), Condition::Neg);
    }

    #[test]
    fn test_puts_program() {
        let mut m = machine_with(&[
            Instruction::Lea { dr: Reg::R0, offset: 2 },
            Instruction::Trap { vector: TrapVector::PUTS },
            halt(),
        ]);
        m.mem.load(0x3003, &[0x0048, 0x0069, 0x0000]);
        let mut io = BufferedConsole::new();

        let executed = m.run(&mut io).unwrap();

        assert_eq!(io.output_string(), "Hi");
        assert_eq!(executed, 3);
        assert!(m.is_halted());
    }

    #[test]
    fn test_getc_out_echo() {
        let mut m = machine_with(&[
            Instruction::Trap { vector: TrapVector::GETC },
            Instruction::Add { dr: Reg::R0, sr1: Reg::R0, src2: Operand::Imm(1) },
            Instruction::Trap { vector: TrapVector::OUT },
            halt(),
        ]);
        let mut io = BufferedConsole::with_input("a");

        m.run(&mut io).unwrap();

        assert_eq!(io.output_string(), "b");
    }

    #[test]
    fn test_keyboard_polling_program() {
        // poll: LDI R1, KBSR_PTR; BRzp poll; LDI R0, KBDR_PTR; HALT; KBSR; KBDR
        let mut m = machine_with(&[
            Instruction::Ldi { dr: Reg::R1, offset: 3 },
            Instruction::Br { n: false, z: true, p: true, offset: -2 },
            Instruction::Ldi { dr: Reg::R0, offset: 2 },
            halt(),
        ]);
        m.mem.load(0x3004, &[crate::cpu::KBSR, crate::cpu::KBDR]);
        let mut io = BufferedConsole::with_input("!");

        m.run(&mut io).unwrap();

        assert_eq!(m.regs.get(Reg::R0), b'!' as u16);
    }

    #[test]
    fn test_reserved_opcode_faults() {
        let mut m = Machine::new();
        m.mem.load(ORIGIN, &[0xD000, encode(&halt())]);
        let mut io = BufferedConsole::new();

        let result = m.run(&mut io);

        assert_eq!(result, Err(CpuError::ReservedOpcode { opcode: 0b1101, pc: ORIGIN }));
        assert!(m.is_faulted());
        assert_eq!(m.cycles, 0);
        assert_eq!(m.regs.pc, ORIGIN + 1);
        assert!(m.step(&mut io).is_err());
    }

    #[test]
    fn test_rti_faults() {
        let mut m = machine_with(&[Instruction::Rti]);
        let before = m.regs.gpr;

        let result = m.step(&mut BufferedConsole::new());

        assert_eq!(result, Err(CpuError::ReservedOpcode { opcode: 0b1000, pc: ORIGIN }));
        assert_eq!(m.regs.gpr, before);
    }

    #[test]
    fn test_unknown_trap_continues() {
        let mut m = machine_with(&[Instruction::Trap { vector: 0x99 }, halt()]);

        let executed = m.run(&mut BufferedConsole::new()).unwrap();

        assert_eq!(executed, 2);
        assert!(m.is_halted());
    }

    #[test]
    fn test_exhausted_input_faults() {
        let mut m = machine_with(&[Instruction::Trap { vector: TrapVector::GETC }]);

        let result = m.run(&mut BufferedConsole::new());

        assert_eq!(result, Err(CpuError::Console(ConsoleError::InputExhausted)));
        assert!(m.is_faulted());
    }

    #[test]
    fn test_pc_wraps_at_top_of_memory() {
        let mut m = Machine::new();
        m.mem.poke(0xFFFF, encode(&Instruction::Add {
            dr: Reg::R1,
            sr1: Reg::R1,
            src2: Operand::Imm(2),
        }));
        m.regs.jump(0xFFFF);

        m.step(&mut BufferedConsole::new()).unwrap();

        assert_eq!(m.regs.pc, 0x0000);
        assert_eq!(m.regs.get(Reg::R1), 2);
    }

    #[test]
    fn test_run_limited() {
        // BR #-1: spin forever
        let mut m = machine_with(&[Instruction::Br { n: true, z: true, p: true, offset: -1 }]);

        let executed = m.run_limited(&mut BufferedConsole::new(), 100).unwrap();

        assert_eq!(executed, 100);
        assert!(m.is_running());
        assert_eq!(m.regs.pc, ORIGIN);
    }

    #[test]
    fn test_reset() {
        let mut m = machine_with(&[halt()]);
        m.run(&mut BufferedConsole::new()).unwrap();

        m.reset();

        assert!(m.is_running());
        assert_eq!(m.cycles, 0);
        assert_eq!(m.regs, Registers::new());
        assert_eq!(m.mem.peek(ORIGIN), 0);
        assert_eq!(m.last_instruction(), None);
    }

    #[test]
    fn test_snapshot_serializes() {
        let mut m = machine_with(&[halt()]);
        m.run(&mut BufferedConsole::new()).unwrap();

        let json = serde_json::to_string(&m.snapshot()).unwrap();
        let back: Snapshot = serde_json::from_str(&json).unwrap();

        assert_eq!(back, m.snapshot());
        assert_eq!(back.state, MachineState::Halted);
    }

    #[test]
    fn test_machine_deserialize_rejects_short_memory() {
        let mut value = serde_json::to_value(Machine::new()).unwrap();
        value["mem"] = serde_json::json!([0]);

        assert!(serde_json::from_value::<Machine>(value).is_err());
    }

    #[test]
    fn test_machine_deserialize_round_trip() {
        let mut m = machine_with(&[halt()]);
        m.run(&mut BufferedConsole::new()).unwrap();

        let json = serde_json::to_string(&m).unwrap();
        let back: Machine = serde_json::from_str(&json).unwrap();

        assert_eq!(back.snapshot(), m.snapshot());
        assert_eq!(back.mem, m.mem);
    }

    /// Console whose user has pressed Ctrl-C.
    struct InterruptedConsole;

    impl Console for InterruptedConsole {
        fn poll(&mut self) -> Result<bool, ConsoleError> {
            Err(ConsoleError::Interrupted)
        }
        fn read_char(&mut self) -> Result<u8, ConsoleError> {
            Err(ConsoleError::Interrupted)
        }
        fn write_char(&mut self, _ch: u8) -> Result<(), ConsoleError> {
            Ok(())
        }
        fn flush(&mut self) -> Result<(), ConsoleError> {
            Ok(())
        }
    }

    #[test]
    fn test_interrupt_stops_machine() {
        let mut m = machine_with(&[Instruction::Trap { vector: TrapVector::GETC }, halt()]);

        let result = m.run(&mut InterruptedConsole);

        assert_eq!(result, Err(CpuError::Console(ConsoleError::Interrupted)));
        assert!(!m.is_running());
        assert_eq!(m.cycles, 0);
    }

    proptest! {
        #[test]
        fn prop_one_flag_after_any_instruction(word: u16, r1: u16, r2: u16) {
            let mut m = Machine::new();
            m.mem.poke(ORIGIN, word);
            m.regs.set(Reg::R1, r1);
            m.regs.set(Reg::R2, r2);
            let mut io = BufferedConsole::with_input("x");

            let _ = m.step(&mut io);

            prop_assert_eq!(m.condition().nzp().count_ones(), 1);
        }

        #[test]
        fn prop_flag_reflects_written_register(word: u16, r1: u16, r2: u16) {
            let mut m = Machine::new();
            m.mem.poke(ORIGIN, word);
            m.regs.set(Reg::R1, r1);
            m.regs.set(Reg::R2, r2);

            let instr = decode::decode(word);
            let result = m.step(&mut BufferedConsole::with_input("x"));

            if result.is_ok() && instr.sets_flags() {
                let dr = Reg::new(word >> 9);
                prop_assert_eq!(m.condition(), Condition::of(m.regs.get(dr)));
            }
        }
    }
}
