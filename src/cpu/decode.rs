//! Instruction decoder for the LC-3.
//!
//! Every instruction is one 16-bit word. Bits 15-12 select one of the 16
//! opcodes; the remaining bits are opcode-specific fields. Decoding is
//! total: all 16 opcode values map to a variant, including the two
//! reserved ones, which the executor rejects.

use crate::cpu::registers::{Condition, Reg};
use serde::{Serialize, Deserialize};

/// Second source operand of ADD and AND.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    /// Register mode (bit 5 clear)
    Reg(Reg),
    /// Immediate mode (bit 5 set), imm5 sign-extended
    Imm(i16),
}

/// Where JSR/JSRR transfers control to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JsrTarget {
    /// JSR: PC + offset11 (bit 11 set)
    Offset(i16),
    /// JSRR: contents of a base register (bit 11 clear)
    Base(Reg),
}

/// Decoded LC-3 instruction.
///
/// Offsets and immediates are stored already sign-extended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    // ==================== Operate ====================

    /// DR := SR1 + operand
    Add { dr: Reg, sr1: Reg, src2: Operand },

    /// DR := SR1 & operand
    And { dr: Reg, sr1: Reg, src2: Operand },

    /// DR := !SR
    Not { dr: Reg, sr: Reg },

    // ==================== Data Movement ====================

    /// DR := mem[PC + offset9]
    Ld { dr: Reg, offset: i16 },

    /// DR := mem[mem[PC + offset9]]
    Ldi { dr: Reg, offset: i16 },

    /// DR := mem[BaseR + offset6]
    Ldr { dr: Reg, base: Reg, offset: i16 },

    /// DR := PC + offset9
    Lea { dr: Reg, offset: i16 },

    /// mem[PC + offset9] := SR
    St { sr: Reg, offset: i16 },

    /// mem[mem[PC + offset9]] := SR
    Sti { sr: Reg, offset: i16 },

    /// mem[BaseR + offset6] := SR
    Str { sr: Reg, base: Reg, offset: i16 },

    // ==================== Control ====================

    /// Conditional branch on the n/z/p mask
    Br { n: bool, z: bool, p: bool, offset: i16 },

    /// PC := BaseR (RET when BaseR is R7)
    Jmp { base: Reg },

    /// R7 := PC, then jump to the target
    Jsr { target: JsrTarget },

    /// R7 := PC, then run a trap routine
    Trap { vector: u8 },

    // ==================== Reserved ====================

    /// Return from interrupt (opcode 1000), unsupported
    Rti,

    /// Reserved (opcode 1101)
    Res,
}

impl Instruction {
    /// Whether this instruction writes a general purpose register and
    /// therefore sets the condition codes.
    pub fn sets_flags(&self) -> bool {
        matches!(
            self,
            Instruction::Add { .. }
                | Instruction::And { .. }
                | Instruction::Not { .. }
                | Instruction::Ld { .. }
                | Instruction::Ldi { .. }
                | Instruction::Ldr { .. }
                | Instruction::Lea { .. }
        )
    }
}

/// Opcode values (bits 15-12).
mod opcode {
    pub const BR: u16 = 0b0000;
    pub const ADD: u16 = 0b0001;
    pub const LD: u16 = 0b0010;
    pub const ST: u16 = 0b0011;
    pub const JSR: u16 = 0b0100;
    pub const AND: u16 = 0b0101;
    pub const LDR: u16 = 0b0110;
    pub const STR: u16 = 0b0111;
    pub const RTI: u16 = 0b1000;
    pub const NOT: u16 = 0b1001;
    pub const LDI: u16 = 0b1010;
    pub const STI: u16 = 0b1011;
    pub const JMP: u16 = 0b1100;
    pub const RES: u16 = 0b1101;
    pub const LEA: u16 = 0b1110;
    pub const TRAP: u16 = 0b1111;
}

/// Sign-extend the low `bits` bits of `x` to a full word.
///
/// If bit `bits - 1` is set, all higher bits are set; otherwise they are
/// cleared.
#[inline]
pub fn sign_extend(x: u16, bits: u32) -> u16 {
    debug_assert!((1..=16).contains(&bits));
    let shift = 16 - bits;
    (((x << shift) as i16) >> shift) as u16
}

#[inline]
fn field(word: u16, lsb: u32, width: u32) -> u16 {
    (word >> lsb) & ((1 << width) - 1)
}

#[inline]
fn offset(word: u16, bits: u32) -> i16 {
    sign_extend(field(word, 0, bits), bits) as i16
}

#[inline]
fn reg_at(word: u16, lsb: u32) -> Reg {
    Reg::new(field(word, lsb, 3))
}

#[inline]
fn bit(word: u16, n: u32) -> bool {
    (word >> n) & 1 == 1
}

fn operate_src2(word: u16) -> Operand {
    if bit(word, 5) {
        Operand::Imm(offset(word, 5))
    } else {
        Operand::Reg(reg_at(word, 0))
    }
}

/// Decode a 16-bit instruction word.
///
/// The instruction format is:
/// - Bits 15-12: Opcode
/// - Bits 11-9: DR / SR / n,z,p
/// - Bits 8-6: SR1 / BaseR
/// - Bits 5-0: mode bit and register, or a PC/base offset
pub fn decode(word: u16) -> Instruction {
    let dr = reg_at(word, 9);
    let sr1 = reg_at(word, 6);

    match word >> 12 {
        opcode::BR => Instruction::Br {
            n: bit(word, 11),
            z: bit(word, 10),
            p: bit(word, 9),
            offset: offset(word, 9),
        },
        opcode::ADD => Instruction::Add { dr, sr1, src2: operate_src2(word) },
        opcode::LD => Instruction::Ld { dr, offset: offset(word, 9) },
        opcode::ST => Instruction::St { sr: dr, offset: offset(word, 9) },
        opcode::JSR => {
            let target = if bit(word, 11) {
                JsrTarget::Offset(offset(word, 11))
            } else {
                JsrTarget::Base(sr1)
            };
            Instruction::Jsr { target }
        }
        opcode::AND => Instruction::And { dr, sr1, src2: operate_src2(word) },
        opcode::LDR => Instruction::Ldr { dr, base: sr1, offset: offset(word, 6) },
        opcode::STR => Instruction::Str { sr: dr, base: sr1, offset: offset(word, 6) },
        opcode::RTI => Instruction::Rti,
        opcode::NOT => Instruction::Not { dr, sr: sr1 },
        opcode::LDI => Instruction::Ldi { dr, offset: offset(word, 9) },
        opcode::STI => Instruction::Sti { sr: dr, offset: offset(word, 9) },
        opcode::JMP => Instruction::Jmp { base: sr1 },
        opcode::RES => Instruction::Res,
        opcode::LEA => Instruction::Lea { dr, offset: offset(word, 9) },
        opcode::TRAP => Instruction::Trap { vector: field(word, 0, 8) as u8 },
        _ => unreachable!("opcode is four bits"),
    }
}

/// Encode an instruction back to a 16-bit word.
///
/// Offsets are truncated to their field width.
pub fn encode(instr: &Instruction) -> u16 {
    fn op(code: u16) -> u16 {
        code << 12
    }
    fn r(reg: Reg, lsb: u32) -> u16 {
        (reg.index() as u16) << lsb
    }
    fn off(value: i16, bits: u32) -> u16 {
        (value as u16) & ((1 << bits) - 1)
    }
    fn src2(operand: Operand) -> u16 {
        match operand {
            Operand::Reg(reg) => r(reg, 0),
            Operand::Imm(imm) => 1 << 5 | off(imm, 5),
        }
    }

    match *instr {
        Instruction::Add { dr, sr1, src2: s } => op(opcode::ADD) | r(dr, 9) | r(sr1, 6) | src2(s),
        Instruction::And { dr, sr1, src2: s } => op(opcode::AND) | r(dr, 9) | r(sr1, 6) | src2(s),
        Instruction::Not { dr, sr } => op(opcode::NOT) | r(dr, 9) | r(sr, 6) | 0x3F,
        Instruction::Ld { dr, offset } => op(opcode::LD) | r(dr, 9) | off(offset, 9),
        Instruction::Ldi { dr, offset } => op(opcode::LDI) | r(dr, 9) | off(offset, 9),
        Instruction::Ldr { dr, base, offset } => {
            op(opcode::LDR) | r(dr, 9) | r(base, 6) | off(offset, 6)
        }
        Instruction::Lea { dr, offset } => op(opcode::LEA) | r(dr, 9) | off(offset, 9),
        Instruction::St { sr, offset } => op(opcode::ST) | r(sr, 9) | off(offset, 9),
        Instruction::Sti { sr, offset } => op(opcode::STI) | r(sr, 9) | off(offset, 9),
        Instruction::Str { sr, base, offset } => {
            op(opcode::STR) | r(sr, 9) | r(base, 6) | off(offset, 6)
        }
        Instruction::Br { n, z, p, offset } => {
            op(opcode::BR)
                | (n as u16) << 11
                | (z as u16) << 10
                | (p as u16) << 9
                | off(offset, 9)
        }
        Instruction::Jmp { base } => op(opcode::JMP) | r(base, 6),
        Instruction::Jsr { target: JsrTarget::Offset(offset) } => {
            op(opcode::JSR) | 1 << 11 | off(offset, 11)
        }
        Instruction::Jsr { target: JsrTarget::Base(base) } => op(opcode::JSR) | r(base, 6),
        Instruction::Trap { vector } => op(opcode::TRAP) | vector as u16,
        Instruction::Rti => op(opcode::RTI),
        Instruction::Res => op(opcode::RES),
    }
}

/// Whether a BR with this mask is taken under `cond`.
pub fn branch_taken(n: bool, z: bool, p: bool, cond: Condition) -> bool {
    (n && cond == Condition::Neg) || (z && cond == Condition::Zero) || (p && cond == Condition::Pos)
}
