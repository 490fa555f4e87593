//! Disassembler for LC-3 programs.
//!
//! Converts instruction words back to readable assembly.

use crate::cpu::decode::{decode, Instruction, JsrTarget, Operand};
use crate::cpu::trap::TrapVector;

/// Disassemble a single instruction word to text.
///
/// The reserved opcode has no mnemonic and is shown as data.
pub fn disassemble_instruction(word: u16) -> String {
    match decode(word) {
        Instruction::Res => format!(".FILL x{:04X}", word),
        instr => format_instruction(&instr),
    }
}

/// Disassemble `words` as if they were placed at `origin`.
pub fn disassemble(origin: u16, words: &[u16]) -> String {
    let mut output = String::new();
    output.push_str("; LC-3 Disassembly\n");
    output.push_str(&format!(".ORIG x{:04X}\n", origin));

    for (i, &word) in words.iter().enumerate() {
        let addr = origin.wrapping_add(i as u16);
        let line = disassemble_instruction(word);
        output.push_str(&format!("x{:04X}: {:04X}  {}\n", addr, word, line));
    }

    output.push_str(".END\n");
    output
}

/// Format a decoded instruction as assembly text.
pub fn format_instruction(instr: &Instruction) -> String {
    match *instr {
        // Operate
        Instruction::Add { dr, sr1, src2 } => format!("ADD {}, {}, {}", dr, sr1, format_src2(src2)),
        Instruction::And { dr, sr1, src2 } => format!("AND {}, {}, {}", dr, sr1, format_src2(src2)),
        Instruction::Not { dr, sr } => format!("NOT {}, {}", dr, sr),

        // Data movement
        Instruction::Ld { dr, offset } => format!("LD {}, #{}", dr, offset),
        Instruction::Ldi { dr, offset } => format!("LDI {}, #{}", dr, offset),
        Instruction::Ldr { dr, base, offset } => format!("LDR {}, {}, #{}", dr, base, offset),
        Instruction::Lea { dr, offset } => format!("LEA {}, #{}", dr, offset),
        Instruction::St { sr, offset } => format!("ST {}, #{}", sr, offset),
        Instruction::Sti { sr, offset } => format!("STI {}, #{}", sr, offset),
        Instruction::Str { sr, base, offset } => format!("STR {}, {}, #{}", sr, base, offset),

        // Control
        Instruction::Br { n: false, z: false, p: false, .. } => "NOP".to_string(),
        Instruction::Br { n, z, p, offset } => {
            let mut mnemonic = String::from("BR");
            if !(n && z && p) {
                if n { mnemonic.push('n'); }
                if z { mnemonic.push('z'); }
                if p { mnemonic.push('p'); }
            }
            format!("{} #{}", mnemonic, offset)
        }
        Instruction::Jmp { base } if base.index() == 7 => "RET".to_string(),
        Instruction::Jmp { base } => format!("JMP {}", base),
        Instruction::Jsr { target: JsrTarget::Offset(offset) } => format!("JSR #{}", offset),
        Instruction::Jsr { target: JsrTarget::Base(base) } => format!("JSRR {}", base),
        Instruction::Trap { vector } => match TrapVector::from_u8(vector) {
            Some(trap) => trap.mnemonic().to_string(),
            None => format!("TRAP x{:02X}", vector),
        },

        // Reserved
        Instruction::Rti => "RTI".to_string(),
        Instruction::Res => "RES".to_string(),
    }
}

fn format_src2(src2: Operand) -> String {
    match src2 {
        Operand::Reg(r) => r.to_string(),
        Operand::Imm(imm) => format!("#{}", imm),
    }
}
