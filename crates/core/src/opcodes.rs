//! Instruction table.
//!
//! A static 256-entry map from opcode byte to a descriptor. Unassigned slots are
//! `None`; the core halts when it fetches one of those.

use serde::{Deserialize, Serialize};

/// Opcode byte values for the implemented instructions.
pub mod op {
    pub const LDA_IMMEDIATE: u8 = 0xA9;
    pub const LDX_IMMEDIATE: u8 = 0xA2;
    pub const LDY_IMMEDIATE: u8 = 0xA0;
    pub const ADC_ZERO_PAGE_X: u8 = 0x75;
    pub const JMP_ABSOLUTE: u8 = 0x4C;
    pub const JMP_INDIRECT: u8 = 0x6C;
}

/// How an instruction derives its operand from the bytes after the opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressingMode {
    /// Operand is the next byte.
    Immediate,
    /// Operand lives at X in the zero page.
    ZeroPageX,
    /// Next two bytes are the address.
    Absolute,
    /// Next two bytes point at the address.
    Indirect,
}

impl AddressingMode {
    /// Bytes following the opcode.
    pub const fn operand_len(self) -> u8 {
        match self {
            AddressingMode::Immediate | AddressingMode::ZeroPageX => 1,
            AddressingMode::Absolute | AddressingMode::Indirect => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Register {
    A,
    X,
    Y,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    Load(Register),
    AddWithCarry,
    Jump,
}

/// Static description of one opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub mnemonic: &'static str,
    pub mode: AddressingMode,
    pub operation: Operation,
    /// Total cycles including the opcode fetch.
    pub cycles: u8,
}

impl Instruction {
    const fn new(
        mnemonic: &'static str,
        mode: AddressingMode,
        operation: Operation,
        cycles: u8,
    ) -> Self {
        Self {
            mnemonic,
            mode,
            operation,
            cycles,
        }
    }

    /// Instruction length in bytes, opcode included.
    pub const fn size(&self) -> u8 {
        1 + self.mode.operand_len()
    }
}

pub static INSTRUCTION_TABLE: [Option<Instruction>; 256] = build_table();

const fn build_table() -> [Option<Instruction>; 256] {
    use AddressingMode::*;

    let mut table: [Option<Instruction>; 256] = [None; 256];
    table[op::LDA_IMMEDIATE as usize] =
        Some(Instruction::new("LDA", Immediate, Operation::Load(Register::A), 2));
    table[op::LDX_IMMEDIATE as usize] =
        Some(Instruction::new("LDX", Immediate, Operation::Load(Register::X), 2));
    table[op::LDY_IMMEDIATE as usize] =
        Some(Instruction::new("LDY", Immediate, Operation::Load(Register::Y), 2));
    table[op::ADC_ZERO_PAGE_X as usize] =
        Some(Instruction::new("ADC", ZeroPageX, Operation::AddWithCarry, 4));
    table[op::JMP_ABSOLUTE as usize] = Some(Instruction::new("JMP", Absolute, Operation::Jump, 4));
    // Opcode + pointer (2) + target (2) + internal
    table[op::JMP_INDIRECT as usize] = Some(Instruction::new("JMP", Indirect, Operation::Jump, 6));
    table
}

#[inline]
pub fn lookup(opcode: u8) -> Option<&'static Instruction> {
    INSTRUCTION_TABLE[opcode as usize].as_ref()
}
