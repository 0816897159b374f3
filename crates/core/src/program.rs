//! Program loading.
//!
//! A [`Program`] is a byte sequence with a load address. Loading writes the
//! bytes and points the reset vector at them; do it before `reset`, or the CPU
//! boots from whatever the vector held.

use crate::memory::{Memory, RESET_VECTOR};
use crate::opcodes::op;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    origin: u16,
    bytes: Vec<u8>,
}

impl Program {
    pub fn new(origin: u16, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            origin,
            bytes: bytes.into(),
        }
    }

    /// `LDA #$F9; ADC $0F,X` at $0200.
    pub fn mini() -> Self {
        Self::new(
            0x0200,
            [op::LDA_IMMEDIATE, 0xF9, op::ADC_ZERO_PAGE_X, 0x0F],
        )
    }

    pub fn origin(&self) -> u16 {
        self.origin
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// First address past the program (wrapping).
    pub fn end(&self) -> u16 {
        self.origin.wrapping_add(self.bytes.len() as u16)
    }

    /// Write the program and its reset vector through the loader path.
    pub fn load_into<M: Memory>(&self, memory: &mut M) {
        memory.load_image(self.origin, &self.bytes);
        memory.load_image(RESET_VECTOR, &self.origin.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Ram;

    #[test]
    fn load_writes_bytes_and_vector() {
        let mut ram = Ram::new();
        let program = Program::new(0x0400, vec![1, 2, 3]);
        program.load_into(&mut ram);

        assert_eq!(ram.read_byte(0x0400), 1);
        assert_eq!(ram.read_byte(0x0402), 3);
        assert_eq!(ram.read_byte(RESET_VECTOR), 0x00);
        assert_eq!(ram.read_byte(RESET_VECTOR + 1), 0x04);
        assert_eq!(program.end(), 0x0403);
    }

    #[test]
    fn loaded_program_survives_init() {
        let mut ram = Ram::new();
        Program::mini().load_into(&mut ram);
        ram.init();
        assert_eq!(ram.read_address(RESET_VECTOR), 0x0200);
        assert_eq!(ram.read_byte(0x0200), op::LDA_IMMEDIATE);
        assert_eq!(ram.read_byte(0x0202), op::ADC_ZERO_PAGE_X);
    }

    #[test]
    fn mini_program_layout() {
        let mini = Program::mini();
        assert_eq!(mini.origin(), 0x0200);
        assert_eq!(mini.bytes(), &[0xA9, 0xF9, 0x75, 0x0F]);
    }
}
