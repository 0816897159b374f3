//! Instrumentation hooks.
//!
//! Observers are injected when a CPU is built and receive copies of state, never
//! a handle to the CPU or its memory. Callbacks run inline with execution and
//! must return promptly.

use crate::cpu::CpuSnapshot;
use std::fmt;

/// Emitted after each successfully dispatched instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionNotice {
    /// Address the opcode was fetched from.
    pub pc: u16,
    pub opcode: u8,
    pub mnemonic: &'static str,
    /// Register file after the instruction completed.
    pub after: CpuSnapshot,
}

impl fmt::Display for InstructionNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.after;
        write!(
            f,
            "{:04X}  {:02X} {:<3}  A={:02X} X={:02X} Y={:02X} SP={:02X} PC={:04X} P={:02X} CYC={}",
            self.pc, self.opcode, self.mnemonic, s.a, s.x, s.y, s.sp, s.pc, s.status, s.cycles
        )
    }
}

/// Push-only side channel for cycle and instruction events.
pub trait CpuObserver {
    /// Called once per bus access with the new cycle count.
    fn on_cycle(&mut self, _cycle: u64) {}

    fn on_instruction(&mut self, _notice: &InstructionNotice) {}

    /// Called when an unknown opcode halts the CPU.
    fn on_halt(&mut self, _opcode: u8, _snapshot: &CpuSnapshot) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl CpuObserver for NullObserver {}

impl<T: CpuObserver + ?Sized> CpuObserver for &mut T {
    fn on_cycle(&mut self, cycle: u64) {
        (**self).on_cycle(cycle);
    }

    fn on_instruction(&mut self, notice: &InstructionNotice) {
        (**self).on_instruction(notice);
    }

    fn on_halt(&mut self, opcode: u8, snapshot: &CpuSnapshot) {
        (**self).on_halt(opcode, snapshot);
    }
}

impl<T: CpuObserver + ?Sized> CpuObserver for Box<T> {
    fn on_cycle(&mut self, cycle: u64) {
        (**self).on_cycle(cycle);
    }

    fn on_instruction(&mut self, notice: &InstructionNotice) {
        (**self).on_instruction(notice);
    }

    fn on_halt(&mut self, opcode: u8, snapshot: &CpuSnapshot) {
        (**self).on_halt(opcode, snapshot);
    }
}

/// Collects every event; handy in tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingObserver {
    pub cycles: Vec<u64>,
    pub notices: Vec<InstructionNotice>,
    pub halts: Vec<(u8, CpuSnapshot)>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rendered text of every instruction notice, in order.
    pub fn lines(&self) -> Vec<String> {
        self.notices.iter().map(ToString::to_string).collect()
    }
}

impl CpuObserver for RecordingObserver {
    fn on_cycle(&mut self, cycle: u64) {
        self.cycles.push(cycle);
    }

    fn on_instruction(&mut self, notice: &InstructionNotice) {
        self.notices.push(notice.clone());
    }

    fn on_halt(&mut self, opcode: u8, snapshot: &CpuSnapshot) {
        self.halts.push((opcode, snapshot.clone()));
    }
}
