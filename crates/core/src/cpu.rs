//! MOS 6502 CPU core
//!
//! A cycle-counted core for a subset of the 6502 instruction set. Every byte
//! moved over the bus costs exactly one cycle; internal operations that take
//! a cycle without touching the bus are charged the same way. Instruction
//! timing therefore falls out of the bus traffic instead of being looked up.
//!
//! The core owns its memory through the [`Memory`] trait and reports what it
//! does to an injected [`CpuObserver`].

use crate::config::CpuConfig;
use crate::memory::{Memory, RESET_VECTOR};
use crate::observer::{CpuObserver, InstructionNotice, NullObserver};
use crate::opcodes::{self, AddressingMode, Instruction, Operation, Register};
use crate::status::{Flag, StatusRegister};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Faults surfaced by the core. None of them terminate the process.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpuError {
    /// The fetched opcode has no instruction-table entry. The CPU is now halted.
    #[error("unknown opcode {opcode:#04X} at PC={pc:#06X}\n{snapshot}")]
    UnknownOpcode {
        opcode: u8,
        /// Address the opcode was fetched from.
        pc: u16,
        snapshot: CpuSnapshot,
    },
    /// Execution was requested after an unknown opcode; only `reset` recovers.
    #[error("CPU is halted (opcode {opcode:#04X} at PC={pc:#06X}); reset required")]
    Halted { opcode: u8, pc: u16 },
    #[error("CPU has not been reset")]
    NotReset,
    #[error("CPU is in the wrong cycle {actual}, expected {expected}")]
    CycleMismatch { expected: u64, actual: u64 },
}

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    /// Constructed, waiting for the first `reset`.
    Reset,
    Running,
    /// Stopped on an unknown opcode.
    Halted { opcode: u8, pc: u16 },
}

/// Copy of the register file and cycle counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuSnapshot {
    pub pc: u16,
    pub sp: u8,
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub status: u8,
    pub cycles: u64,
}

impl fmt::Display for CpuSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "────────────────")?;
        writeln!(f, " C   : {:04}", self.cycles)?;
        writeln!(f, "PC   : {:#06X}", self.pc)?;
        writeln!(f, "SP   : {:#04X}", self.sp)?;
        writeln!(f, "ACC  : {:#04X}", self.a)?;
        writeln!(f, "REG X: {:#04X}", self.x)?;
        writeln!(f, "REG Y: {:#04X}", self.y)?;
        writeln!(f, "P    : {}", StatusRegister::from_bits(self.status))?;
        write!(f, "────────────────")
    }
}

/// MOS 6502 CPU state and execution engine
///
/// Generic over the memory backend and the observer. Registers are public so
/// tests and debuggers can poke state between steps.
#[derive(Debug)]
pub struct Cpu6502<M: Memory, O: CpuObserver = NullObserver> {
    /// Accumulator register
    pub a: u8,
    /// X index register
    pub x: u8,
    /// Y index register
    pub y: u8,
    /// Stack pointer. Initialised on reset; no instruction uses it yet.
    pub sp: u8,
    /// Status register (NV-BDIZC)
    pub status: StatusRegister,
    /// Program counter
    pub pc: u16,
    /// Bus cycles since the last reset
    pub cycles: u64,
    /// Memory interface
    pub memory: M,
    observer: O,
    config: CpuConfig,
    state: RunState,
}

impl<M: Memory> Cpu6502<M, NullObserver> {
    /// Create a CPU without instrumentation.
    pub fn new(memory: M) -> Self {
        Self::with_observer(memory, NullObserver)
    }
}

impl<M: Memory, O: CpuObserver> Cpu6502<M, O> {
    /// Create a CPU that reports to `observer`.
    ///
    /// The CPU starts in [`RunState::Reset`]; call [`Cpu6502::reset`] before
    /// executing.
    pub fn with_observer(memory: M, observer: O) -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            sp: 0xFF,
            status: StatusRegister::new(),
            pc: 0,
            cycles: 0,
            memory,
            observer,
            config: CpuConfig::default(),
            state: RunState::Reset,
        }
    }

    /// Replace the configuration, builder style.
    pub fn with_config(mut self, config: CpuConfig) -> Self {
        self.config = config;
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &CpuConfig {
        &self.config
    }

    /// Injected observer.
    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// Mutable access to the injected observer.
    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    /// Tear the CPU apart, handing back memory and observer.
    pub fn into_parts(self) -> (M, O) {
        (self.memory, self.observer)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RunState {
        self.state
    }

    /// True after an unknown opcode, until the next reset.
    pub fn is_halted(&self) -> bool {
        matches!(self.state, RunState::Halted { .. })
    }

    /// Copy of the registers and cycle counter.
    pub fn snapshot(&self) -> CpuSnapshot {
        CpuSnapshot {
            pc: self.pc,
            sp: self.sp,
            a: self.a,
            x: self.x,
            y: self.y,
            status: self.status.bits(),
            cycles: self.cycles,
        }
    }

    /// Re-initialise memory and registers, then load PC from the reset vector.
    ///
    /// The vector is read through the normal address-fetch path, so observers
    /// see those two bus cycles. The counter is zeroed afterwards: every run
    /// starts at cycle 0. Allowed in any state; always ends in `Running`.
    pub fn reset(&mut self) {
        self.memory.init();

        self.pc = RESET_VECTOR;
        let vector = self.fetch_operand_address();

        self.sp = 0xFF;
        self.a = 0;
        self.x = 0;
        self.y = 0;
        self.status.reset();
        self.cycles = 0;
        self.pc = vector;
        self.state = RunState::Running;
    }

    /// Run instructions until the cycle budget is used up.
    ///
    /// The loop keeps going while `cycles <= start + max_cycles`, checked only
    /// between instructions, so the last instruction may overshoot the budget.
    /// Returns the number of cycles actually spent.
    ///
    /// `max_cycles == 0` runs without a budget. That loop only ends on an
    /// error (an unknown opcode), so a program that never hits one, such as a
    /// `JMP` to itself, never returns. Only use it on programs known to halt.
    pub fn execute(&mut self, max_cycles: u64) -> Result<u64, CpuError> {
        self.ensure_running()?;

        let start = self.cycles;
        let end = start.saturating_add(max_cycles);
        while max_cycles == 0 || self.cycles <= end {
            self.step()?;
        }
        Ok(self.cycles - start)
    }

    /// Execute one instruction and return cycles used.
    pub fn step(&mut self) -> Result<u32, CpuError> {
        self.ensure_running()?;

        let start = self.cycles;
        let pc = self.pc;
        let opcode = self.fetch_opcode_byte();

        let Some(instruction) = opcodes::lookup(opcode) else {
            return Err(self.halt(opcode, pc));
        };
        self.dispatch(instruction);

        let used = self.cycles - start;
        debug_assert_eq!(
            used,
            instruction.cycles as u64,
            "{} {:?} cycle cost",
            instruction.mnemonic,
            instruction.mode
        );

        let notice = InstructionNotice {
            pc,
            opcode,
            mnemonic: instruction.mnemonic,
            after: self.snapshot(),
        };
        self.observer.on_instruction(&notice);
        Ok(used as u32)
    }

    /// Check the cycle counter. Diagnostic only; does not change run state.
    pub fn assert_cycle(&self, expected: u64) -> Result<(), CpuError> {
        if self.cycles == expected {
            Ok(())
        } else {
            Err(CpuError::CycleMismatch {
                expected,
                actual: self.cycles,
            })
        }
    }

    fn ensure_running(&self) -> Result<(), CpuError> {
        match self.state {
            RunState::Running => Ok(()),
            RunState::Reset => Err(CpuError::NotReset),
            RunState::Halted { opcode, pc } => Err(CpuError::Halted { opcode, pc }),
        }
    }

    fn halt(&mut self, opcode: u8, pc: u16) -> CpuError {
        self.state = RunState::Halted { opcode, pc };
        let snapshot = self.snapshot();
        self.observer.on_halt(opcode, &snapshot);
        CpuError::UnknownOpcode {
            opcode,
            pc,
            snapshot,
        }
    }

    // ---- bus primitives: one cycle per byte ----

    #[inline]
    fn tick(&mut self) {
        self.cycles += 1;
        self.observer.on_cycle(self.cycles);
    }

    /// A cycle spent inside the CPU with no useful bus traffic.
    #[inline]
    fn internal_cycle(&mut self) {
        self.tick();
    }

    /// Read the opcode at PC and advance PC.
    pub fn fetch_opcode_byte(&mut self) -> u8 {
        self.fetch_pc_byte()
    }

    /// Read an operand byte at PC and advance PC.
    pub fn fetch_operand_byte(&mut self) -> u8 {
        self.fetch_pc_byte()
    }

    /// Read a little-endian address at PC, advancing PC by two.
    pub fn fetch_operand_address(&mut self) -> u16 {
        let lo = self.fetch_pc_byte() as u16;
        let hi = self.fetch_pc_byte() as u16;
        (hi << 8) | lo
    }

    /// Data read.
    pub fn read_byte(&mut self, addr: u16) -> u8 {
        let value = self.memory.read_byte(addr);
        self.tick();
        value
    }

    /// Two data reads: low byte at `addr`, high byte at `addr + 1`.
    pub fn read_address(&mut self, addr: u16) -> u16 {
        let lo = self.read_byte(addr) as u16;
        let hi = self.read_byte(addr.wrapping_add(1)) as u16;
        (hi << 8) | lo
    }

    /// Data write.
    pub fn write_byte(&mut self, addr: u16, value: u8) {
        self.memory.write_byte(addr, value);
        self.tick();
    }

    #[inline]
    fn fetch_pc_byte(&mut self) -> u8 {
        let value = self.memory.read_byte(self.pc);
        self.pc = self.pc.wrapping_add(1);
        self.tick();
        value
    }

    /// JMP (indirect) pointer read. With `jump_indirect_page_wrap` the high
    /// byte stays in the pointer's page, as on NMOS parts.
    fn read_jump_pointer(&mut self, ptr: u16) -> u16 {
        let lo = self.read_byte(ptr) as u16;
        let hi_addr = if self.config.jump_indirect_page_wrap {
            (ptr & 0xFF00) | (ptr.wrapping_add(1) & 0x00FF)
        } else {
            ptr.wrapping_add(1)
        };
        let hi = self.read_byte(hi_addr) as u16;
        (hi << 8) | lo
    }

    // ---- decode & execute ----

    /// Resolve the effective address for memory-operand modes.
    fn effective_address(&mut self, mode: AddressingMode) -> u16 {
        match mode {
            AddressingMode::Immediate => {
                // The operand sits at PC; the caller's read pays the cycle.
                let addr = self.pc;
                self.pc = self.pc.wrapping_add(1);
                addr
            }
            AddressingMode::ZeroPageX => {
                // Address-derivation cycle: the operand byte is consumed, the
                // address is X in the zero page.
                let _ = self.fetch_operand_byte();
                self.x as u16
            }
            AddressingMode::Absolute => self.fetch_operand_address(),
            AddressingMode::Indirect => {
                let ptr = self.fetch_operand_address();
                self.read_jump_pointer(ptr)
            }
        }
    }

    fn operand_value(&mut self, mode: AddressingMode) -> u8 {
        match mode {
            AddressingMode::Immediate => self.fetch_operand_byte(),
            _ => {
                let addr = self.effective_address(mode);
                self.read_byte(addr)
            }
        }
    }

    fn dispatch(&mut self, instruction: &Instruction) {
        match instruction.operation {
            Operation::Load(register) => {
                let value = self.operand_value(instruction.mode);
                self.load_register(register, value);
            }
            Operation::AddWithCarry => {
                let value = self.operand_value(instruction.mode);
                self.add_with_carry(value);
                self.internal_cycle();
            }
            Operation::Jump => {
                self.pc = self.effective_address(instruction.mode);
                self.internal_cycle();
            }
        }
    }

    fn load_register(&mut self, register: Register, value: u8) {
        match register {
            Register::A => self.a = value,
            Register::X => self.x = value,
            Register::Y => self.y = value,
        }
        self.status.evaluate_zero_negative(value);
    }

    fn add_with_carry(&mut self, value: u8) {
        let carry_in = self.status.get_flag(Flag::Carry) as u16;
        let sum = self.a as u16 + value as u16 + carry_in;
        let result = sum as u8;
        self.status.set_flag(Flag::Carry, sum > 0xFF);
        // overflow: operands share a sign and the result does not
        self.status
            .set_flag(Flag::Overflow, (!(self.a ^ value) & (self.a ^ result) & 0x80) != 0);
        self.a = result;
        self.status.evaluate_zero_negative(result);
    }

    // ---- save state ----

    /// JSON save state of the register file. Memory is not included.
    pub fn save_state(&self) -> Value {
        serde_json::json!({
            "version": 1,
            "cpu": "6502",
            "registers": self.snapshot(),
        })
    }

    /// Restore a [`Cpu6502::save_state`] value. The CPU ends up `Running`.
    /// Bit 5 of the saved status is dropped; no instruction sets it.
    pub fn load_state(&mut self, v: &Value) -> Result<(), serde_json::Error> {
        let version = v["version"].as_u64().unwrap_or(0);
        if version != 1 {
            return Err(invalid_state(format!("unsupported save state version {}", version)));
        }
        if v["cpu"].as_str() != Some("6502") {
            return Err(invalid_state("save state is not for a 6502".to_string()));
        }

        let registers: CpuSnapshot = serde_json::from_value(v["registers"].clone())?;
        self.pc = registers.pc;
        self.sp = registers.sp;
        self.a = registers.a;
        self.x = registers.x;
        self.y = registers.y;
        self.status = StatusRegister::from_bits(registers.status & !Flag::Unused.mask());
        self.cycles = registers.cycles;
        self.state = RunState::Running;
        Ok(())
    }
}

fn invalid_state(message: String) -> serde_json::Error {
    <serde_json::Error as serde::de::Error>::custom(message)
}
