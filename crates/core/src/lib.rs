//! Cycle-counted MOS 6502 CPU core.
//!
//! Implements the load-immediate, ADC zero-page-X and JMP (absolute and
//! indirect) instructions on top of a one-cycle-per-bus-access timing model.
//!
//! ```rust
//! use emu_6502::{Cpu6502, Program, Ram};
//!
//! let mut ram = Ram::new();
//! Program::mini().load_into(&mut ram);
//!
//! let mut cpu = Cpu6502::new(ram);
//! cpu.reset();
//! cpu.execute(1).unwrap();
//! assert_eq!(cpu.a, 0xF9);
//! cpu.assert_cycle(2).unwrap();
//! ```

pub mod config;
pub mod cpu;
pub mod logging;
pub mod memory;
pub mod observer;
pub mod opcodes;
pub mod program;
pub mod status;

pub use config::{ConfigError, CpuConfig, LogSettings};
pub use cpu::{Cpu6502, CpuError, CpuSnapshot, RunState};
pub use logging::{LogCategory, LogConfig, LogLevel, LogObserver};
pub use memory::{Memory, Ram, MEMORY_SIZE, RESET_VECTOR};
pub use observer::{CpuObserver, InstructionNotice, NullObserver, RecordingObserver};
pub use opcodes::{AddressingMode, Instruction, Operation, Register, INSTRUCTION_TABLE};
pub use program::Program;
pub use status::{Flag, StatusRegister};
