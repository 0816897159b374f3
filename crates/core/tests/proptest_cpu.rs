//! Property-based tests for CPU invariants.

use emu_6502::opcodes::op;
use emu_6502::{Cpu6502, Flag, Memory, Program, Ram, Register, RunState, INSTRUCTION_TABLE};
use proptest::prelude::*;

const ORIGIN: u16 = 0x0200;

fn setup_cpu(program: &[u8]) -> Cpu6502<Ram> {
    let mut ram = Ram::new();
    Program::new(ORIGIN, program.to_vec()).load_into(&mut ram);
    let mut cpu = Cpu6502::new(ram);
    cpu.reset();
    cpu
}

fn load_opcode(register: Register) -> u8 {
    match register {
        Register::A => op::LDA_IMMEDIATE,
        Register::X => op::LDX_IMMEDIATE,
        Register::Y => op::LDY_IMMEDIATE,
    }
}

fn register_strategy() -> impl Strategy<Value = Register> {
    prop_oneof![Just(Register::A), Just(Register::X), Just(Register::Y)]
}

fn unknown_opcodes() -> Vec<u8> {
    (0u8..=255)
        .filter(|&opcode| INSTRUCTION_TABLE[opcode as usize].is_none())
        .collect()
}

/// Textbook binary ADC.
fn reference_adc(a: u8, value: u8, carry: bool) -> (u8, bool, bool) {
    let wide = a as u16 + value as u16 + carry as u16;
    let signed = a as i8 as i16 + value as i8 as i16 + carry as i16;
    (wide as u8, wide > 0xFF, !(-128..=127).contains(&signed))
}

// ========== Load immediate ==========

proptest! {
    /// Property: a load writes exactly one register, sets N/Z from the value
    /// and costs two cycles.
    #[test]
    fn prop_load_immediate(register in register_strategy(), value in 0u8..=255u8) {
        let mut cpu = setup_cpu(&[load_opcode(register), value]);

        prop_assert_eq!(cpu.step(), Ok(2));

        let expected = match register {
            Register::A => (value, 0, 0),
            Register::X => (0, value, 0),
            Register::Y => (0, 0, value),
        };
        prop_assert_eq!((cpu.a, cpu.x, cpu.y), expected);
        prop_assert_eq!(cpu.status.is_set(Flag::Zero), value == 0);
        prop_assert_eq!(cpu.status.is_set(Flag::Negative), value & 0x80 != 0);
        prop_assert_eq!(cpu.pc, ORIGIN + 2);
        prop_assert!(cpu.assert_cycle(2).is_ok());
    }

    /// Property: loads never touch carry or overflow.
    #[test]
    fn prop_load_preserves_carry_and_overflow(
        register in register_strategy(),
        value in 0u8..=255u8,
        carry in any::<bool>(),
        overflow in any::<bool>(),
    ) {
        let mut cpu = setup_cpu(&[load_opcode(register), value]);
        cpu.status.set_flag(Flag::Carry, carry);
        cpu.status.set_flag(Flag::Overflow, overflow);

        cpu.step().unwrap();

        prop_assert_eq!(cpu.status.is_set(Flag::Carry), carry);
        prop_assert_eq!(cpu.status.is_set(Flag::Overflow), overflow);
    }
}

// ========== Bus accounting ==========

proptest! {
    /// Property: data reads do not change memory and each costs one cycle.
    #[test]
    fn prop_read_is_idempotent(addr in 0u16..=0xFFFF, value in 0u8..=255u8, reads in 1usize..8) {
        let mut cpu = setup_cpu(&[]);
        cpu.memory.write_byte(addr, value);

        for n in 1..=reads {
            prop_assert_eq!(cpu.read_byte(addr), value);
            prop_assert_eq!(cpu.cycles, n as u64);
        }
        prop_assert_eq!(cpu.memory.read_byte(addr), value);
    }

    /// Property: an address read is two byte reads, low byte first.
    #[test]
    fn prop_read_address_little_endian(addr in 0u16..=0xFFFE, lo in 0u8..=255u8, hi in 0u8..=255u8) {
        let mut cpu = setup_cpu(&[]);
        cpu.memory.write_byte(addr, lo);
        cpu.memory.write_byte(addr + 1, hi);

        prop_assert_eq!(cpu.read_address(addr), u16::from_le_bytes([lo, hi]));
        prop_assert_eq!(cpu.cycles, 2);
    }
}

// ========== ADC ==========

proptest! {
    /// Property: ADC zero-page-X matches the reference adder in value and
    /// all four flags it touches, in four cycles.
    #[test]
    fn prop_adc_matches_reference(
        a in 0u8..=255u8,
        x in 0u8..=255u8,
        value in 0u8..=255u8,
        carry in any::<bool>(),
        operand in 0u8..=255u8,
    ) {
        let mut cpu = setup_cpu(&[op::ADC_ZERO_PAGE_X, operand]);
        cpu.a = a;
        cpu.x = x;
        cpu.status.set_flag(Flag::Carry, carry);
        cpu.memory.write_byte(x as u16, value);

        prop_assert_eq!(cpu.step(), Ok(4));

        let (result, carry_out, overflow) = reference_adc(a, value, carry);
        prop_assert_eq!(cpu.a, result);
        prop_assert_eq!(cpu.status.is_set(Flag::Carry), carry_out);
        prop_assert_eq!(cpu.status.is_set(Flag::Overflow), overflow);
        prop_assert_eq!(cpu.status.is_set(Flag::Zero), result == 0);
        prop_assert_eq!(cpu.status.is_set(Flag::Negative), result & 0x80 != 0);
        prop_assert_eq!(cpu.x, x);
        prop_assert_eq!(cpu.pc, ORIGIN + 2);
    }
}

// ========== JMP ==========

proptest! {
    /// Property: JMP absolute lands on its operand in four cycles.
    #[test]
    fn prop_jmp_absolute(target in 0u16..=0xFFFF) {
        let [lo, hi] = target.to_le_bytes();
        let mut cpu = setup_cpu(&[op::JMP_ABSOLUTE, lo, hi]);

        prop_assert_eq!(cpu.step(), Ok(4));
        prop_assert_eq!(cpu.pc, target);
    }

    /// Property: JMP indirect lands on the pointed-to address in six cycles.
    #[test]
    fn prop_jmp_indirect(ptr in 0x1000u16..0xF000, target in 0u16..=0xFFFF) {
        let [lo, hi] = ptr.to_le_bytes();
        let mut cpu = setup_cpu(&[op::JMP_INDIRECT, lo, hi]);
        cpu.memory.write_address(ptr, target);

        prop_assert_eq!(cpu.step(), Ok(6));
        prop_assert_eq!(cpu.pc, target);
    }
}

// ========== Halt ==========

proptest! {
    /// Property: every opcode outside the table halts after its fetch cycle
    /// and leaves the registers alone.
    #[test]
    fn prop_unknown_opcode_halts(opcode in prop::sample::select(unknown_opcodes())) {
        let mut cpu = setup_cpu(&[opcode]);

        let result = cpu.execute(0);

        prop_assert!(result.is_err());
        prop_assert_eq!(cpu.state(), RunState::Halted { opcode, pc: ORIGIN });
        prop_assert_eq!(cpu.cycles, 1);
        prop_assert_eq!((cpu.a, cpu.x, cpu.y), (0, 0, 0));
    }
}
