//! Processor status register (P).
//!
//! Eight flag bits packed into one byte, laid out as `NV-BDIZC`:
//!
//! ```text
//! bit  7 6 5 4 3 2 1 0
//!      N V - B D I Z C
//! ```
//!
//! Bit 5 has no meaning for the emulated instructions and is never set by them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Bit position of a flag inside the status register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Flag {
    Carry = 0,
    Zero = 1,
    InterruptDisable = 2,
    Decimal = 3,
    Break = 4,
    Unused = 5,
    Overflow = 6,
    Negative = 7,
}

impl Flag {
    /// All flags, most significant bit first (display order).
    pub const ALL: [Flag; 8] = [
        Flag::Negative,
        Flag::Overflow,
        Flag::Unused,
        Flag::Break,
        Flag::Decimal,
        Flag::InterruptDisable,
        Flag::Zero,
        Flag::Carry,
    ];

    #[inline]
    pub const fn position(self) -> u8 {
        self as u8
    }

    #[inline]
    pub const fn mask(self) -> u8 {
        1 << (self as u8)
    }

    /// Single-letter name used in register dumps.
    pub const fn letter(self) -> char {
        match self {
            Flag::Carry => 'C',
            Flag::Zero => 'Z',
            Flag::InterruptDisable => 'I',
            Flag::Decimal => 'D',
            Flag::Break => 'B',
            Flag::Unused => '-',
            Flag::Overflow => 'V',
            Flag::Negative => 'N',
        }
    }
}

/// Packed status register.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusRegister(u8);

impl StatusRegister {
    pub const fn new() -> Self {
        Self(0)
    }

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Set (mask-OR) or clear (mask-AND-NOT) a single flag.
    #[inline]
    pub fn set_flag(&mut self, flag: Flag, set: bool) {
        if set {
            self.0 |= flag.mask();
        } else {
            self.0 &= !flag.mask();
        }
    }

    /// Returns the flag as 0 or 1.
    #[inline]
    pub fn get_flag(self, flag: Flag) -> u8 {
        (self.0 >> flag.position()) & 1
    }

    #[inline]
    pub fn is_set(self, flag: Flag) -> bool {
        self.get_flag(flag) == 1
    }

    pub fn reset(&mut self) {
        self.0 = 0;
    }

    /// Z = result is zero, N = bit 7 of result. Leaves every other flag alone.
    #[inline]
    pub fn evaluate_zero_negative(&mut self, result: u8) {
        self.set_flag(Flag::Zero, result == 0);
        self.set_flag(Flag::Negative, result & 0x80 != 0);
    }
}

impl From<u8> for StatusRegister {
    fn from(bits: u8) -> Self {
        Self(bits)
    }
}

impl From<StatusRegister> for u8 {
    fn from(status: StatusRegister) -> Self {
        status.0
    }
}

impl fmt::Display for StatusRegister {
    /// Renders `0b10000011 N-----ZC`: set flags by letter, clear ones as `-`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010b} ", self.0)?;
        for flag in Flag::ALL {
            let c = if flag != Flag::Unused && self.is_set(flag) {
                flag.letter()
            } else {
                '-'
            };
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}
