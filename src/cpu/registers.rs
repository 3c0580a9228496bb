//! DCPU-16 register file.
//!
//! The DCPU-16 has:
//! - 8 general-purpose registers: A, B, C, X, Y, Z, I, J
//! - PC: program counter
//! - SP: stack pointer, growing down from the top of memory
//! - O: overflow register, written by arithmetic and shift opcodes

use serde::{Serialize, Deserialize};
use std::fmt;

/// Initial stack pointer value.
pub const STACK_START: u16 = 0xffff;

/// A general-purpose register, by its 3-bit ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Register {
    A,
    B,
    C,
    X,
    Y,
    Z,
    I,
    J,
}

impl Register {
    /// All registers in encoding order.
    pub const ALL: [Register; 8] = [
        Register::A,
        Register::B,
        Register::C,
        Register::X,
        Register::Y,
        Register::Z,
        Register::I,
        Register::J,
    ];

    /// Register from the low three bits of an operand code.
    pub fn from_bits(bits: u16) -> Self {
        Self::ALL[(bits & 0x7) as usize]
    }

    /// Ordinal used in operand encodings.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Assembly name.
    pub fn name(self) -> &'static str {
        match self {
            Register::A => "A",
            Register::B => "B",
            Register::C => "C",
            Register::X => "X",
            Register::Y => "Y",
            Register::Z => "Z",
            Register::I => "I",
            Register::J => "J",
        }
    }

    /// Parse an assembly register name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|r| r.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The DCPU-16 register file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    /// General-purpose registers, indexed by [`Register::index`].
    pub gp: [u16; 8],

    /// Program counter.
    pub pc: u16,

    /// Stack pointer. Starts at 0xffff.
    pub sp: u16,

    /// Overflow register.
    pub o: u16,
}

impl Registers {
    /// Create a new register file: everything zero except SP.
    pub fn new() -> Self {
        Self {
            gp: [0; 8],
            pc: 0,
            sp: STACK_START,
            o: 0,
        }
    }

    /// Reset all registers to their power-on values.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    #[inline]
    pub fn get(&self, reg: Register) -> u16 {
        self.gp[reg.index()]
    }

    #[inline]
    pub fn set(&mut self, reg: Register, value: u16) {
        self.gp[reg.index()] = value;
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_on_values() {
        let regs = Registers::new();
        assert_eq!(regs.gp, [0; 8]);
        assert_eq!(regs.pc, 0);
        assert_eq!(regs.sp, 0xffff);
        assert_eq!(regs.o, 0);
    }

    #[test]
    fn test_register_ordinals() {
        for (i, reg) in Register::ALL.iter().enumerate() {
            assert_eq!(reg.index(), i);
            assert_eq!(Register::from_bits(i as u16), *reg);
        }
        // Only the low three bits select the register.
        assert_eq!(Register::from_bits(0x0b), Register::X);
    }

    #[test]
    fn test_register_names() {
        assert_eq!(Register::from_name("a"), Some(Register::A));
        assert_eq!(Register::from_name("J"), Some(Register::J));
        assert_eq!(Register::from_name("SP"), None);
        assert_eq!(Register::Z.to_string(), "Z");
    }

    #[test]
    fn test_get_set() {
        let mut regs = Registers::new();
        regs.set(Register::Y, 0xbeef);
        assert_eq!(regs.get(Register::Y), 0xbeef);
        assert_eq!(regs.gp[4], 0xbeef);

        regs.reset();
        assert_eq!(regs.get(Register::Y), 0);
    }
}
