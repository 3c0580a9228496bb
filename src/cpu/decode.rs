//! Instruction decoder for the DCPU-16.
//!
//! In bits, a basic instruction has the format `bbbbbbaaaaaaoooo`: a 4-bit
//! opcode and two 6-bit operand codes. When the opcode field is zero the
//! word is an extended instruction, `aaaaaaoooooo0000`: a 6-bit opcode in
//! the middle field and the single operand code in the top field.
//!
//! Operand codes 0x10-0x17, 0x1e and 0x1f consume the word following the
//! instruction (and any earlier operand words).

use crate::cpu::memory::Memory;
use crate::cpu::registers::Register;
use serde::{Serialize, Deserialize};
use std::fmt;
use thiserror::Error;

const FOUR_BITS: u16 = 0x0f;
const SIX_BITS: u16 = 0x3f;

// Operand code boundaries.
pub const MEM_AT_REG: u16 = 0x08;
pub const MEM_AT_REG_NW: u16 = 0x10;
pub const POP: u16 = 0x18;
pub const PEEK: u16 = 0x19;
pub const PUSH: u16 = 0x1a;
pub const REG_SP: u16 = 0x1b;
pub const REG_PC: u16 = 0x1c;
pub const REG_O: u16 = 0x1d;
pub const NW: u16 = 0x1e;
pub const LIT_NW: u16 = 0x1f;
pub const LIT: u16 = 0x20;

/// Two-operand opcodes, held in the low four bits of a word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BasicOp {
    /// a := b
    Set = 0x1,
    /// a := a+b, O := carry
    Add = 0x2,
    /// a := a-b, O := 0xffff on underflow
    Sub = 0x3,
    /// a := a*b, O := high word of the product
    Mul = 0x4,
    /// a := a/b, O := fractional part; zero divisor gives zero
    Div = 0x5,
    /// a := a%b; zero divisor gives zero
    Mod = 0x6,
    /// a := a<<b, O := bits shifted out
    Shl = 0x7,
    /// a := a>>b, O := bits shifted out
    Shr = 0x8,
    And = 0x9,
    Bor = 0xa,
    Xor = 0xb,
    /// Perform the next instruction only if a == b
    Ife = 0xc,
    /// Perform the next instruction only if a != b
    Ifn = 0xd,
    /// Perform the next instruction only if a > b
    Ifg = 0xe,
    /// Perform the next instruction only if (a & b) != 0
    Ifb = 0xf,
}

impl BasicOp {
    pub const ALL: [BasicOp; 15] = [
        BasicOp::Set,
        BasicOp::Add,
        BasicOp::Sub,
        BasicOp::Mul,
        BasicOp::Div,
        BasicOp::Mod,
        BasicOp::Shl,
        BasicOp::Shr,
        BasicOp::And,
        BasicOp::Bor,
        BasicOp::Xor,
        BasicOp::Ife,
        BasicOp::Ifn,
        BasicOp::Ifg,
        BasicOp::Ifb,
    ];

    /// Opcode from the 4-bit field. Zero is the extended-instruction marker.
    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.code() == code)
    }

    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            BasicOp::Set => "SET",
            BasicOp::Add => "ADD",
            BasicOp::Sub => "SUB",
            BasicOp::Mul => "MUL",
            BasicOp::Div => "DIV",
            BasicOp::Mod => "MOD",
            BasicOp::Shl => "SHL",
            BasicOp::Shr => "SHR",
            BasicOp::And => "AND",
            BasicOp::Bor => "BOR",
            BasicOp::Xor => "XOR",
            BasicOp::Ife => "IFE",
            BasicOp::Ifn => "IFN",
            BasicOp::Ifg => "IFG",
            BasicOp::Ifb => "IFB",
        }
    }

    pub fn from_mnemonic(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|op| op.mnemonic().eq_ignore_ascii_case(name))
    }

    /// True for the IFx family, which only sets the skip flag.
    pub fn is_conditional(self) -> bool {
        matches!(self, BasicOp::Ife | BasicOp::Ifn | BasicOp::Ifg | BasicOp::Ifb)
    }
}

/// One-operand opcodes, held in bits 4-9 of an extended instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExtendedOp {
    /// Push the address of the next instruction, then PC := a
    Jsr = 0x01,
}

impl ExtendedOp {
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0x01 => Some(ExtendedOp::Jsr),
            _ => None,
        }
    }

    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            ExtendedOp::Jsr => "JSR",
        }
    }

    pub fn from_mnemonic(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("JSR") {
            Some(ExtendedOp::Jsr)
        } else {
            None
        }
    }
}

/// The bit fields of one instruction word, before opcode validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fields {
    Basic { opcode: u16, a: u16, b: u16 },
    Extended { opcode: u16, a: u16 },
}

impl Fields {
    /// Split an instruction word into its opcode and operand codes.
    pub fn split(word: u16) -> Self {
        let opcode = word & FOUR_BITS;
        if opcode != 0 {
            Fields::Basic {
                opcode,
                a: (word >> 4) & SIX_BITS,
                b: (word >> 10) & SIX_BITS,
            }
        } else {
            Fields::Extended {
                opcode: (word >> 4) & SIX_BITS,
                a: (word >> 10) & SIX_BITS,
            }
        }
    }
}

/// A decoded operand, with any next-word value already read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    /// `A`
    Register(Register),
    /// `[A]`
    Indirect(Register),
    /// `[A + next word]`
    IndirectOffset(Register, u16),
    Pop,
    Peek,
    Push,
    Sp,
    Pc,
    O,
    /// `[next word]`
    Memory(u16),
    /// Next word as a literal.
    NextLiteral(u16),
    /// Literal 0x00-0x1f packed into the operand code.
    Literal(u16),
}

impl Operand {
    /// Decode operand code `code`, reading any extra word at `next`.
    ///
    /// Returns the operand and the address of the next unread word. This is
    /// the single source of truth for how many words an operand consumes.
    pub fn decode(code: u16, mem: &Memory, next: u16) -> (Operand, u16) {
        let code = code & SIX_BITS;
        match code {
            c if c < MEM_AT_REG => (Operand::Register(Register::from_bits(c)), next),
            c if c < MEM_AT_REG_NW => (Operand::Indirect(Register::from_bits(c)), next),
            c if c < POP => (
                Operand::IndirectOffset(Register::from_bits(c), mem.read(next)),
                next.wrapping_add(1),
            ),
            POP => (Operand::Pop, next),
            PEEK => (Operand::Peek, next),
            PUSH => (Operand::Push, next),
            REG_SP => (Operand::Sp, next),
            REG_PC => (Operand::Pc, next),
            REG_O => (Operand::O, next),
            NW => (Operand::Memory(mem.read(next)), next.wrapping_add(1)),
            LIT_NW => (Operand::NextLiteral(mem.read(next)), next.wrapping_add(1)),
            c => (Operand::Literal(c - LIT), next),
        }
    }

    /// The 6-bit operand code and the extra word, if any.
    pub fn encode(&self) -> (u16, Option<u16>) {
        match *self {
            Operand::Register(r) => (r.index() as u16, None),
            Operand::Indirect(r) => (MEM_AT_REG | r.index() as u16, None),
            Operand::IndirectOffset(r, offset) => (MEM_AT_REG_NW | r.index() as u16, Some(offset)),
            Operand::Pop => (POP, None),
            Operand::Peek => (PEEK, None),
            Operand::Push => (PUSH, None),
            Operand::Sp => (REG_SP, None),
            Operand::Pc => (REG_PC, None),
            Operand::O => (REG_O, None),
            Operand::Memory(addr) => (NW, Some(addr)),
            Operand::NextLiteral(value) => (LIT_NW, Some(value)),
            Operand::Literal(value) => (LIT | (value & 0x1f), None),
        }
    }

    /// Literal operand for `value`, packed when it fits in the operand code.
    pub fn literal(value: u16) -> Self {
        if value < 0x20 {
            Operand::Literal(value)
        } else {
            Operand::NextLiteral(value)
        }
    }

    /// True if this operand reads the word after the instruction.
    pub fn has_extra_word(&self) -> bool {
        self.encode().1.is_some()
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Register(r) => write!(f, "{}", r),
            Operand::Indirect(r) => write!(f, "[{}]", r),
            Operand::IndirectOffset(r, offset) => write!(f, "[{} + {:#x}]", r, offset),
            Operand::Pop => f.write_str("POP"),
            Operand::Peek => f.write_str("PEEK"),
            Operand::Push => f.write_str("PUSH"),
            Operand::Sp => f.write_str("SP"),
            Operand::Pc => f.write_str("PC"),
            Operand::O => f.write_str("O"),
            Operand::Memory(addr) => write!(f, "[{:#x}]", addr),
            Operand::NextLiteral(value) | Operand::Literal(value) => write!(f, "{:#x}", value),
        }
    }
}

/// A fully decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    Basic { op: BasicOp, a: Operand, b: Operand },
    Extended { op: ExtendedOp, a: Operand },
}

impl Instruction {
    /// Number of words this instruction occupies.
    pub fn word_count(&self) -> u16 {
        match self {
            Instruction::Basic { a, b, .. } => {
                1 + a.has_extra_word() as u16 + b.has_extra_word() as u16
            }
            Instruction::Extended { a, .. } => 1 + a.has_extra_word() as u16,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Basic { op, a, b } => write!(f, "{} {}, {}", op.mnemonic(), a, b),
            Instruction::Extended { op, a } => write!(f, "{} {}", op.mnemonic(), a),
        }
    }
}

/// Decode the instruction at `addr`.
///
/// Returns the instruction and the address of the instruction after it.
pub fn decode(mem: &Memory, addr: u16) -> Result<(Instruction, u16), DecodeError> {
    let next = addr.wrapping_add(1);
    match Fields::split(mem.read(addr)) {
        Fields::Basic { opcode, a, b } => {
            let op = BasicOp::from_code(opcode)
                .ok_or(DecodeError::UnknownBasicOpcode { opcode, addr })?;
            let (a, next) = Operand::decode(a, mem, next);
            let (b, next) = Operand::decode(b, mem, next);
            Ok((Instruction::Basic { op, a, b }, next))
        }
        Fields::Extended { opcode, a } => {
            let op = ExtendedOp::from_code(opcode)
                .ok_or(DecodeError::UnknownExtendedOpcode { opcode, addr })?;
            let (a, next) = Operand::decode(a, mem, next);
            Ok((Instruction::Extended { op, a }, next))
        }
    }
}

/// Encode an instruction to its words (1 to 3).
pub fn encode(instr: &Instruction) -> Vec<u16> {
    let mut words = vec![0];
    match instr {
        Instruction::Basic { op, a, b } => {
            let (a_code, a_extra) = a.encode();
            let (b_code, b_extra) = b.encode();
            words[0] = op.code() | (a_code << 4) | (b_code << 10);
            words.extend(a_extra);
            words.extend(b_extra);
        }
        Instruction::Extended { op, a } => {
            let (a_code, a_extra) = a.encode();
            words[0] = (op.code() << 4) | (a_code << 10);
            words.extend(a_extra);
        }
    }
    words
}

/// Errors that can occur during instruction decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unknown basic opcode {opcode:#x} at {addr:#06x}")]
    UnknownBasicOpcode { opcode: u16, addr: u16 },

    #[error("unknown extended opcode {opcode:#x} at {addr:#06x}")]
    UnknownExtendedOpcode { opcode: u16, addr: u16 },
}
