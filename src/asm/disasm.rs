//! Disassembler for DCPU-16 programs.
//!
//! Converts memory words back to readable assembly. Operand decoding is
//! shared with the CPU, so the disassembler always steps over exactly the
//! words the CPU would consume.

use crate::cpu::decode::{BasicOp, ExtendedOp, Fields, Operand};
use crate::cpu::Memory;

/// Placeholder for opcodes the CPU does not implement.
pub const UNKNOWN_OPCODE: &str = "???";

/// Disassemble the instruction at `addr`.
///
/// Returns the text and the address of the following instruction. Unknown
/// opcodes render as `???` but still consume their operand words.
pub fn disassemble(mem: &Memory, addr: u16) -> (String, u16) {
    let next = addr.wrapping_add(1);

    match Fields::split(mem.read(addr)) {
        Fields::Basic { opcode, a, b } => {
            let (dest, next) = Operand::decode(a, mem, next);
            let (src, next) = Operand::decode(b, mem, next);
            let op = BasicOp::from_code(opcode).map_or(UNKNOWN_OPCODE, BasicOp::mnemonic);
            (format!("{} {}, {}", op, dest, src), next)
        }
        Fields::Extended { opcode, a } => {
            let (arg, next) = Operand::decode(a, mem, next);
            let op = ExtendedOp::from_code(opcode).map_or(UNKNOWN_OPCODE, ExtendedOp::mnemonic);
            (format!("{} {}", op, arg), next)
        }
    }
}

/// One line of a disassembly listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub addr: u16,
    pub text: String,
    pub words: Vec<u16>,
}

/// Disassemble `count` instructions starting at `start`.
pub fn disassemble_lines(mem: &Memory, start: u16, count: usize) -> Vec<Line> {
    let mut lines = Vec::with_capacity(count);
    let mut addr = start;

    for _ in 0..count {
        let (text, next) = disassemble(mem, addr);
        let len = next.wrapping_sub(addr);
        let words = (0..len).map(|i| mem.read(addr.wrapping_add(i))).collect();
        lines.push(Line { addr, text, words });
        addr = next;
    }

    lines
}

/// Disassemble a range into a printable listing.
pub fn disassemble_range(mem: &Memory, start: u16, count: usize) -> String {
    let mut output = String::new();
    output.push_str("; DCPU-16 Disassembly\n");
    output.push_str("; -------------------\n\n");

    for line in disassemble_lines(mem, start, count) {
        let hex: Vec<String> = line.words.iter().map(|w| format!("{:04x}", w)).collect();
        output.push_str(&format!("{:04x}: {:<24} ; {}\n", line.addr, line.text, hex.join(" ")));
    }

    output
}
