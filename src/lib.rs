//! # DCPU-16 Emulator
//!
//! An emulator of the DCPU-16, a 16-bit word-addressed CPU with eight
//! general-purpose registers, a downward-growing stack and an overflow
//! register.
//!
//! The core is the decode-execute engine in [`cpu`] and the disassembler in
//! [`asm::disasm`]. Both walk instruction words through the same operand
//! decoder, so they always agree on where the next instruction starts.

pub mod cpu;
pub mod asm;
pub mod display;

#[cfg(feature = "tui")]
pub mod tui;

// Re-export commonly used types
pub use cpu::{
    Cpu, CpuError, CpuSnapshot, DecodeError, Instruction, Memory, Register, Registers, RunStop,
    StepOutcome,
};
pub use asm::{
    assemble, disassemble, load_image, save_image, AssemblerError, ImageError, OddBytePolicy,
};

#[cfg(feature = "tui")]
pub use tui::run_debugger;
