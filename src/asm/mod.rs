//! Assembler, disassembler and program images for DCPU-16 programs.
//!
//! This module provides:
//! - A disassembler that walks memory exactly as the CPU does
//! - A two-pass assembler (text → words)
//! - Loading and saving of big-endian binary images

pub mod assembler;
pub mod disasm;
pub mod image;

pub use assembler::{assemble, AssemblerError};
pub use disasm::{disassemble, disassemble_range};
pub use image::{load_image, save_image, ImageError, OddBytePolicy};
