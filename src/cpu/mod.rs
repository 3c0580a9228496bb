//! CPU emulation for the DCPU-16.
//!
//! This module implements the DCPU-16 1.1 architecture:
//! - 65536 sixteen-bit memory words
//! - 8 general-purpose registers plus PC, SP and O
//! - 15 two-operand opcodes and one extended opcode (JSR)

pub mod memory;
pub mod registers;
pub mod decode;
pub mod operand;
pub mod execute;

pub use memory::{Memory, MemorySizeError};
pub use registers::{Register, Registers};
pub use decode::{Instruction, Operand, BasicOp, ExtendedOp, DecodeError};
pub use operand::{Accessor, PreEffect};
pub use execute::{Cpu, CpuError, CpuSnapshot, RunStop, StepOutcome};
