//! TUI debugger for the DCPU-16 emulator.
//!
//! Provides an interactive terminal-based debugger with:
//! - The 80x25 memory-mapped display
//! - Register and skip-flag view
//! - Memory view
//! - Step/run/breakpoint controls
//! - Disassembly from the current PC

mod app;
mod ui;

pub use app::{DebuggerApp, run_debugger};
