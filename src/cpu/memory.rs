//! DCPU-16 memory subsystem.
//!
//! Memory is a flat array of 65536 sixteen-bit words. Addresses are `u16`,
//! so every address is valid and address arithmetic simply wraps.

use serde::{Serialize, Deserialize};
use thiserror::Error;

/// The number of words in memory.
pub const MEMORY_SIZE: usize = 0x10000;

/// DCPU-16 memory: 65536 words.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u16>", into = "Vec<u16>")]
pub struct Memory {
    words: Vec<u16>,
}

impl Memory {
    /// Create a new memory with all words zeroed.
    pub fn new() -> Self {
        Self {
            words: vec![0; MEMORY_SIZE],
        }
    }

    #[inline]
    pub fn read(&self, addr: u16) -> u16 {
        self.words[addr as usize]
    }

    #[inline]
    pub fn write(&mut self, addr: u16, value: u16) {
        self.words[addr as usize] = value;
    }

    /// Clear all memory to zeros.
    pub fn clear(&mut self) {
        self.words.fill(0);
    }

    /// Copy `program` into memory starting at `start`, wrapping past 0xffff.
    ///
    /// Words beyond the size of memory are ignored.
    pub fn load_program(&mut self, start: u16, program: &[u16]) {
        let mut addr = start;
        for &word in program.iter().take(MEMORY_SIZE) {
            self.write(addr, word);
            addr = addr.wrapping_add(1);
        }
    }

    /// Dump `count` words starting at `start` (for debugging).
    pub fn dump(&self, start: u16, count: usize) -> Vec<(u16, u16)> {
        (0..count.min(MEMORY_SIZE))
            .map(|i| {
                let addr = start.wrapping_add(i as u16);
                (addr, self.read(addr))
            })
            .collect()
    }

    /// All words, in address order.
    pub fn words(&self) -> &[u16] {
        &self.words
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<Vec<u16>> for Memory {
    type Error = MemorySizeError;

    fn try_from(words: Vec<u16>) -> Result<Self, Self::Error> {
        if words.len() != MEMORY_SIZE {
            return Err(MemorySizeError(words.len()));
        }
        Ok(Self { words })
    }
}

impl From<Memory> for Vec<u16> {
    fn from(mem: Memory) -> Self {
        mem.words
    }
}

/// A word vector that is not exactly the size of memory.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("memory must hold {MEMORY_SIZE} words, found {0}")]
pub struct MemorySizeError(pub usize);

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let non_zero = self.words.iter().filter(|&&w| w != 0).count();

        f.debug_struct("Memory")
            .field("non_zero_words", &non_zero)
            .field("total_words", &MEMORY_SIZE)
            .finish()
    }
}
