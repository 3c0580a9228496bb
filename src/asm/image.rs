//! Binary program images.
//!
//! An image is a sequence of big-endian 16-bit words, loaded verbatim
//! starting at address 0.

use clap::ValueEnum;
use serde::{Serialize, Deserialize};
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// What to do with a trailing byte that does not complete a word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
pub enum OddBytePolicy {
    /// Ignore the byte.
    #[default]
    Drop,
    /// Treat it as the high byte of a final word whose low byte is zero.
    Pad,
    /// Fail with [`ImageError::OddLength`].
    Reject,
}

/// Decode image bytes into words.
pub fn parse_image(bytes: &[u8], policy: OddBytePolicy) -> Result<Vec<u16>, ImageError> {
    let mut words: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();

    if let Some(&last) = bytes.chunks_exact(2).remainder().first() {
        match policy {
            OddBytePolicy::Drop => {
                log::warn!("image has odd length {}; dropping trailing byte {:#04x}", bytes.len(), last);
            }
            OddBytePolicy::Pad => {
                log::warn!("image has odd length {}; padding trailing byte {:#04x}", bytes.len(), last);
                words.push(u16::from_be_bytes([last, 0]));
            }
            OddBytePolicy::Reject => return Err(ImageError::OddLength(bytes.len())),
        }
    }

    if words.len() > crate::cpu::memory::MEMORY_SIZE {
        return Err(ImageError::TooLarge(words.len()));
    }

    Ok(words)
}

/// Read an image from any byte stream.
pub fn read_image<R: Read>(mut reader: R, policy: OddBytePolicy) -> Result<Vec<u16>, ImageError> {
    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .map_err(|source| ImageError::Io { path: PathBuf::from("<stream>"), source })?;
    parse_image(&bytes, policy)
}

/// Load an image file from disk.
pub fn load_image<P: AsRef<Path>>(path: P, policy: OddBytePolicy) -> Result<Vec<u16>, ImageError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)
        .map_err(|source| ImageError::Io { path: path.to_path_buf(), source })?;
    let words = parse_image(&bytes, policy)?;
    log::info!("loaded {} words from {}", words.len(), path.display());
    Ok(words)
}

/// Encode words as big-endian bytes.
pub fn words_to_bytes(words: &[u16]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_be_bytes()).collect()
}

/// Save an image file to disk.
pub fn save_image<P: AsRef<Path>>(path: P, words: &[u16]) -> Result<(), ImageError> {
    let path = path.as_ref();
    std::fs::write(path, words_to_bytes(words))
        .map_err(|source| ImageError::Io { path: path.to_path_buf(), source })
}

/// Errors that can occur while reading or writing images.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("cannot access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("image has odd length ({0} bytes)")]
    OddLength(usize),

    #[error("image of {0} words does not fit in memory")]
    TooLarge(usize),
}
