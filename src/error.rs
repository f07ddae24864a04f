use std::fmt;

use crate::s2k::SALT_LEN;

#[derive(Debug)]
pub enum S2kError {
    InvalidEncodedCount(u32),
    UnsupportedMode(u8),
    InvalidSaltLength(usize),
    MissingIterationCount,
    UnsupportedAlgorithm(String),
    InvalidKeyLength(usize),
}

impl fmt::Display for S2kError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            S2kError::InvalidEncodedCount(c) => {
                write!(f, "encoded count {c} out of range (expected 0-255)")
            }
            S2kError::UnsupportedMode(m) => {
                write!(f, "unsupported S2K mode code {m} (expected 0, 1 or 3)")
            }
            S2kError::InvalidSaltLength(n) => {
                write!(f, "salt must be exactly {SALT_LEN} bytes, got {n}")
            }
            S2kError::MissingIterationCount => {
                write!(f, "iterated+salted S2K requires an iteration count")
            }
            S2kError::UnsupportedAlgorithm(name) => {
                write!(f, "unsupported hash algorithm '{name}'")
            }
            S2kError::InvalidKeyLength(n) => {
                write!(f, "cannot derive a {n} byte key")
            }
        }
    }
}

impl std::error::Error for S2kError {}
