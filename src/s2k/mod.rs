//! OpenPGP string-to-key (S2K) key derivation.
//!
//! Implements the three S2K types of RFC 4880 section 3.7 (simple, salted,
//! iterated+salted) over a pluggable digest algorithm.

pub mod derive;
pub mod hash;

pub use derive::{S2k, S2kMode, decode_count, derive_key, generate_salt};
pub use hash::HashAlgorithm;

/// Length of an S2K salt (8 bytes).
pub const SALT_LEN: usize = 8;
/// Most digest rounds one derivation may span: the round prefix is a single
/// octet and cannot count past 255.
pub const MAX_ROUNDS: usize = 256;
