mod error;
mod s2k;

pub use crate::error::S2kError;
pub use crate::s2k::{
    HashAlgorithm, MAX_ROUNDS, S2k, S2kMode, SALT_LEN, decode_count, derive_key, generate_salt,
};
