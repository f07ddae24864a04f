use std::fmt;

use anyhow::{Result, anyhow};
use getrandom::fill;
use zeroize::Zeroizing;

use super::hash::HashAlgorithm;
use super::{MAX_ROUNDS, SALT_LEN};
use crate::error::S2kError;

/// Fill buffer with cryptographically secure random bytes
fn secure_random(buf: &mut [u8]) -> Result<()> {
    fill(buf).map_err(|_| anyhow!("OS random generator unavailable"))
}

/// Draw a fresh 8-byte salt from the OS random generator.
pub fn generate_salt() -> Result<[u8; SALT_LEN]> {
    let mut salt = [0u8; SALT_LEN];
    secure_random(&mut salt)?;
    Ok(salt)
}

/// Decode a one-octet iteration count into the number of bytes to hash.
///
/// The encoding packs a 4-bit mantissa and a 4-bit exponent into one byte:
///
/// ```text
/// count = (16 + low 4 bits) << (high 4 bits + 6)
/// ```
///
/// which spans 1,024 (encoded 0) to 65,011,712 (encoded 255) bytes. The
/// parameter is wider than a byte so callers passing unvalidated input get a
/// range error instead of a silent wrap.
///
/// # Errors
///
/// Returns [`S2kError::InvalidEncodedCount`] when `encoded` exceeds 255.
pub fn decode_count(encoded: u32) -> Result<u64, S2kError> {
    if encoded > 255 {
        return Err(S2kError::InvalidEncodedCount(encoded));
    }
    Ok((16 + u64::from(encoded & 15)) << ((encoded >> 4) + 6))
}

/// The three S2K variants of RFC 4880 section 3.7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum S2kMode {
    Simple,
    Salted,
    IteratedSalted,
}

impl S2kMode {
    /// Wire code of this mode.
    pub const fn code(self) -> u8 {
        match self {
            S2kMode::Simple => 0,
            S2kMode::Salted => 1,
            S2kMode::IteratedSalted => 3,
        }
    }

    /// Resolve a wire code. Code 2 is reserved and has no meaning.
    pub fn from_code(code: u8) -> Result<Self, S2kError> {
        match code {
            0 => Ok(S2kMode::Simple),
            1 => Ok(S2kMode::Salted),
            3 => Ok(S2kMode::IteratedSalted),
            other => Err(S2kError::UnsupportedMode(other)),
        }
    }
}

impl fmt::Display for S2kMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            S2kMode::Simple => "simple",
            S2kMode::Salted => "salted",
            S2kMode::IteratedSalted => "iterated+salted",
        };
        f.write_str(name)
    }
}

/// A fully specified S2K: each variant carries exactly the parameters its
/// mode needs, so a salted derivation without a salt cannot be expressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum S2k {
    Simple,
    Salted {
        salt: [u8; SALT_LEN],
    },
    IteratedSalted {
        salt: [u8; SALT_LEN],
        /// Total bytes to hash per round, already decoded.
        count: u64,
    },
}

impl S2k {
    /// Mode of this S2K.
    pub fn mode(&self) -> S2kMode {
        match self {
            S2k::Simple => S2kMode::Simple,
            S2k::Salted { .. } => S2kMode::Salted,
            S2k::IteratedSalted { .. } => S2kMode::IteratedSalted,
        }
    }

    /// The salt in use, empty for the simple mode.
    pub fn salt(&self) -> &[u8] {
        match self {
            S2k::Simple => &[],
            S2k::Salted { salt } | S2k::IteratedSalted { salt, .. } => salt,
        }
    }

    /// Derive `key_length` bytes of key material from `passphrase`.
    ///
    /// Each round hashes the mode's input material and appends the digest to
    /// the key; rounds after the first prepend a counter byte so their input
    /// differs. The concatenated digests are truncated to `key_length`.
    ///
    /// # Errors
    ///
    /// Returns [`S2kError::InvalidKeyLength`] when `key_length` is zero or
    /// would need more rounds than the one-octet counter can number. No
    /// hashing happens on that path.
    pub fn derive(
        &self,
        algo: HashAlgorithm,
        passphrase: &str,
        key_length: usize,
    ) -> Result<Zeroizing<Vec<u8>>, S2kError> {
        let digest_len = algo.digest_len();
        if key_length == 0 || key_length.div_ceil(digest_len) > MAX_ROUNDS {
            return Err(S2kError::InvalidKeyLength(key_length));
        }

        let passphrase = passphrase.as_bytes();
        let mut key = Zeroizing::new(Vec::with_capacity(key_length + digest_len));
        let mut round = 0usize;
        while key.len() < key_length {
            let mut material = Zeroizing::new(Vec::new());
            if round > 0 {
                // Round 0 hashes without any prefix; a 0x00 byte here would
                // change the digest and break interoperability.
                material.push(round as u8);
            }
            match self {
                S2k::Simple => material.extend_from_slice(passphrase),
                S2k::Salted { salt } => {
                    material.extend_from_slice(salt);
                    material.extend_from_slice(passphrase);
                }
                S2k::IteratedSalted { salt, count } => {
                    material.extend_from_slice(salt);
                    material.extend_from_slice(passphrase);
                    expand_material(&mut material, *count);
                }
            }
            let digest = Zeroizing::new(algo.digest(&material));
            key.extend_from_slice(&digest);
            round += 1;
        }

        key.truncate(key_length);
        Ok(key)
    }
}

/// Cycle the round's base block until exactly `count` bytes sit in the
/// buffer. The count is a byte total, not a repetition count, so the last
/// copy usually stops mid-block; a count below the block length truncates
/// the block instead.
fn expand_material(material: &mut Vec<u8>, count: u64) {
    let base_len = material.len() as u64;
    if count <= base_len {
        material.truncate(count as usize);
        return;
    }
    material.reserve_exact((count - base_len) as usize);
    while (material.len() as u64) < count {
        let take = base_len.min(count - material.len() as u64) as usize;
        material.extend_from_within(..take);
    }
}

/// Derive a key from loosely typed parameters, the shape a CLI or a parsed
/// packet hands over.
///
/// The salt is optional for the salted modes: when absent a fresh one is
/// drawn from the OS random generator. The simple mode takes no salt and
/// ignores one if given. `count` is only consulted for the iterated mode and
/// must already be decoded.
///
/// Returns the key and the salt that produced it, so a caller using a
/// generated salt can store it for later re-derivation. The salt is empty
/// for the simple mode.
///
/// # Errors
///
/// Fails when the salt is present but not exactly [`SALT_LEN`] bytes, when
/// the iterated mode is requested without a count, when `key_length` is
/// unusable, or when the OS random generator cannot be reached.
pub fn derive_key(
    algo: HashAlgorithm,
    passphrase: &str,
    key_length: usize,
    mode: S2kMode,
    salt: Option<&[u8]>,
    count: Option<u64>,
) -> Result<(Zeroizing<Vec<u8>>, Vec<u8>)> {
    let s2k = match mode {
        S2kMode::Simple => S2k::Simple,
        S2kMode::Salted => S2k::Salted {
            salt: salt_or_fresh(salt)?,
        },
        S2kMode::IteratedSalted => S2k::IteratedSalted {
            salt: salt_or_fresh(salt)?,
            count: count.ok_or(S2kError::MissingIterationCount)?,
        },
    };

    let key = s2k.derive(algo, passphrase, key_length)?;
    Ok((key, s2k.salt().to_vec()))
}

fn salt_or_fresh(salt: Option<&[u8]>) -> Result<[u8; SALT_LEN]> {
    match salt {
        Some(bytes) => Ok(<[u8; SALT_LEN]>::try_from(bytes)
            .map_err(|_| S2kError::InvalidSaltLength(bytes.len()))?),
        None => generate_salt(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SALT: [u8; SALT_LEN] = [0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f, 0x10, 0x11];

    #[test]
    fn decode_count_follows_rfc_formula() {
        assert_eq!(decode_count(0).unwrap(), 1_024);
        assert_eq!(decode_count(96).unwrap(), 65_536);
        assert_eq!(decode_count(255).unwrap(), 65_011_712);
        for encoded in 0u32..=255 {
            let expected = (16 + u64::from(encoded & 15)) << ((encoded >> 4) + 6);
            assert_eq!(decode_count(encoded).unwrap(), expected);
        }
    }

    #[test]
    fn decode_count_rejects_wider_than_a_byte() {
        match decode_count(256) {
            Err(S2kError::InvalidEncodedCount(256)) => {}
            other => panic!("expected InvalidEncodedCount, got: {other:?}"),
        }
    }

    #[test]
    fn mode_codes_roundtrip() {
        for mode in [S2kMode::Simple, S2kMode::Salted, S2kMode::IteratedSalted] {
            assert_eq!(S2kMode::from_code(mode.code()).unwrap(), mode);
        }
    }

    #[test]
    fn typed_s2k_reports_its_mode() {
        assert_eq!(S2k::Simple.mode(), S2kMode::Simple);
        assert_eq!(S2k::Salted { salt: SALT }.mode(), S2kMode::Salted);
        assert_eq!(
            S2k::IteratedSalted { salt: SALT, count: 1024 }.mode(),
            S2kMode::IteratedSalted
        );
    }

    #[test]
    fn reserved_mode_code_is_rejected() {
        match S2kMode::from_code(2) {
            Err(S2kError::UnsupportedMode(2)) => {}
            other => panic!("expected UnsupportedMode, got: {other:?}"),
        }
        assert!(S2kMode::from_code(4).is_err());
        assert!(S2kMode::from_code(100).is_err());
    }

    #[test]
    fn simple_single_round_equals_plain_digest() {
        let key = S2k::Simple
            .derive(HashAlgorithm::Sha1, "password", 20)
            .unwrap();
        assert_eq!(*key, HashAlgorithm::Sha1.digest(b"password"));
    }

    #[test]
    fn salted_single_round_prepends_salt() {
        let key = S2k::Salted { salt: SALT }
            .derive(HashAlgorithm::Sha1, "password", 20)
            .unwrap();
        let mut material = SALT.to_vec();
        material.extend_from_slice(b"password");
        assert_eq!(*key, HashAlgorithm::Sha1.digest(&material));
    }

    #[test]
    fn iterated_count_below_block_length_truncates_mid_block() {
        // Block is salt || passphrase = 16 bytes; a count of 5 hashes only
        // the first 5 salt bytes.
        let key = S2k::IteratedSalted { salt: SALT, count: 5 }
            .derive(HashAlgorithm::Sha1, "password", 20)
            .unwrap();
        assert_eq!(*key, HashAlgorithm::Sha1.digest(&SALT[..5]));
    }

    #[test]
    fn iterated_material_cycles_to_exact_count() {
        // 16-byte block, count 40: two full copies plus the first 8 bytes.
        let key = S2k::IteratedSalted { salt: SALT, count: 40 }
            .derive(HashAlgorithm::Sha1, "password", 20)
            .unwrap();
        let mut block = SALT.to_vec();
        block.extend_from_slice(b"password");
        let mut material = Vec::new();
        material.extend_from_slice(&block);
        material.extend_from_slice(&block);
        material.extend_from_slice(&block[..8]);
        assert_eq!(*key, HashAlgorithm::Sha1.digest(&material));
    }

    #[test]
    fn rounds_append_prefixed_digests() {
        // 50 bytes from a 20-byte digest takes three rounds: bare, then
        // prefixed with 0x01, then 0x02, truncated at the end.
        let key = S2k::Simple
            .derive(HashAlgorithm::Sha1, "password", 50)
            .unwrap();
        let mut expected = HashAlgorithm::Sha1.digest(b"password");
        expected.extend_from_slice(&HashAlgorithm::Sha1.digest(b"\x01password"));
        expected.extend_from_slice(&HashAlgorithm::Sha1.digest(b"\x02password"));
        expected.truncate(50);
        assert_eq!(*key, expected);
    }

    #[test]
    fn iterated_rounds_cycle_the_prefixed_block() {
        // In round 1 the counter byte joins the block, so the cycled unit is
        // 17 bytes long, not 16.
        let key = S2k::IteratedSalted { salt: SALT, count: 64 }
            .derive(HashAlgorithm::Sha1, "password", 40)
            .unwrap();

        let mut block = SALT.to_vec();
        block.extend_from_slice(b"password");
        let mut round0 = Vec::new();
        while round0.len() < 64 {
            let take = block.len().min(64 - round0.len());
            round0.extend_from_slice(&block[..take]);
        }

        let mut prefixed = vec![1u8];
        prefixed.extend_from_slice(&block);
        let mut round1 = Vec::new();
        while round1.len() < 64 {
            let take = prefixed.len().min(64 - round1.len());
            round1.extend_from_slice(&prefixed[..take]);
        }

        let mut expected = HashAlgorithm::Sha1.digest(&round0);
        expected.extend_from_slice(&HashAlgorithm::Sha1.digest(&round1));
        expected.truncate(40);
        assert_eq!(*key, expected);
    }

    #[test]
    fn requested_length_is_exact_for_any_size() {
        for len in [1usize, 7, 19, 20, 21, 40, 64, 100] {
            let key = S2k::Salted { salt: SALT }
                .derive(HashAlgorithm::Sha256, "password", len)
                .unwrap();
            assert_eq!(key.len(), len);
        }
    }

    #[test]
    fn digest_length_is_read_from_the_algorithm() {
        // 60 bytes fit in a single sha512 round.
        let key = S2k::Simple
            .derive(HashAlgorithm::Sha512, "password", 60)
            .unwrap();
        let mut expected = HashAlgorithm::Sha512.digest(b"password");
        expected.truncate(60);
        assert_eq!(*key, expected);
    }

    #[test]
    fn derivation_is_deterministic() {
        let s2k = S2k::IteratedSalted { salt: SALT, count: 2048 };
        let a = s2k.derive(HashAlgorithm::Sha256, "password", 32).unwrap();
        let b = s2k.derive(HashAlgorithm::Sha256, "password", 32).unwrap();
        assert_eq!(*a, *b);
    }

    #[test]
    fn zero_key_length_is_rejected() {
        match S2k::Simple.derive(HashAlgorithm::Sha1, "password", 0) {
            Err(S2kError::InvalidKeyLength(0)) => {}
            other => panic!("expected InvalidKeyLength, got: {other:?}"),
        }
    }

    #[test]
    fn absurd_key_length_is_rejected_before_hashing() {
        // 256 rounds of sha1 cover 5120 bytes; one more byte needs a round
        // the prefix octet cannot number.
        assert!(S2k::Simple.derive(HashAlgorithm::Sha1, "x", 5120).is_ok());
        match S2k::Simple.derive(HashAlgorithm::Sha1, "x", 5121) {
            Err(S2kError::InvalidKeyLength(5121)) => {}
            other => panic!("expected InvalidKeyLength, got: {other:?}"),
        }
    }

    #[test]
    fn derive_key_requires_count_for_iterated_mode() {
        let err = derive_key(
            HashAlgorithm::Sha1,
            "password",
            16,
            S2kMode::IteratedSalted,
            Some(&SALT),
            None,
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<S2kError>(),
            Some(S2kError::MissingIterationCount)
        ));
    }

    #[test]
    fn derive_key_rejects_short_salt() {
        let err = derive_key(
            HashAlgorithm::Sha1,
            "password",
            16,
            S2kMode::Salted,
            Some(&SALT[..7]),
            None,
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<S2kError>(),
            Some(S2kError::InvalidSaltLength(7))
        ));
    }

    #[test]
    fn derive_key_generates_and_returns_a_salt() {
        let (key_a, salt_a) =
            derive_key(HashAlgorithm::Sha1, "password", 16, S2kMode::Salted, None, None).unwrap();
        let (_, salt_b) =
            derive_key(HashAlgorithm::Sha1, "password", 16, S2kMode::Salted, None, None).unwrap();
        assert_eq!(salt_a.len(), SALT_LEN);
        assert_ne!(salt_a, salt_b);

        let (again, _) = derive_key(
            HashAlgorithm::Sha1,
            "password",
            16,
            S2kMode::Salted,
            Some(&salt_a),
            None,
        )
        .unwrap();
        assert_eq!(*key_a, *again);
    }

    #[test]
    fn simple_mode_ignores_salt_and_returns_empty() {
        let (with_salt, salt) = derive_key(
            HashAlgorithm::Sha1,
            "password",
            20,
            S2kMode::Simple,
            Some(&SALT),
            None,
        )
        .unwrap();
        let (without, _) =
            derive_key(HashAlgorithm::Sha1, "password", 20, S2kMode::Simple, None, None).unwrap();
        assert!(salt.is_empty());
        assert_eq!(*with_salt, *without);
    }
}
