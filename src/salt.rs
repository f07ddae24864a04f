use anyhow::{Result, bail};
use pgps2k::SALT_LEN;

/// Parse a user-supplied salt.
///
/// Hex is tried first (`0x` prefix and interior spaces allowed), then a
/// comma-separated list of byte values. Either way the salt must come out
/// to exactly [`SALT_LEN`] bytes.
pub fn parse_salt(input: &str) -> Result<[u8; SALT_LEN]> {
    let trimmed = input.trim();
    let body = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    let compact: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if let Ok(bytes) = hex::decode(&compact) {
        if let Ok(salt) = <[u8; SALT_LEN]>::try_from(bytes.as_slice()) {
            return Ok(salt);
        }
    }

    if let Some(salt) = parse_decimal_list(body) {
        return Ok(salt);
    }

    bail!(
        "salt must be {SALT_LEN} bytes, as hex ('0a0b0c0d0e0f1011') or comma-separated integers ('10,11,12,13,14,15,16,17')"
    )
}

fn parse_decimal_list(input: &str) -> Option<[u8; SALT_LEN]> {
    let mut bytes = Vec::with_capacity(SALT_LEN);
    for part in input.split(',') {
        bytes.push(part.trim().parse::<u8>().ok()?);
    }
    <[u8; SALT_LEN]>::try_from(bytes.as_slice()).ok()
}
