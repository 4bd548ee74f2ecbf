//! Prefixed random record identifiers, e.g. `usr-k3NqTz08bWmHxR2c`.

use crate::error::{OrmError, OrmResult};
use uuid::Uuid;

const ALPHABET: &[u8] = b"abcdefghjklmnopqrstvwxyzABCDEFGHJKLMNOPQRSTVWXYZ023456789";

/// Number of random characters after the prefix.
pub const ID_LEN: usize = 16;

/// Longest accepted prefix.
pub const MAX_PREFIX_LEN: usize = 7;

/// Generate `"{prefix}-{16 random chars}"`.
pub fn id(prefix: &str) -> OrmResult<String> {
    check_prefix(prefix)?;

    let mut out = String::with_capacity(prefix.len() + 1 + ID_LEN);
    out.push_str(prefix);
    out.push('-');

    let mut remaining = ID_LEN;
    while remaining > 0 {
        for (i, byte) in Uuid::new_v4().as_bytes().iter().enumerate() {
            // The high nibble of byte 6 is the fixed UUID version.
            if i == 6 {
                continue;
            }
            let idx = usize::from(byte & 0x3f);
            if idx < ALPHABET.len() {
                out.push(char::from(ALPHABET[idx]));
                remaining -= 1;
                if remaining == 0 {
                    break;
                }
            }
        }
    }

    Ok(out)
}

pub(crate) fn check_prefix(prefix: &str) -> OrmResult<()> {
    if prefix.len() > MAX_PREFIX_LEN {
        return Err(OrmError::shape(format!(
            "id prefix must be at most {MAX_PREFIX_LEN} characters: {prefix:?}"
        )));
    }
    Ok(())
}
