//! Query-shape fingerprints.
//!
//! A fingerprint identifies a query *shape*: dialect, template and the
//! ordered column expressions. Bind values never enter the hash, so every
//! call with the same shape maps to the same prepared statement.

use sha2::{Digest, Sha256};
use std::fmt;

const DOMAIN_TAG: &[u8] = b"recsql:shape:v1";

/// SHA-256 digest of a query shape.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Hash `(dialect, template, columns)`.
    ///
    /// Every component is length-framed, so `["ab", "c"]` and `["a", "bc"]`
    /// hash differently.
    pub fn compute<S: AsRef<str>>(dialect: &str, template: &str, columns: &[S]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(DOMAIN_TAG);
        write_str(&mut hasher, dialect);
        write_str(&mut hasher, template);
        write_len(&mut hasher, columns.len());
        for column in columns {
            write_str(&mut hasher, column.as_ref());
        }
        Self(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

fn write_len(hasher: &mut Sha256, len: usize) {
    let len = u32::try_from(len).unwrap_or(u32::MAX);
    hasher.update(len.to_be_bytes());
}

fn write_str(hasher: &mut Sha256, value: &str) {
    write_len(hasher, value.len());
    hasher.update(value.as_bytes());
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_shape_same_fingerprint() {
        let a = Fingerprint::compute("postgres", "select", &["id", "age"]);
        let b = Fingerprint::compute("postgres", "select", &["id".to_string(), "age".to_string()]);
        assert_eq!(a, b);
    }

    #[test]
    fn column_order_matters() {
        let a = Fingerprint::compute("postgres", "select", &["id", "age"]);
        let b = Fingerprint::compute("postgres", "select", &["age", "id"]);
        assert_ne!(a, b);
    }

    #[test]
    fn dialect_and_template_matter() {
        let base = Fingerprint::compute("postgres", "select", &["id"]);
        assert_ne!(base, Fingerprint::compute("mysql", "select", &["id"]));
        assert_ne!(base, Fingerprint::compute("postgres", "delete", &["id"]));
    }

    #[test]
    fn framing_separates_boundaries() {
        let a = Fingerprint::compute("postgres", "select", &["ab", "c"]);
        let b = Fingerprint::compute("postgres", "select", &["a", "bc"]);
        assert_ne!(a, b);

        let c = Fingerprint::compute("postgresselect", "", &["x"]);
        let d = Fingerprint::compute("postgres", "select", &["x"]);
        assert_ne!(c, d);
    }

    #[test]
    fn display_is_lowercase_hex() {
        let fp = Fingerprint::compute("mysql", "insert", &[] as &[&str]);
        let hex = fp.to_string();
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
