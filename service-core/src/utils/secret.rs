use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Compares two secrets without leaking the position of the first mismatch.
pub fn constant_time_eq(expected: &str, presented: &str) -> bool {
    let expected_bytes = expected.as_bytes();
    let presented_bytes = presented.as_bytes();

    if expected_bytes.len() != presented_bytes.len() {
        return false;
    }

    expected_bytes.ct_eq(presented_bytes).into()
}

/// Hex-encoded SHA-256 digest, used as the store lookup key for opaque tokens.
pub fn sha256_hex(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("site-token", "site-token"));
        assert!(!constant_time_eq("site-token", "site-tokem"));
        assert!(!constant_time_eq("site-token", "site"));
        assert!(!constant_time_eq("", "x"));
    }

    #[test]
    fn test_sha256_hex_is_stable() {
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_ne!(sha256_hex("agent.a"), sha256_hex("agent.b"));
    }
}
