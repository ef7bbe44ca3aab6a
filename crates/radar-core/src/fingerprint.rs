//! Transaction fingerprints
//!
//! A fingerprint is the double SHA-256 of the raw transaction bytes,
//! byte-reversed to match the display convention peers report hashes in.
//! It is the sole correlation key between a broadcast and its echoes.

use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Fingerprint length in bytes
pub const FINGERPRINT_LEN: usize = 32;

/// Unique identifier of a transaction, derived from its content hash
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxFingerprint([u8; FINGERPRINT_LEN]);

impl TxFingerprint {
    /// Wrap an already-reversed 32-byte hash
    pub const fn new(bytes: [u8; FINGERPRINT_LEN]) -> Self {
        Self(bytes)
    }

    /// Compute the fingerprint of a raw transaction
    pub fn of_transaction(raw_tx: &[u8]) -> Self {
        let first = Sha256::digest(raw_tx);
        let second = Sha256::digest(first);
        let mut bytes: [u8; FINGERPRINT_LEN] = second.into();
        // Peers report hashes in reversed byte order
        bytes.reverse();
        Self(bytes)
    }

    /// Parse a fingerprint from wire bytes. Returns None unless exactly
    /// 32 bytes are given.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let bytes: [u8; FINGERPRINT_LEN] = bytes.try_into().ok()?;
        Some(Self(bytes))
    }

    /// Raw bytes, in display order
    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_LEN] {
        &self.0
    }
}

impl fmt::Display for TxFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for TxFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxFingerprint({})", self)
    }
}

impl FromStr for TxFingerprint {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        Self::from_bytes(&bytes).ok_or(hex::FromHexError::InvalidStringLength)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vector() {
        // Double SHA-256 of empty input, byte-reversed
        let fp = TxFingerprint::of_transaction(b"");
        assert_eq!(
            fp.to_string(),
            "56944c5d3f98413ef45cf54545538103cc9f298e0575820ad3591376e2e0f65d"
        );
    }

    #[test]
    fn test_hex_round_trip() {
        let fp = TxFingerprint::of_transaction(b"some raw transaction");
        let parsed: TxFingerprint = fp.to_string().parse().unwrap();
        assert_eq!(parsed, fp);
    }

    #[test]
    fn test_from_bytes_length() {
        assert!(TxFingerprint::from_bytes(&[0u8; 32]).is_some());
        assert!(TxFingerprint::from_bytes(&[0u8; 31]).is_none());
        assert!(TxFingerprint::from_bytes(&[0u8; 33]).is_none());
        assert!(TxFingerprint::from_bytes(&[]).is_none());
    }

    #[test]
    fn test_distinct_transactions_distinct_fingerprints() {
        let a = TxFingerprint::of_transaction(b"tx a");
        let b = TxFingerprint::of_transaction(b"tx b");
        assert_ne!(a, b);
    }
}
