//! Server seed generation and commitment.
//!
//! The commitment is `keccak256(seed)` over the raw 32 bytes, the same value
//! the ledger contract computes with `keccak256(abi.encodePacked(bytes32))`
//! when the seed is revealed at settlement.

use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Keccak256};
use std::fmt;

pub const SEED_LEN: usize = 32;

/// Secret per-round seed. Not serializable and redacted in `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct ServerSeed([u8; SEED_LEN]);

impl ServerSeed {
    /// 32 bytes from the OS CSPRNG
    pub fn generate() -> Self {
        let mut bytes = [0u8; SEED_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; SEED_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse a revealed seed, with or without `0x` prefix
    pub fn from_hex(text: &str) -> Option<Self> {
        let raw = hex::decode(text.strip_prefix("0x").unwrap_or(text)).ok()?;
        let bytes: [u8; SEED_LEN] = raw.try_into().ok()?;
        Some(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; SEED_LEN] {
        &self.0
    }

    /// Lowercase hex without prefix; this is the text the resolver hashes
    pub fn reveal_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// `0x`-prefixed bytes32 form taken by the ledger's settle call
    pub fn reveal_bytes32(&self) -> String {
        format!("0x{}", self.reveal_hex())
    }

    pub fn commitment(&self) -> Commitment {
        commit(self)
    }
}

impl fmt::Debug for ServerSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServerSeed(<redacted>)")
    }
}

/// Published one-way commitment to a [`ServerSeed`]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Commitment([u8; 32]);

impl Commitment {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn from_hex(text: &str) -> Option<Self> {
        let raw = hex::decode(text.strip_prefix("0x").unwrap_or(text)).ok()?;
        let bytes: [u8; 32] = raw.try_into().ok()?;
        Some(Self(bytes))
    }
}

impl fmt::Debug for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Commitment({})", self.to_hex())
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Commitment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Commitment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Commitment::from_hex(&text)
            .ok_or_else(|| serde::de::Error::custom("commitment must be 32 bytes of hex"))
    }
}

pub fn generate_seed() -> ServerSeed {
    ServerSeed::generate()
}

pub fn commit(seed: &ServerSeed) -> Commitment {
    let mut hasher = Keccak256::new();
    hasher.update(seed.as_bytes());
    Commitment(hasher.finalize().into())
}

pub fn verify(seed: &ServerSeed, commitment: &Commitment) -> bool {
    commit(seed) == *commitment
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak_of_zero_bytes32() {
        // keccak256(bytes32(0)), as computed by the contract
        let seed = ServerSeed::from_bytes([0u8; 32]);
        assert_eq!(
            commit(&seed).to_hex(),
            "0x290decd9548b62a8d60345a988386fc84ba6bc95484008f6362f93160ef3e563"
        );
    }

    #[test]
    fn test_commitment_round_trip_on_reveal() {
        for _ in 0..16 {
            let seed = generate_seed();
            let published = seed.commitment();
            let revealed = ServerSeed::from_hex(&seed.reveal_bytes32()).unwrap();
            assert!(verify(&revealed, &published));
        }
    }

    #[test]
    fn test_tampered_seed_fails_verification() {
        let seed = ServerSeed::from_bytes([7u8; 32]);
        let published = seed.commitment();
        let mut bytes = *seed.as_bytes();
        bytes[31] ^= 1;
        assert!(!verify(&ServerSeed::from_bytes(bytes), &published));
    }

    #[test]
    fn test_seed_debug_is_redacted() {
        let seed = ServerSeed::from_bytes([0xab; 32]);
        assert!(!format!("{:?}", seed).contains("abab"));
        assert_eq!(seed.reveal_hex().len(), 64);
        assert!(seed.reveal_bytes32().starts_with("0x"));
    }

    #[test]
    fn test_commitment_serde() {
        let c = ServerSeed::from_bytes([1u8; 32]).commitment();
        let json = serde_json::to_string(&c).unwrap();
        let back: Commitment = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
    }
}
