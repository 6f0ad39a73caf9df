use std::{fmt, str::FromStr};

use ed25519_dalek::VerifyingKey;
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

pub type PostId = String;
/// Seconds since the Unix epoch, as reported by the host for each call.
pub type Timestamp = u64;

pub const ADDRESS_LEN: usize = 20;

/// Caller identity. Rendered as `0x`-prefixed lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    pub const ZERO: Address = Address([0u8; ADDRESS_LEN]);

    pub const fn from_bytes(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// Last 20 bytes of SHA-256 over the raw ed25519 public key.
    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        let digest: [u8; 32] = Sha256::digest(key.as_bytes()).into();
        let mut out = [0u8; ADDRESS_LEN];
        out.copy_from_slice(&digest[32 - ADDRESS_LEN..]);
        Self(out)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_LEN]
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AddressParseError {
    #[error("address must be {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },
    #[error("address is not valid hex: {0}")]
    Hex(String),
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let body = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        let bytes = hex::decode(body).map_err(|e| AddressParseError::Hex(e.to_string()))?;
        if bytes.len() != ADDRESS_LEN {
            return Err(AddressParseError::Length {
                expected: ADDRESS_LEN,
                actual: bytes.len(),
            });
        }
        let mut out = [0u8; ADDRESS_LEN];
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        encoded.parse().map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;

    #[test]
    fn display_and_parse_agree() {
        let addr = Address::from_bytes([0xab; ADDRESS_LEN]);
        let text = addr.to_string();
        assert!(text.starts_with("0x"));
        assert_eq!(text.len(), 2 + 2 * ADDRESS_LEN);
        assert_eq!(text.parse::<Address>().unwrap(), addr);
        assert_eq!(text.trim_start_matches("0x").parse::<Address>().unwrap(), addr);
    }

    #[test]
    fn rejects_wrong_length_and_bad_hex() {
        assert_eq!(
            "0x1234".parse::<Address>().unwrap_err(),
            AddressParseError::Length {
                expected: ADDRESS_LEN,
                actual: 2
            }
        );
        assert!(matches!(
            "0xzz".parse::<Address>().unwrap_err(),
            AddressParseError::Hex(_)
        ));
    }

    #[test]
    fn derived_address_is_stable_per_key() {
        let sk = SigningKey::generate(&mut OsRng);
        let pk = sk.verifying_key();
        let a = Address::from_verifying_key(&pk);
        let b = Address::from_verifying_key(&pk);
        assert_eq!(a, b);
        assert!(!a.is_zero());

        let other = SigningKey::generate(&mut OsRng).verifying_key();
        assert_ne!(a, Address::from_verifying_key(&other));
    }

    #[test]
    fn serde_uses_hex_string() {
        let addr = Address::from_bytes([1u8; ADDRESS_LEN]);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{addr}\""));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }
}
