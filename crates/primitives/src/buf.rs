use std::{fmt, ops::Deref};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Opaque byte sequence that (de)serializes as a hex string.
///
/// Used for commit hashes, transaction hashes and payloads, whose structure
/// is owned by the chain service and never interpreted here.
#[derive(Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct HexBytes(pub Vec<u8>);

impl HexBytes {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }
}

impl Deref for HexBytes {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<u8>> for HexBytes {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

impl From<&[u8]> for HexBytes {
    fn from(value: &[u8]) -> Self {
        Self(value.to_vec())
    }
}

impl<const N: usize> From<[u8; N]> for HexBytes {
    fn from(value: [u8; N]) -> Self {
        Self(value.to_vec())
    }
}

impl fmt::Display for HexBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0))
    }
}

impl fmt::Debug for HexBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Payloads can be large, only show a prefix of them.
        const MAX_DEBUG_BYTES: usize = 32;
        if self.0.len() > MAX_DEBUG_BYTES {
            write!(
                f,
                "0x{}..({} bytes)",
                hex::encode(&self.0[..MAX_DEBUG_BYTES]),
                self.0.len()
            )
        } else {
            write!(f, "0x{}", hex::encode(&self.0))
        }
    }
}

impl Serialize for HexBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(&self.0)))
    }
}

impl<'de> Deserialize<'de> for HexBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let s = s.strip_prefix("0x").unwrap_or(&s);
        hex::decode(s).map(Self).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_serde_accepts_both_prefixes() {
        let with: HexBytes = serde_json::from_str("\"0xdeadbeef\"").unwrap();
        let without: HexBytes = serde_json::from_str("\"deadbeef\"").unwrap();
        assert_eq!(with, without);
        assert_eq!(with.as_slice(), &[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(serde_json::to_string(&with).unwrap(), "\"0xdeadbeef\"");
    }

    #[test]
    fn test_debug_truncates_long_payloads() {
        let buf = HexBytes::new(vec![0xab; 100]);
        let dbg = format!("{buf:?}");
        assert!(dbg.ends_with("..(100 bytes)"));
        assert_eq!(format!("{}", HexBytes::from([1u8, 2])), "0x0102");
    }

    #[test]
    fn test_rejects_bad_hex() {
        assert!(serde_json::from_str::<HexBytes>("\"0xzz\"").is_err());
    }
}
