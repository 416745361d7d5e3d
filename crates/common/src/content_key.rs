//! Fixed-length content hashes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::CONTENT_KEY_LEN;
use crate::error::KeyError;

/// A 16-byte content hash.
///
/// Used both as the content key (identity before encoding) and as the
/// encoded key (identity of the stored artifact). The textual form is
/// 32 lowercase hex characters; parsing accepts either case.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentKey([u8; CONTENT_KEY_LEN]);

impl ContentKey {
    /// Wrap raw key bytes.
    pub const fn new(bytes: [u8; CONTENT_KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Build a key from a byte slice.
    ///
    /// # Arguments
    /// * `bytes` - Exactly 16 bytes
    ///
    /// # Errors
    /// Returns `KeyError::InvalidLength` for any other length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyError> {
        let array: [u8; CONTENT_KEY_LEN] =
            bytes.try_into().map_err(|_| KeyError::InvalidLength {
                expected: CONTENT_KEY_LEN,
                actual: bytes.len(),
            })?;
        Ok(Self(array))
    }

    /// Parse a key from its 32-character hex form.
    ///
    /// # Errors
    /// Returns error if the input is not hex or does not decode to 16 bytes.
    pub fn from_hex(text: &str) -> Result<Self, KeyError> {
        let bytes: Vec<u8> =
            hex::decode(text.trim()).map_err(|e| KeyError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; CONTENT_KEY_LEN] {
        &self.0
    }

    /// Lowercase hex form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Whether every byte is zero.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentKey({})", self.to_hex())
    }
}

impl FromStr for ContentKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl TryFrom<String> for ContentKey {
    type Error = KeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<ContentKey> for String {
    fn from(key: ContentKey) -> Self {
        key.to_hex()
    }
}

impl From<[u8; CONTENT_KEY_LEN]> for ContentKey {
    fn from(bytes: [u8; CONTENT_KEY_LEN]) -> Self {
        Self(bytes)
    }
}
