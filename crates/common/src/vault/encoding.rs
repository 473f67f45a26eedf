use std::fmt::{self, Display};
use std::str::FromStr;

use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::error::VaultError;

/// How file contents cross the API boundary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// Text; invalid UTF-8 is replaced when reading
    #[default]
    Utf8,
    Hex,
    Base64,
    /// Raw bytes, no text conversion
    Binary,
}

impl FromStr for Encoding {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "utf8" | "utf-8" => Ok(Encoding::Utf8),
            "hex" => Ok(Encoding::Hex),
            "base64" => Ok(Encoding::Base64),
            "binary" | "buffer" => Ok(Encoding::Binary),
            other => Err(VaultError::InvalidEncoding(other.to_string())),
        }
    }
}

impl Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Encoding::Utf8 => "utf8",
            Encoding::Hex => "hex",
            Encoding::Base64 => "base64",
            Encoding::Binary => "binary",
        };
        write!(f, "{}", name)
    }
}

/// File contents as read from, or handed to, a vault
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Contents {
    Text(String),
    Binary(Bytes),
}

impl Contents {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Contents::Text(text) => Some(text),
            Contents::Binary(_) => None,
        }
    }

    /// The raw bytes, for text this is the UTF-8 representation
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Contents::Text(text) => text.as_bytes(),
            Contents::Binary(bytes) => bytes,
        }
    }
}

impl From<&str> for Contents {
    fn from(text: &str) -> Self {
        Contents::Text(text.to_string())
    }
}

impl From<String> for Contents {
    fn from(text: String) -> Self {
        Contents::Text(text)
    }
}

impl From<Bytes> for Contents {
    fn from(bytes: Bytes) -> Self {
        Contents::Binary(bytes)
    }
}

impl From<Vec<u8>> for Contents {
    fn from(bytes: Vec<u8>) -> Self {
        Contents::Binary(Bytes::from(bytes))
    }
}

impl From<&[u8]> for Contents {
    fn from(bytes: &[u8]) -> Self {
        Contents::Binary(Bytes::copy_from_slice(bytes))
    }
}

impl Encoding {
    /// Turn stored bytes into caller facing contents
    pub fn encode(&self, bytes: Bytes) -> Contents {
        match self {
            Encoding::Utf8 => Contents::Text(String::from_utf8_lossy(&bytes).into_owned()),
            Encoding::Hex => Contents::Text(hex::encode(&bytes)),
            Encoding::Base64 => {
                Contents::Text(base64::engine::general_purpose::STANDARD.encode(&bytes))
            }
            Encoding::Binary => Contents::Binary(bytes),
        }
    }

    /// Turn caller supplied contents into the bytes to store
    ///
    /// Binary contents are stored as-is whatever the encoding; text is
    ///  interpreted according to the encoding.
    pub fn decode(&self, contents: Contents) -> Result<Bytes, VaultError> {
        let text = match contents {
            Contents::Binary(bytes) => return Ok(bytes),
            Contents::Text(text) => text,
        };
        match self {
            Encoding::Utf8 | Encoding::Binary => Ok(Bytes::from(text.into_bytes())),
            Encoding::Hex => hex::decode(text.trim())
                .map(Bytes::from)
                .map_err(|e| VaultError::InvalidEncoding(format!("bad hex: {}", e))),
            Encoding::Base64 => base64::engine::general_purpose::STANDARD
                .decode(text.trim())
                .map(Bytes::from)
                .map_err(|e| VaultError::InvalidEncoding(format!("bad base64: {}", e))),
        }
    }
}
