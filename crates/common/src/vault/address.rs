use std::fmt::{self, Display};
use std::str::FromStr;

use url::Url;

use crate::crypto::PublicKey;

use super::error::VaultError;

pub const VAULT_SCHEME: &str = "dweb";

/// A vault's public key, optionally pinned to a version
///
/// Rendered as `dweb://<hex key>` or `dweb://<hex key>+<version>`. Parsing
///  also accepts a bare hex key, with or without a version suffix, and
///  ignores any trailing path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VaultAddress {
    pub key: PublicKey,
    pub version: Option<u64>,
}

impl VaultAddress {
    pub fn new(key: PublicKey) -> Self {
        Self { key, version: None }
    }

    pub fn at_version(key: PublicKey, version: u64) -> Self {
        Self {
            key,
            version: Some(version),
        }
    }

    /// The unversioned url for this vault
    pub fn url(&self) -> String {
        format!("{}://{}", VAULT_SCHEME, self.key.to_hex())
    }

    fn parse_host(host: &str, original: &str) -> Result<Self, VaultError> {
        let (key, version) = match host.split_once('+') {
            Some((key, version)) => (key, Some(version)),
            None => (host, None),
        };
        let key = PublicKey::from_hex(key)
            .map_err(|_| VaultError::InvalidAddress(format!("{}: bad public key", original)))?;
        let version = version
            .map(|v| {
                v.parse::<u64>().map_err(|_| {
                    VaultError::InvalidAddress(format!("{}: bad version '{}'", original, v))
                })
            })
            .transpose()?;
        Ok(Self { key, version })
    }
}

impl FromStr for VaultAddress {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if !s.contains("://") {
            let host = s.split('/').next().unwrap_or(s);
            return Self::parse_host(host, s);
        }

        let url = Url::parse(s).map_err(|e| VaultError::InvalidAddress(format!("{}: {}", s, e)))?;
        if url.scheme() != VAULT_SCHEME {
            return Err(VaultError::InvalidAddress(format!(
                "{}: expected {}:// scheme",
                s, VAULT_SCHEME
            )));
        }
        let host = url
            .host_str()
            .ok_or_else(|| VaultError::InvalidAddress(format!("{}: missing key", s)))?;
        Self::parse_host(host, s)
    }
}

impl Display for VaultAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.version {
            Some(version) => write!(f, "{}+{}", self.url(), version),
            None => write!(f, "{}", self.url()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::SecretKey;

    fn key() -> PublicKey {
        SecretKey::generate().unwrap().public()
    }

    #[test]
    fn test_parse_url_forms() {
        let key = key();
        let hex = key.to_hex();

        let plain: VaultAddress = format!("dweb://{}", hex).parse().unwrap();
        assert_eq!(plain, VaultAddress::new(key));

        let versioned: VaultAddress = format!("dweb://{}+2/some/path", hex).parse().unwrap();
        assert_eq!(versioned, VaultAddress::at_version(key, 2));

        let bare: VaultAddress = format!("{}+7", hex).parse().unwrap();
        assert_eq!(bare.version, Some(7));
        assert_eq!(bare.to_string(), format!("dweb://{}+7", hex));
    }

    #[test]
    fn test_rejects_bad_addresses() {
        let hex = key().to_hex();
        for bad in [
            "dweb://nothex".to_string(),
            format!("http://{}", hex),
            format!("dweb://{}+-1", hex),
            format!("dweb://{}+x", hex),
            String::new(),
        ] {
            assert!(
                matches!(bad.parse::<VaultAddress>(), Err(VaultError::InvalidAddress(_))),
                "{} should be rejected",
                bad
            );
        }
    }
}
