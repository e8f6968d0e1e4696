//! Link-layer peer address.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const ADDRESS_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressParseError {
    #[error("expected 6 colon separated octets, got {0}")]
    OctetCount(usize),
    #[error("invalid octet {0:?}")]
    InvalidOctet(String),
}

/// Stable identifier of a remote device (`AA:BB:CC:DD:EE:FF`).
///
/// Ordered so registries can keep their entries in a deterministic order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeerAddress([u8; ADDRESS_LEN]);

impl PeerAddress {
    pub const fn new(octets: [u8; ADDRESS_LEN]) -> Self {
        Self(octets)
    }

    pub const fn octets(&self) -> [u8; ADDRESS_LEN] {
        self.0
    }
}

impl From<[u8; ADDRESS_LEN]> for PeerAddress {
    fn from(octets: [u8; ADDRESS_LEN]) -> Self {
        Self(octets)
    }
}

impl FromStr for PeerAddress {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != ADDRESS_LEN {
            return Err(AddressParseError::OctetCount(parts.len()));
        }

        let mut octets = [0u8; ADDRESS_LEN];
        for (octet, part) in octets.iter_mut().zip(parts) {
            if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(AddressParseError::InvalidOctet(part.to_string()));
            }
            *octet = u8::from_str_radix(part, 16)
                .map_err(|_| AddressParseError::InvalidOctet(part.to_string()))?;
        }

        Ok(Self(octets))
    }
}

impl TryFrom<String> for PeerAddress {
    type Error = AddressParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PeerAddress> for String {
    fn from(address: PeerAddress) -> Self {
        address.to_string()
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

impl fmt::Debug for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerAddress({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let address: PeerAddress = "00:1a:7D:da:71:0F".parse().unwrap();
        assert_eq!(address.octets(), [0x00, 0x1a, 0x7d, 0xda, 0x71, 0x0f]);
        assert_eq!(address.to_string(), "00:1A:7D:DA:71:0F");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(
            "00:11:22:33:44".parse::<PeerAddress>(),
            Err(AddressParseError::OctetCount(5))
        );
        assert_eq!(
            "00:11:22:33:44:5".parse::<PeerAddress>(),
            Err(AddressParseError::InvalidOctet("5".to_string()))
        );
        assert_eq!(
            "00:11:22:33:44:ZZ".parse::<PeerAddress>(),
            Err(AddressParseError::InvalidOctet("ZZ".to_string()))
        );
    }

    #[test]
    fn test_serde_uses_text_form() {
        let address = PeerAddress::new([1, 2, 3, 4, 5, 6]);
        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(json, "\"01:02:03:04:05:06\"");

        let parsed: PeerAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, address);
        assert!(serde_json::from_str::<PeerAddress>("\"nope\"").is_err());
    }

    #[test]
    fn test_ordering_follows_octets() {
        let low = PeerAddress::new([0, 0, 0, 0, 0, 1]);
        let high = PeerAddress::new([0, 0, 0, 0, 1, 0]);
        assert!(low < high);
    }
}
