use crate::hash::sha3_256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors parsing account identifiers and BTP addresses.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("Invalid address length: expected 20 or 21 bytes, got {0}")]
    InvalidLength(usize),

    #[error("Invalid address kind prefix 0x{0:02x}")]
    InvalidPrefix(u8),

    #[error("Invalid address string {0:?}: expected hx/cx followed by 40 hex characters")]
    InvalidFormat(String),

    #[error("Invalid public key: expected 65-byte uncompressed key, got {0} bytes")]
    InvalidPublicKey(usize),

    #[error("Invalid BTP address {0:?}: expected btp://<network>/<contract>")]
    InvalidBtpAddress(String),
}

/// A 21-byte account identifier on the source chain.
///
/// The first byte is the account kind (0x00 externally owned, 0x01 contract)
/// and the remaining 20 bytes are the body. Rendered as `hx…` or `cx…`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; 21]);

impl Address {
    pub const LEN: usize = 21;
    const EOA: u8 = 0x00;
    const CONTRACT: u8 = 0x01;

    /// Parse raw identifier bytes. A bare 20-byte body is taken as an EOA.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AddressError> {
        let mut out = [0u8; 21];
        match bytes.len() {
            20 => out[1..].copy_from_slice(bytes),
            21 => {
                if bytes[0] != Self::EOA && bytes[0] != Self::CONTRACT {
                    return Err(AddressError::InvalidPrefix(bytes[0]));
                }
                out.copy_from_slice(bytes);
            }
            n => return Err(AddressError::InvalidLength(n)),
        }
        Ok(Address(out))
    }

    /// EOA identifier for a secp256k1 public key in uncompressed SEC1 form.
    pub fn from_public_key(uncompressed: &[u8]) -> Result<Self, AddressError> {
        if uncompressed.len() != 65 {
            return Err(AddressError::InvalidPublicKey(uncompressed.len()));
        }
        // Hash the 64-byte X||Y body, skipping the 0x04 tag
        let digest = sha3_256(&uncompressed[1..]);
        let mut out = [0u8; 21];
        out[1..].copy_from_slice(&digest[12..]);
        Ok(Address(out))
    }

    pub fn contract(body: [u8; 20]) -> Self {
        let mut out = [Self::CONTRACT; 21];
        out[1..].copy_from_slice(&body);
        Address(out)
    }

    pub fn is_contract(&self) -> bool {
        self.0[0] == Self::CONTRACT
    }

    pub fn as_bytes(&self) -> &[u8; 21] {
        &self.0
    }

    pub fn body(&self) -> &[u8] {
        &self.0[1..]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = if self.is_contract() { "cx" } else { "hx" };
        write!(f, "{}{}", prefix, hex::encode(self.body()))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AddressError::InvalidFormat(s.to_string());
        let (kind, body_hex) = match s.get(..2) {
            Some("hx") => (Self::EOA, &s[2..]),
            Some("cx") => (Self::CONTRACT, &s[2..]),
            _ => return Err(invalid()),
        };
        if body_hex.len() != 40 {
            return Err(invalid());
        }
        let body = hex::decode(body_hex).map_err(|_| invalid())?;
        let mut out = [kind; 21];
        out[1..].copy_from_slice(&body);
        Ok(Address(out))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A BTP endpoint: `btp://<network>/<contract>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BtpAddress {
    net: String,
    contract: String,
}

impl BtpAddress {
    const SCHEME: &'static str = "btp://";

    pub fn new(net: impl Into<String>, contract: impl Into<String>) -> Self {
        BtpAddress {
            net: net.into(),
            contract: contract.into(),
        }
    }

    /// Network id, e.g. `0x1.icon`.
    pub fn net(&self) -> &str {
        &self.net
    }

    /// Contract identifier in the network's own notation.
    pub fn contract(&self) -> &str {
        &self.contract
    }
}

impl FromStr for BtpAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AddressError::InvalidBtpAddress(s.to_string());
        let rest = s.strip_prefix(Self::SCHEME).ok_or_else(invalid)?;
        let (net, contract) = rest.split_once('/').ok_or_else(invalid)?;
        if net.is_empty() || contract.is_empty() || contract.contains('/') {
            return Err(invalid());
        }
        Ok(BtpAddress::new(net, contract))
    }
}

impl fmt::Display for BtpAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}/{}", Self::SCHEME, self.net, self.contract)
    }
}
