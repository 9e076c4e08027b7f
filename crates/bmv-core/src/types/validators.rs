use super::{Address, Context, DecodeError};
use crate::codec::Item;
use crate::hash::sha3_256;
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// The validator set that signs source-chain blocks.
///
/// Addresses keep their wire order with duplicates removed. The set hash is
/// taken over the exact bytes the set was decoded from, so it can be compared
/// with a header's `next_validators_hash`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validators {
    raw: Vec<u8>,
    hash: [u8; 32],
    addresses: Vec<Address>,
}

/// Operator view of a validator set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorsInfo {
    pub hash: String,
    pub addresses: Vec<Address>,
}

impl Validators {
    /// Decode an encoded list of account identifiers.
    pub fn from_bytes(raw: &[u8]) -> Result<Self, DecodeError> {
        let item = Item::decode(raw).context("validators")?;
        let mut addresses: Vec<Address> = Vec::new();
        for entry in item.as_list().context("validators")? {
            let bytes = entry.as_bytes().context("validator address")?;
            let address = Address::from_bytes(bytes).context("validator address")?;
            if !addresses.contains(&address) {
                addresses.push(address);
            }
        }
        Ok(Validators {
            raw: raw.to_vec(),
            hash: sha3_256(raw),
            addresses,
        })
    }

    /// Encode a set from addresses, dropping repeats.
    pub fn from_addresses(addresses: &[Address]) -> Self {
        let mut unique: Vec<Address> = Vec::with_capacity(addresses.len());
        for address in addresses {
            if !unique.contains(address) {
                unique.push(*address);
            }
        }
        let raw = Item::list(
            unique
                .iter()
                .map(|a| Item::bytes(a.as_bytes().to_vec()))
                .collect(),
        )
        .encode();
        Validators {
            hash: sha3_256(&raw),
            raw,
            addresses: unique,
        }
    }

    /// Parse the install-time form: a comma-separated `hx…` list, or a single
    /// base64url string holding the encoded list.
    pub fn from_string(s: &str) -> Result<Self, DecodeError> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if s.trim().is_empty() {
            return Err(DecodeError::EmptyValidators);
        }

        let mut addresses = Vec::with_capacity(parts.len());
        for part in &parts {
            match part.parse::<Address>() {
                Ok(address) => addresses.push(address),
                Err(_) if parts.len() == 1 => {
                    let raw = URL_SAFE
                        .decode(part)
                        .map_err(|e| DecodeError::Base64(e.to_string()))?;
                    return Self::from_bytes(&raw);
                }
                Err(source) => {
                    return Err(DecodeError::Address {
                        context: "validator list",
                        source,
                    })
                }
            }
        }
        Ok(Self::from_addresses(&addresses))
    }

    pub fn hash(&self) -> &[u8; 32] {
        &self.hash
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.addresses.contains(address)
    }

    pub fn addresses(&self) -> &[Address] {
        &self.addresses
    }

    pub fn to_bytes(&self) -> &[u8] {
        &self.raw
    }

    pub fn info(&self) -> ValidatorsInfo {
        ValidatorsInfo {
            hash: hex::encode(self.hash),
            addresses: self.addresses.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        Address::from_bytes(&[n; 20]).unwrap()
    }

    #[test]
    fn test_from_addresses_dedups_in_order() {
        let set = Validators::from_addresses(&[addr(1), addr(2), addr(1), addr(3)]);
        assert_eq!(set.addresses(), &[addr(1), addr(2), addr(3)]);
        assert_eq!(set.len(), 3);
        assert!(set.contains(&addr(2)));
        assert!(!set.contains(&addr(4)));
    }

    #[test]
    fn test_hash_covers_raw_bytes() {
        let set = Validators::from_addresses(&[addr(1), addr(2)]);
        assert_eq!(set.hash(), &sha3_256(set.to_bytes()));

        let decoded = Validators::from_bytes(set.to_bytes()).unwrap();
        assert_eq!(decoded, set);

        let reordered = Validators::from_addresses(&[addr(2), addr(1)]);
        assert_ne!(reordered.hash(), set.hash());
    }

    #[test]
    fn test_from_string_address_list() {
        let list = format!("{}, {}", addr(7), addr(8));
        let set = Validators::from_string(&list).unwrap();
        assert_eq!(set.addresses(), &[addr(7), addr(8)]);
    }

    #[test]
    fn test_from_string_base64_fallback() {
        let set = Validators::from_addresses(&[addr(1), addr(2), addr(3)]);
        let encoded = URL_SAFE.encode(set.to_bytes());
        let decoded = Validators::from_string(&encoded).unwrap();
        assert_eq!(decoded, set);
    }

    #[test]
    fn test_from_string_rejects_bad_entries() {
        let list = format!("{},hxnotanaddress", addr(1));
        assert!(matches!(
            Validators::from_string(&list),
            Err(DecodeError::Address { .. })
        ));
        assert!(matches!(
            Validators::from_string(""),
            Err(DecodeError::EmptyValidators)
        ));
        assert!(matches!(
            Validators::from_string("!!!"),
            Err(DecodeError::Base64(_))
        ));
    }

    #[test]
    fn test_from_bytes_rejects_bad_address() {
        let raw = Item::list(vec![Item::bytes(vec![0x05; 21])]).encode();
        assert!(matches!(
            Validators::from_bytes(&raw),
            Err(DecodeError::Address { .. })
        ));
    }

    #[test]
    fn test_info_renders_hex_hash() {
        let set = Validators::from_addresses(&[addr(9)]);
        let info = set.info();
        assert_eq!(info.hash, hex::encode(set.hash()));
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["addresses"][0], addr(9).to_string());
    }
}
