use super::{Context, DecodeError, Validators, Votes};
use crate::codec::{to_hash, Item};
use crate::hash::sha3_256;

/// A source-chain block header.
///
/// Only the fields the verifier relies on are typed; the rest are kept as
/// raw bytes. The header hash is taken over the exact bytes it was decoded
/// from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    raw: Vec<u8>,
    hash: [u8; 32],
    pub version: i64,
    pub height: u64,
    pub timestamp: i64,
    pub proposer: Vec<u8>,
    pub prev_hash: Vec<u8>,
    pub vote_hash: Vec<u8>,
    pub next_validators_hash: Vec<u8>,
    pub patch_tx_hash: Vec<u8>,
    pub tx_hash: Vec<u8>,
    pub logs_bloom: Vec<u8>,
    /// Execution result of the previous block, absent on headers that carry none.
    pub result: Option<BlockResult>,
}

/// `[state_hash, patch_receipt_hash, receipt_hash]`, nested in the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockResult {
    pub state_hash: Vec<u8>,
    pub patch_receipt_hash: Vec<u8>,
    pub receipt_hash: Option<[u8; 32]>,
}

impl BlockHeader {
    const FIELDS: usize = 11;

    pub fn from_bytes(raw: &[u8]) -> Result<Self, DecodeError> {
        if raw.is_empty() {
            return Err(DecodeError::Missing("block header"));
        }
        let item = Item::decode(raw).context("block header")?;
        let f = item.as_record(Self::FIELDS).context("block header")?;
        let bytes = |i: usize| -> Result<Vec<u8>, DecodeError> {
            Ok(f[i].as_bytes().context("block header")?.to_vec())
        };

        let result = match f[10].as_optional_bytes().context("block result")? {
            None => None,
            Some(nested) => {
                let result = Item::decode(nested).context("block result")?;
                let r = result.as_record(3).context("block result")?;
                let receipt_hash = match r[2].as_optional_bytes().context("receipt hash")? {
                    Some(hash) => Some(to_hash(hash).context("receipt hash")?),
                    None => None,
                };
                Some(BlockResult {
                    state_hash: r[0].as_bytes().context("state hash")?.to_vec(),
                    patch_receipt_hash: r[1].as_bytes().context("patch receipt hash")?.to_vec(),
                    receipt_hash,
                })
            }
        };

        Ok(BlockHeader {
            raw: raw.to_vec(),
            hash: sha3_256(raw),
            version: f[0].as_i64().context("header version")?,
            height: f[1].as_u64().context("header height")?,
            timestamp: f[2].as_i64().context("header timestamp")?,
            proposer: bytes(3)?,
            prev_hash: bytes(4)?,
            vote_hash: bytes(5)?,
            next_validators_hash: bytes(6)?,
            patch_tx_hash: bytes(7)?,
            tx_hash: bytes(8)?,
            logs_bloom: bytes(9)?,
            result,
        })
    }

    pub fn hash(&self) -> &[u8; 32] {
        &self.hash
    }

    pub fn to_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Root of the receipt trie, if the header commits to one.
    pub fn receipt_hash(&self) -> Option<[u8; 32]> {
        self.result.as_ref().and_then(|r| r.receipt_hash)
    }
}

/// One step of chain custody: a header, the votes that finalized it, and
/// the next validator set when it changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockUpdate {
    pub header: BlockHeader,
    pub votes: Option<Votes>,
    pub next_validators: Option<Validators>,
}

impl BlockUpdate {
    pub fn from_bytes(raw: &[u8]) -> Result<Self, DecodeError> {
        let item = Item::decode(raw).context("block update")?;
        let f = item.as_record(3).context("block update")?;

        let header = BlockHeader::from_bytes(f[0].as_bytes().context("block update header")?)?;
        let votes = match f[1].as_optional_bytes().context("block update votes")? {
            Some(nested) => Some(Votes::from_bytes(nested)?),
            None => None,
        };
        let next_validators = match f[2].as_optional_bytes().context("next validators")? {
            Some(nested) => Some(Validators::from_bytes(nested)?),
            None => None,
        };

        Ok(BlockUpdate {
            header,
            votes,
            next_validators,
        })
    }

    pub fn height(&self) -> u64 {
        self.header.height
    }
}

/// Accumulator witness for a single block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockWitness {
    /// Accumulator height when the witness was produced.
    pub height: u64,
    pub witness: Vec<[u8; 32]>,
}

/// Re-anchors on a past block through accumulator membership instead of votes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockProof {
    pub header: BlockHeader,
    pub witness: Option<BlockWitness>,
}

impl BlockProof {
    pub fn from_bytes(raw: &[u8]) -> Result<Self, DecodeError> {
        let item = Item::decode(raw).context("block proof")?;
        let f = item.as_record(2).context("block proof")?;

        let header = BlockHeader::from_bytes(f[0].as_bytes().context("block proof header")?)?;
        let witness = if f[1].is_null() {
            None
        } else {
            let w = f[1].as_record(2).context("block witness")?;
            let mut siblings = Vec::new();
            for sibling in w[1].as_list().context("block witness")? {
                siblings.push(sibling.as_hash().context("block witness")?);
            }
            Some(BlockWitness {
                height: w[0].as_u64().context("block witness height")?,
                witness: siblings,
            })
        };

        Ok(BlockProof { header, witness })
    }

    pub fn height(&self) -> u64 {
        self.header.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::HeaderBuilder;

    #[test]
    fn test_header_decode() {
        let raw = HeaderBuilder::new(42)
            .next_validators_hash([0x33; 32])
            .receipt_hash([0x44; 32])
            .build();
        let header = BlockHeader::from_bytes(&raw).unwrap();
        assert_eq!(header.height, 42);
        assert_eq!(header.next_validators_hash, vec![0x33; 32]);
        assert_eq!(header.receipt_hash(), Some([0x44; 32]));
        assert_eq!(header.hash(), &sha3_256(&raw));
        assert_eq!(header.to_bytes(), raw.as_slice());
    }

    #[test]
    fn test_header_without_result() {
        let raw = HeaderBuilder::new(1).build();
        let header = BlockHeader::from_bytes(&raw).unwrap();
        assert!(header.result.is_none());
        assert_eq!(header.receipt_hash(), None);
    }

    #[test]
    fn test_header_rejects_wrong_arity_and_empty() {
        let raw = Item::list(vec![Item::int(1); 10]).encode();
        assert!(matches!(
            BlockHeader::from_bytes(&raw),
            Err(DecodeError::Codec { context: "block header", .. })
        ));
        assert!(matches!(
            BlockHeader::from_bytes(&[]),
            Err(DecodeError::Missing("block header"))
        ));
    }

    #[test]
    fn test_block_update_optional_parts() {
        let header = HeaderBuilder::new(5).build();
        for absent in [Item::Null, Item::bytes(Vec::new())] {
            let raw = Item::list(vec![Item::bytes(header.clone()), absent.clone(), absent]).encode();
            let update = BlockUpdate::from_bytes(&raw).unwrap();
            assert_eq!(update.height(), 5);
            assert!(update.votes.is_none());
            assert!(update.next_validators.is_none());
        }
    }

    #[test]
    fn test_block_proof_decode() {
        let header = HeaderBuilder::new(9).build();
        let raw = Item::list(vec![
            Item::bytes(header.clone()),
            Item::list(vec![
                Item::uint(12),
                Item::list(vec![Item::bytes(vec![0x01; 32]), Item::bytes(vec![0x02; 32])]),
            ]),
        ])
        .encode();
        let proof = BlockProof::from_bytes(&raw).unwrap();
        assert_eq!(proof.height(), 9);
        let witness = proof.witness.unwrap();
        assert_eq!(witness.height, 12);
        assert_eq!(witness.witness, vec![[0x01; 32], [0x02; 32]]);

        let raw = Item::list(vec![Item::bytes(header), Item::Null]).encode();
        assert!(BlockProof::from_bytes(&raw).unwrap().witness.is_none());
    }

    #[test]
    fn test_block_proof_rejects_short_sibling() {
        let header = HeaderBuilder::new(9).build();
        let raw = Item::list(vec![
            Item::bytes(header),
            Item::list(vec![Item::uint(9), Item::list(vec![Item::bytes(vec![0x01; 31])])]),
        ])
        .encode();
        assert!(matches!(
            BlockProof::from_bytes(&raw),
            Err(DecodeError::Codec { context: "block witness", .. })
        ));
    }
}
