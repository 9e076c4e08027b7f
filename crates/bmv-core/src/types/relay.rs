use super::{BlockProof, BlockUpdate, Context, DecodeError, ReceiptProof};
use crate::codec::Item;

/// The evidence bundle submitted by a relayer in one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayMessage {
    pub block_updates: Vec<BlockUpdate>,
    pub block_proof: Option<BlockProof>,
    pub receipt_proofs: Vec<ReceiptProof>,
}

impl RelayMessage {
    pub fn from_bytes(raw: &[u8]) -> Result<Self, DecodeError> {
        let item = Item::decode(raw).context("relay message")?;
        let f = item.as_record(3).context("relay message")?;

        let mut block_updates = Vec::new();
        for update in f[0].as_list().context("block updates")? {
            block_updates.push(BlockUpdate::from_bytes(update.as_bytes().context("block update")?)?);
        }

        let block_proof = match f[1].as_optional_bytes().context("block proof")? {
            Some(nested) => Some(BlockProof::from_bytes(nested)?),
            None => None,
        };

        let mut receipt_proofs = Vec::new();
        for proof in f[2].as_list().context("receipt proofs")? {
            receipt_proofs.push(ReceiptProof::from_bytes(proof.as_bytes().context("receipt proof")?)?);
        }

        Ok(RelayMessage {
            block_updates,
            block_proof,
            receipt_proofs,
        })
    }

    /// No block update and no block proof: nothing to anchor receipts on.
    pub fn has_anchor(&self) -> bool {
        !self.block_updates.is_empty() || self.block_proof.is_some()
    }
}
