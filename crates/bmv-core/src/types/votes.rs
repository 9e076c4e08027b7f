use super::{Context, DecodeError};
use crate::codec::Item;

/// Identifier of the block part set a vote refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartSetId {
    pub count: i64,
    pub hash: Vec<u8>,
}

impl PartSetId {
    pub fn to_item(&self) -> Item {
        Item::list(vec![
            Item::int(self.count as i128),
            Item::bytes(self.hash.clone()),
        ])
    }
}

/// One validator's precommit: its own timestamp and a 65-byte recoverable
/// signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteItem {
    pub timestamp: i64,
    pub signature: Vec<u8>,
}

/// Precommit votes for one block: `[round, [count, hash], [[timestamp, signature]…]]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Votes {
    pub round: i64,
    pub part_set_id: PartSetId,
    pub items: Vec<VoteItem>,
}

impl Votes {
    pub fn from_bytes(raw: &[u8]) -> Result<Self, DecodeError> {
        let item = Item::decode(raw).context("votes")?;
        let fields = item.as_record(3).context("votes")?;

        let round = fields[0].as_i64().context("votes round")?;
        let part = fields[1].as_record(2).context("votes part set id")?;
        let part_set_id = PartSetId {
            count: part[0].as_i64().context("votes part set id")?,
            hash: part[1].as_bytes().context("votes part set id")?.to_vec(),
        };

        let mut items = Vec::new();
        for entry in fields[2].as_list().context("vote items")? {
            let entry = entry.as_record(2).context("vote item")?;
            items.push(VoteItem {
                timestamp: entry[0].as_i64().context("vote timestamp")?,
                signature: entry[1].as_bytes().context("vote signature")?.to_vec(),
            });
        }

        Ok(Votes {
            round,
            part_set_id,
            items,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let items = self
            .items
            .iter()
            .map(|v| {
                Item::list(vec![
                    Item::int(v.timestamp as i128),
                    Item::bytes(v.signature.clone()),
                ])
            })
            .collect();
        Item::list(vec![
            Item::int(self.round as i128),
            self.part_set_id.to_item(),
            Item::list(items),
        ])
        .encode()
    }
}
