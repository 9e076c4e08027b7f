use super::{Address, Context, DecodeError};
use crate::codec::{to_hash, Item};

/// A raw event log as stored in a receipt: emitter, indexed fields (the
/// first is the signature) and non-indexed data fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventLog {
    pub address: Address,
    pub indexed: Vec<Vec<u8>>,
    pub data: Vec<Vec<u8>>,
}

impl EventLog {
    pub fn from_bytes(raw: &[u8]) -> Result<Self, DecodeError> {
        let item = Item::decode(raw).context("event log")?;
        Self::from_item(&item)
    }

    pub fn from_item(item: &Item) -> Result<Self, DecodeError> {
        let f = item.as_record(3).context("event log")?;
        let address = Address::from_bytes(f[0].as_bytes().context("event log address")?)
            .context("event log address")?;
        Ok(EventLog {
            address,
            indexed: byte_fields(&f[1], "event log indexed")?,
            data: byte_fields(&f[2], "event log data")?,
        })
    }

    pub fn to_item(&self) -> Item {
        let to_list = |fields: &[Vec<u8>]| Item::list(fields.iter().cloned().map(Item::Bytes).collect());
        Item::list(vec![
            Item::bytes(self.address.as_bytes().to_vec()),
            to_list(&self.indexed),
            to_list(&self.data),
        ])
    }
}

/// Null fields read as empty.
fn byte_fields(item: &Item, context: &'static str) -> Result<Vec<Vec<u8>>, DecodeError> {
    item.as_list()
        .context(context)?
        .iter()
        .map(|field| {
            Ok(field
                .as_optional_bytes()
                .context(context)?
                .map(<[u8]>::to_vec)
                .unwrap_or_default())
        })
        .collect()
}

/// A transaction receipt from the source chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub status: i64,
    pub to: Vec<u8>,
    pub cumulative_step_used: Vec<u8>,
    pub step_used: Vec<u8>,
    pub step_price: Vec<u8>,
    pub logs_bloom: Vec<u8>,
    pub event_logs: Vec<EventLog>,
    pub score_address: Vec<u8>,
    /// Root of the event-log trie.
    pub event_logs_hash: Option<[u8; 32]>,
}

impl Receipt {
    const FIELDS: usize = 9;

    pub fn from_bytes(raw: &[u8]) -> Result<Self, DecodeError> {
        let item = Item::decode(raw).context("receipt")?;
        let f = item.as_record(Self::FIELDS).context("receipt")?;
        let bytes = |i: usize| -> Result<Vec<u8>, DecodeError> {
            Ok(f[i]
                .as_optional_bytes()
                .context("receipt")?
                .map(<[u8]>::to_vec)
                .unwrap_or_default())
        };

        let mut event_logs = Vec::new();
        for log in f[6].as_list().context("receipt event logs")? {
            event_logs.push(EventLog::from_item(log)?);
        }
        let event_logs_hash = match f[8].as_optional_bytes().context("event logs hash")? {
            Some(hash) => Some(to_hash(hash).context("event logs hash")?),
            None => None,
        };

        Ok(Receipt {
            status: f[0].as_i64().context("receipt status")?,
            to: bytes(1)?,
            cumulative_step_used: bytes(2)?,
            step_used: bytes(3)?,
            step_price: bytes(4)?,
            logs_bloom: bytes(5)?,
            event_logs,
            score_address: bytes(7)?,
            event_logs_hash,
        })
    }
}

/// Trie proof for one event log inside a receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventProof {
    pub index: u64,
    pub proofs: Vec<Vec<u8>>,
}

/// Trie proof for one receipt, plus proofs for the event logs to extract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptProof {
    pub index: u64,
    pub proofs: Vec<Vec<u8>>,
    pub event_proofs: Vec<EventProof>,
}

/// Trie key for an index: its codec encoding.
pub fn trie_key(index: u64) -> Vec<u8> {
    Item::uint(index).encode()
}

fn nested_nodes(item: &Item, context: &'static str) -> Result<Vec<Vec<u8>>, DecodeError> {
    let nodes = item.as_nested().context(context)?;
    nodes
        .as_list()
        .context(context)?
        .iter()
        .map(|node| Ok(node.as_bytes().context(context)?.to_vec()))
        .collect()
}

impl EventProof {
    pub fn from_item(item: &Item) -> Result<Self, DecodeError> {
        let f = item.as_record(2).context("event proof")?;
        Ok(EventProof {
            index: f[0].as_u64().context("event proof index")?,
            proofs: nested_nodes(&f[1], "event proof nodes")?,
        })
    }

    pub fn key(&self) -> Vec<u8> {
        trie_key(self.index)
    }
}

impl ReceiptProof {
    pub fn from_bytes(raw: &[u8]) -> Result<Self, DecodeError> {
        let item = Item::decode(raw).context("receipt proof")?;
        let f = item.as_record(3).context("receipt proof")?;

        let mut event_proofs = Vec::new();
        for proof in f[2].as_list().context("event proofs")? {
            event_proofs.push(EventProof::from_item(proof)?);
        }

        Ok(ReceiptProof {
            index: f[0].as_u64().context("receipt proof index")?,
            proofs: nested_nodes(&f[1], "receipt proof nodes")?,
            event_proofs,
        })
    }

    pub fn key(&self) -> Vec<u8> {
        trie_key(self.index)
    }
}
