//! Fixture builders shared by the unit tests: deterministic validator keys,
//! signed votes, block headers, receipt tries and relay messages.

use crate::codec::{int_to_bytes, Item};
use crate::consensus::vote_message;
use crate::hash::sha3_256;
use crate::types::{trie_key, Address, EventLog, PartSetId, Validators, VoteItem, Votes};
use k256::ecdsa::SigningKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use std::collections::BTreeMap;

pub fn validator_keys(n: usize) -> Vec<SigningKey> {
    (0..n)
        .map(|i| SigningKey::from_slice(&[i as u8 + 1; 32]).unwrap())
        .collect()
}

pub fn key_address(key: &SigningKey) -> Address {
    let point = key.verifying_key().as_affine().to_encoded_point(false);
    Address::from_public_key(point.as_bytes()).unwrap()
}

pub fn validator_set(keys: &[SigningKey]) -> Validators {
    let addresses: Vec<Address> = keys.iter().map(key_address).collect();
    Validators::from_addresses(&addresses)
}

/// Precommits from every key for the block at `height` with `block_hash`.
pub fn sign_votes(keys: &[SigningKey], height: u64, block_hash: &[u8; 32]) -> Votes {
    let part_set_id = PartSetId {
        count: 1,
        hash: vec![0xAB; 32],
    };
    let items = keys
        .iter()
        .enumerate()
        .map(|(i, key)| {
            let timestamp = 1_000 + i as i64;
            let message = vote_message(height, 0, block_hash, &part_set_id, timestamp);
            let (signature, recovery_id) = key.sign_prehash_recoverable(&sha3_256(&message)).unwrap();
            let mut bytes = signature.to_bytes().to_vec();
            bytes.push(recovery_id.to_byte());
            VoteItem {
                timestamp,
                signature: bytes,
            }
        })
        .collect();
    Votes {
        round: 0,
        part_set_id,
        items,
    }
}

/// Builds encoded block headers.
pub struct HeaderBuilder {
    height: u64,
    next_validators_hash: Vec<u8>,
    receipt_hash: Option<[u8; 32]>,
}

impl HeaderBuilder {
    pub fn new(height: u64) -> Self {
        HeaderBuilder {
            height,
            next_validators_hash: Vec::new(),
            receipt_hash: None,
        }
    }

    pub fn next_validators_hash(mut self, hash: [u8; 32]) -> Self {
        self.next_validators_hash = hash.to_vec();
        self
    }

    pub fn receipt_hash(mut self, hash: [u8; 32]) -> Self {
        self.receipt_hash = Some(hash);
        self
    }

    pub fn build(self) -> Vec<u8> {
        let result = match self.receipt_hash {
            Some(hash) => Item::list(vec![
                Item::bytes(vec![0x5A; 32]),
                Item::bytes(Vec::new()),
                Item::bytes(hash.to_vec()),
            ])
            .encode(),
            None => Vec::new(),
        };
        Item::list(vec![
            Item::int(2),
            Item::uint(self.height),
            Item::int(1_600_000_000 + self.height as i128),
            Item::bytes(vec![0x00; 21]),
            Item::bytes(sha3_256(&self.height.to_be_bytes()).to_vec()),
            Item::bytes(Vec::new()),
            Item::bytes(self.next_validators_hash),
            Item::bytes(Vec::new()),
            Item::bytes(Vec::new()),
            Item::bytes(Vec::new()),
            Item::bytes(result),
        ])
        .encode()
    }
}

/// Hex-prefix encode a nibble path.
fn compact_path(nibbles: &[u8], leaf: bool) -> Vec<u8> {
    let flag = if leaf { 0x20 } else { 0x00 };
    let mut out = Vec::with_capacity(nibbles.len() / 2 + 1);
    let rest = if nibbles.len() % 2 == 1 {
        out.push(flag | 0x10 | nibbles[0]);
        &nibbles[1..]
    } else {
        out.push(flag);
        nibbles
    };
    for pair in rest.chunks(2) {
        out.push((pair[0] << 4) | pair[1]);
    }
    out
}

pub fn leaf_node(nibbles: &[u8], value: &[u8]) -> Vec<u8> {
    Item::list(vec![
        Item::bytes(compact_path(nibbles, true)),
        Item::bytes(value.to_vec()),
    ])
    .encode()
}

fn to_nibbles(bytes: &[u8]) -> Vec<u8> {
    bytes.iter().flat_map(|b| [b >> 4, b & 0x0F]).collect()
}

/// A trie keyed by encoded indexes. Every child is referenced by hash, so
/// each proof node is checked against its parent.
#[derive(Default)]
pub struct TrieBuilder {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl TrieBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, index: u64, value: Vec<u8>) {
        self.entries.insert(to_nibbles(&trie_key(index)), value);
    }

    pub fn root(&self) -> [u8; 32] {
        let entries: Vec<_> = self.entries.iter().collect();
        sha3_256(&build_node(&entries, 0, None, &mut Vec::new()))
    }

    /// Nodes on the path to `index`, top node first.
    pub fn proof(&self, index: u64) -> Vec<Vec<u8>> {
        let target = to_nibbles(&trie_key(index));
        let entries: Vec<_> = self.entries.iter().collect();
        let mut proof = Vec::new();
        build_node(&entries, 0, Some(&target), &mut proof);
        proof.reverse();
        proof
    }
}

fn build_node(
    entries: &[(&Vec<u8>, &Vec<u8>)],
    depth: usize,
    target: Option<&[u8]>,
    proof: &mut Vec<Vec<u8>>,
) -> Vec<u8> {
    let on_path = target.map_or(false, |t| entries.iter().any(|(k, _)| k.as_slice() == t));

    let node = if entries.len() == 1 {
        let (key, value) = entries[0];
        leaf_node(&key[depth..], value)
    } else {
        let first = &entries[0].0[depth..];
        let shared = entries[1..].iter().fold(first.len(), |len, (key, _)| {
            first
                .iter()
                .zip(&key[depth..])
                .take(len)
                .take_while(|(a, b)| a == b)
                .count()
        });

        if shared > 0 {
            let child = build_node(entries, depth + shared, target, proof);
            Item::list(vec![
                Item::bytes(compact_path(&first[..shared], false)),
                Item::bytes(sha3_256(&child).to_vec()),
            ])
            .encode()
        } else {
            let mut slots = vec![Item::bytes(Vec::new()); 17];
            if let Some((_, value)) = entries.iter().find(|(key, _)| key.len() == depth) {
                slots[16] = Item::bytes(value.to_vec());
            }
            for nibble in 0..16u8 {
                let group: Vec<_> = entries
                    .iter()
                    .filter(|(key, _)| key.get(depth) == Some(&nibble))
                    .copied()
                    .collect();
                if !group.is_empty() {
                    let child = build_node(&group, depth + 1, target, proof);
                    slots[nibble as usize] = Item::bytes(sha3_256(&child).to_vec());
                }
            }
            Item::list(slots).encode()
        }
    };

    if on_path {
        proof.push(node.clone());
    }
    node
}

pub fn contract(n: u8) -> Address {
    Address::contract([n; 20])
}

/// An event log whose first indexed field is `signature`.
pub fn event_log(address: &Address, signature: &str, indexed: Vec<Vec<u8>>, data: Vec<Vec<u8>>) -> EventLog {
    let mut fields = vec![signature.as_bytes().to_vec()];
    fields.extend(indexed);
    EventLog {
        address: *address,
        indexed: fields,
        data,
    }
}

pub fn message_log(address: &Address, next_bmc: &str, seq: i128, msg: &[u8]) -> EventLog {
    event_log(
        address,
        "Message(str,int,bytes)",
        vec![next_bmc.as_bytes().to_vec()],
        vec![int_to_bytes(seq), msg.to_vec()],
    )
}

pub fn receipt_bytes(logs: Vec<EventLog>, event_logs_hash: Option<[u8; 32]>) -> Vec<u8> {
    Item::list(vec![
        Item::int(1),
        Item::bytes(contract(0xEE).as_bytes().to_vec()),
        Item::uint(21_000),
        Item::uint(21_000),
        Item::uint(12_500_000_000),
        Item::bytes(Vec::new()),
        Item::list(logs.iter().map(EventLog::to_item).collect()),
        Item::bytes(Vec::new()),
        Item::optional_bytes(event_logs_hash.as_ref().map(|h| h.as_slice())),
    ])
    .encode()
}

/// Encoded block update: header, votes from `keys`, and the next validator
/// set when one is given.
pub fn block_update_bytes(header: &[u8], keys: &[SigningKey], next: Option<&Validators>) -> Vec<u8> {
    let hash = sha3_256(header);
    let height = crate::types::BlockHeader::from_bytes(header).unwrap().height;
    Item::list(vec![
        Item::bytes(header.to_vec()),
        Item::bytes(sign_votes(keys, height, &hash).to_bytes()),
        match next {
            Some(validators) => Item::bytes(validators.to_bytes().to_vec()),
            None => Item::Null,
        },
    ])
    .encode()
}

pub fn block_proof_bytes(header: &[u8], at: u64, witness: &[[u8; 32]]) -> Vec<u8> {
    Item::list(vec![
        Item::bytes(header.to_vec()),
        Item::list(vec![
            Item::uint(at),
            Item::list(witness.iter().map(|w| Item::bytes(w.to_vec())).collect()),
        ]),
    ])
    .encode()
}

fn nested(nodes: &[Vec<u8>]) -> Item {
    Item::bytes(Item::list(nodes.iter().cloned().map(Item::bytes).collect()).encode())
}

/// Encoded receipt proof with an event proof for each of `events`.
pub fn receipt_proof_bytes(index: u64, proofs: &[Vec<u8>], events: &[(u64, Vec<Vec<u8>>)]) -> Vec<u8> {
    Item::list(vec![
        Item::uint(index),
        nested(proofs),
        Item::list(
            events
                .iter()
                .map(|(i, nodes)| Item::list(vec![Item::uint(*i), nested(nodes)]))
                .collect(),
        ),
    ])
    .encode()
}

pub fn relay_message_bytes(
    block_updates: Vec<Vec<u8>>,
    block_proof: Option<Vec<u8>>,
    receipt_proofs: Vec<Vec<u8>>,
) -> Vec<u8> {
    Item::list(vec![
        Item::list(block_updates.into_iter().map(Item::bytes).collect()),
        match block_proof {
            Some(proof) => Item::bytes(proof),
            None => Item::Null,
        },
        Item::list(receipt_proofs.into_iter().map(Item::bytes).collect()),
    ])
    .encode()
}

/// One receipt at index 0 whose event trie holds `logs`. Returns the
/// receipt root and the encoded receipt proof covering every log.
pub fn receipt_with_logs(logs: &[EventLog]) -> ([u8; 32], Vec<u8>) {
    let mut events = TrieBuilder::new();
    for (i, log) in logs.iter().enumerate() {
        events.insert(i as u64, log.to_item().encode());
    }
    let mut receipts = TrieBuilder::new();
    receipts.insert(0, receipt_bytes(Vec::new(), Some(events.root())));

    let event_proofs: Vec<_> = (0..logs.len() as u64).map(|i| (i, events.proof(i))).collect();
    let proof = receipt_proof_bytes(0, &receipts.proof(0), &event_proofs);
    (receipts.root(), proof)
}
