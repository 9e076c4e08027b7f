use crate::codec::{CodecError, Item};
use crate::hash::sha3_256;
use thiserror::Error;

/// Errors during Merkle-Patricia trie proof verification.
/// Each variant is specific enough to diagnose exactly what went wrong.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MptError {
    #[error("Invalid trie node encoding at depth {depth}: {source}")]
    InvalidNode {
        depth: usize,
        #[source]
        source: CodecError,
    },

    #[error("Proof exhausted at depth {depth}: a hash reference has no matching proof node")]
    MissingProofNode { depth: usize },

    #[error("Hash mismatch at depth {depth}: node hashes to {computed}, parent references {expected}")]
    HashMismatch {
        depth: usize,
        computed: String,
        expected: String,
    },

    #[error("Invalid child reference at depth {depth}: expected 32-byte hash, got {len} bytes")]
    InvalidHashLength { depth: usize, len: usize },

    #[error("Invalid trie node type at depth {depth}: expected branch, extension or leaf, got {node_type}")]
    InvalidNodeType { depth: usize, node_type: String },

    #[error("Empty compact path in node at depth {depth}")]
    EmptyPath { depth: usize },

    #[error("Key nibbles do not match {kind} path at depth {depth}")]
    NibbleMismatch { depth: usize, kind: &'static str },

    #[error("Branch at depth {depth} has no child for nibble {nibble:x}")]
    MissingChild { depth: usize, nibble: u8 },

    #[error("Node at depth {depth} holds no value for the key")]
    EmptyValue { depth: usize },

    #[error("Proof has {remaining} unused trailing nodes")]
    UnusedProofNodes { remaining: usize },
}

/// What a parent node points at.
enum ChildRef {
    /// Must be resolved from the next proof node.
    Hash([u8; 32]),
    /// Short node stored inline in its parent.
    Embedded(Item),
}

/// Prove that `key` maps to a value under the trie `root`.
///
/// `proofs` holds the raw trie nodes on the path, top node first. Every hash
/// reference consumes exactly one proof node and the node must hash to the
/// reference. The walk succeeds only if the full key is matched, a non-empty
/// value is found and every proof node was used.
///
/// Returns the stored value bytes.
pub fn prove(root: &[u8; 32], key: &[u8], proofs: &[Vec<u8>]) -> Result<Vec<u8>, MptError> {
    let nibbles = bytes_to_nibbles(key);
    let mut nibble_index: usize = 0;
    let mut next_proof = proofs.iter();
    let mut next = ChildRef::Hash(*root);
    let mut depth: usize = 0;

    let value = loop {
        let node = match next {
            ChildRef::Hash(expected) => {
                let raw = next_proof
                    .next()
                    .ok_or(MptError::MissingProofNode { depth })?;
                let computed = sha3_256(raw);
                if computed != expected {
                    return Err(MptError::HashMismatch {
                        depth,
                        computed: hex::encode(computed),
                        expected: hex::encode(expected),
                    });
                }
                Item::decode(raw).map_err(|source| MptError::InvalidNode { depth, source })?
            }
            ChildRef::Embedded(item) => item,
        };

        let items = match &node {
            Item::List(items) => items.as_slice(),
            _ => {
                return Err(MptError::InvalidNodeType {
                    depth,
                    node_type: "byte string".to_string(),
                })
            }
        };
        let remaining = &nibbles[nibble_index..];

        match items.len() {
            2 => {
                let path = items[0]
                    .as_bytes()
                    .map_err(|source| MptError::InvalidNode { depth, source })?;
                let (path_nibbles, is_leaf) =
                    decode_compact_path(path).ok_or(MptError::EmptyPath { depth })?;

                if is_leaf {
                    // A leaf must consume the rest of the key exactly
                    if remaining != path_nibbles.as_slice() {
                        return Err(MptError::NibbleMismatch { depth, kind: "leaf" });
                    }
                    break items[1]
                        .as_bytes()
                        .map_err(|source| MptError::InvalidNode { depth, source })?
                        .to_vec();
                }

                if !remaining.starts_with(&path_nibbles) {
                    return Err(MptError::NibbleMismatch {
                        depth,
                        kind: "extension",
                    });
                }
                nibble_index += path_nibbles.len();
                next = child_ref(&items[1], depth)?.ok_or(MptError::MissingChild {
                    depth,
                    nibble: remaining.get(path_nibbles.len()).copied().unwrap_or(0),
                })?;
            }
            17 => match remaining.first() {
                Some(&nibble) => {
                    nibble_index += 1;
                    next = child_ref(&items[nibble as usize], depth)?
                        .ok_or(MptError::MissingChild { depth, nibble })?;
                }
                None => {
                    break items[16]
                        .as_bytes()
                        .map_err(|source| MptError::InvalidNode { depth, source })?
                        .to_vec();
                }
            },
            n => {
                return Err(MptError::InvalidNodeType {
                    depth,
                    node_type: format!("{}-element list", n),
                })
            }
        }
        depth += 1;
    };

    if value.is_empty() {
        return Err(MptError::EmptyValue { depth });
    }
    let unused = next_proof.len();
    if unused > 0 {
        return Err(MptError::UnusedProofNodes { remaining: unused });
    }
    Ok(value)
}

/// Resolve a child slot: inline node, hash reference, or nothing.
fn child_ref(item: &Item, depth: usize) -> Result<Option<ChildRef>, MptError> {
    match item {
        Item::List(_) => Ok(Some(ChildRef::Embedded(item.clone()))),
        Item::Null => Ok(None),
        Item::Bytes(bytes) if bytes.is_empty() => Ok(None),
        Item::Bytes(bytes) => {
            let hash = crate::codec::to_hash(bytes).map_err(|_| MptError::InvalidHashLength {
                depth,
                len: bytes.len(),
            })?;
            Ok(Some(ChildRef::Hash(hash)))
        }
    }
}

/// Convert bytes to nibbles (4 bits each), high nibble first.
pub fn bytes_to_nibbles(bytes: &[u8]) -> Vec<u8> {
    let mut nibbles = Vec::with_capacity(bytes.len() * 2);
    for byte in bytes {
        nibbles.push(byte >> 4);
        nibbles.push(byte & 0x0F);
    }
    nibbles
}

/// Decode compact (hex-prefix) encoding used in trie nodes.
/// Returns (nibbles, is_leaf), or `None` for an empty path.
fn decode_compact_path(encoded: &[u8]) -> Option<(Vec<u8>, bool)> {
    let first = *encoded.first()?;
    let is_leaf = first & 0x20 != 0;
    let is_odd = first & 0x10 != 0;

    let mut nibbles = Vec::with_capacity(encoded.len() * 2);
    if is_odd {
        nibbles.push(first & 0x0F);
    }
    nibbles.extend(bytes_to_nibbles(&encoded[1..]));

    Some((nibbles, is_leaf))
}
