//! Merkle tree accumulator over source-chain block hashes.
//!
//! Leaves are appended one per verified block. The accumulator keeps one peak
//! per set bit of the live leaf count (`roots[i]` covers `2^i` leaves, higher
//! slots hold older leaves). With `roots_size > 0`, a carry that reaches the
//! last allowed slot is retired there and `offset` advances past the pruned
//! leaves, so the live leaf count is always `height - offset`.

use crate::codec::{CodecError, Item};
use crate::hash::sha3_256_concat;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use thiserror::Error;

/// Errors from accumulator updates and witness verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MtaError {
    #[error("Root index {index} is out of range ({len} roots)")]
    RootIndexOutOfRange { index: usize, len: usize },

    #[error("Height {height} is outside the tracked range (offset {offset}, height {current})")]
    HeightOutOfRange {
        height: u64,
        offset: u64,
        current: u64,
    },

    #[error("Invalid witness: folded hash {computed} does not match root {expected}")]
    InvalidWitness { computed: String, expected: String },

    #[error("Witness generated at {at} is newer than accumulator height {height} and newer witnesses are not allowed")]
    NewerWitnessNotAllowed { at: u64, height: u64 },

    #[error("Leaf height {leaf_height} is newer than accumulator height {height}")]
    LeafNewerThanAccumulator { leaf_height: u64, height: u64 },

    #[error("Invalid old witness: leaf {hash} is not in the recent-leaf cache")]
    InvalidOldWitness { hash: String },

    #[error("Witness too old: leaf height {leaf_height} is outside the cache window ({cache_size}) at height {height}")]
    WitnessTooOld {
        leaf_height: u64,
        height: u64,
        cache_size: usize,
    },

    #[error("Accumulator height or offset overflow")]
    Overflow,

    #[error("Invalid accumulator encoding: {0}")]
    Codec(#[from] CodecError),
}

/// Read-only progress snapshot reported to relayers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MtaStatus {
    pub height: u64,
    pub offset: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MerkleTreeAccumulator {
    height: u64,
    roots: Vec<Option<[u8; 32]>>,
    offset: u64,
    roots_size: usize,
    cache_size: usize,
    cache: VecDeque<[u8; 32]>,
    allow_newer_witness: bool,
}

impl MerkleTreeAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulator that starts after `offset` already-final source blocks.
    pub fn with_offset(offset: u64) -> Self {
        let mut mta = Self::default();
        mta.set_offset(offset);
        mta
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn roots_size(&self) -> usize {
        self.roots_size
    }

    pub fn cache_size(&self) -> usize {
        self.cache_size
    }

    pub fn allow_newer_witness(&self) -> bool {
        self.allow_newer_witness
    }

    pub fn roots(&self) -> &[Option<[u8; 32]>] {
        &self.roots
    }

    pub fn status(&self) -> MtaStatus {
        MtaStatus {
            height: self.height,
            offset: self.offset,
        }
    }

    pub fn set_offset(&mut self, offset: u64) {
        self.offset = offset;
        if self.height == 0 && self.offset > 0 {
            self.height = self.offset;
        }
    }

    /// Bound the number of live peaks, dropping the oldest beyond it.
    pub fn set_roots_size(&mut self, size: usize) {
        self.roots_size = size;
        if size > 0 && self.roots.len() > size {
            let excess = self.roots.len() - size;
            self.roots.drain(..excess);
        }
    }

    pub fn set_cache_size(&mut self, size: usize) {
        self.cache_size = size;
        while self.cache.len() > size {
            self.cache.pop_front();
        }
    }

    pub fn set_allow_newer_witness(&mut self, allow: bool) {
        self.allow_newer_witness = allow;
    }

    pub fn root(&self, index: usize) -> Result<Option<&[u8; 32]>, MtaError> {
        self.roots
            .get(index)
            .map(Option::as_ref)
            .ok_or(MtaError::RootIndexOutOfRange {
                index,
                len: self.roots.len(),
            })
    }

    pub fn has_cache(&self, hash: &[u8; 32]) -> bool {
        self.cache.iter().any(|cached| cached == hash)
    }

    fn put_cache(&mut self, hash: [u8; 32]) {
        if self.cache_size > 0 {
            self.cache.push_back(hash);
        }
        while self.cache.len() > self.cache_size {
            self.cache.pop_front();
        }
    }

    /// Append a leaf.
    pub fn add(&mut self, hash: [u8; 32]) -> Result<(), MtaError> {
        self.put_cache(hash);

        if self.height == 0 || self.roots.is_empty() {
            self.roots.push(Some(hash));
        } else {
            let mut carry = hash;
            let mut placed = false;
            for index in 0..self.roots.len() {
                match self.roots[index] {
                    None => {
                        self.roots[index] = Some(carry);
                        placed = true;
                        break;
                    }
                    Some(_) if self.roots_size > 0 && self.roots_size <= index + 1 => {
                        // Retire: the old peak is pruned, the carry takes its slot
                        let weight = 1u64.checked_shl(index as u32).ok_or(MtaError::Overflow)?;
                        self.offset = self.offset.checked_add(weight).ok_or(MtaError::Overflow)?;
                        self.roots[index] = Some(carry);
                        placed = true;
                        break;
                    }
                    Some(peak) => {
                        carry = sha3_256_concat(&peak, &carry);
                        self.roots[index] = None;
                    }
                }
            }
            if !placed {
                self.roots.push(Some(carry));
            }
        }

        self.height = self.height.checked_add(1).ok_or(MtaError::Overflow)?;
        Ok(())
    }

    fn check_live(&self, height: u64) -> Result<u64, MtaError> {
        if height <= self.offset || height > self.height {
            return Err(MtaError::HeightOutOfRange {
                height,
                offset: self.offset,
                current: self.height,
            });
        }
        Ok(height - 1 - self.offset)
    }

    /// Index of the peak whose subtree currently holds the leaf at `height`.
    pub fn get_root_idx_by_height(&self, height: u64) -> Result<usize, MtaError> {
        let mut position = self.check_live(height)?;
        for index in (0..self.roots.len()).rev() {
            if self.roots[index].is_none() {
                continue;
            }
            let weight = 1u64.checked_shl(index as u32).ok_or(MtaError::Overflow)?;
            if position < weight {
                return Ok(index);
            }
            position -= weight;
        }
        Err(MtaError::HeightOutOfRange {
            height,
            offset: self.offset,
            current: self.height,
        })
    }

    /// Verify that `hash` is the leaf at `height`, using a witness produced
    /// when the accumulator was at height `at`.
    pub fn verify(
        &self,
        witness: &[[u8; 32]],
        hash: &[u8; 32],
        height: u64,
        at: u64,
    ) -> Result<(), MtaError> {
        if self.height == at {
            let position = self.check_live(height)?;
            let root = self.root(witness.len())?;
            Self::verify_fold(witness, root, hash, position)
        } else if self.height < at {
            // Accumulator is behind the witness: only the prefix that ends at
            // the peak we hold is usable.
            if !self.allow_newer_witness {
                return Err(MtaError::NewerWitnessNotAllowed {
                    at,
                    height: self.height,
                });
            }
            if self.height < height {
                return Err(MtaError::LeafNewerThanAccumulator {
                    leaf_height: height,
                    height: self.height,
                });
            }
            let root_idx = self.get_root_idx_by_height(height)?;
            let root = self.root(root_idx)?;
            let usable = witness.get(..root_idx).ok_or(MtaError::RootIndexOutOfRange {
                index: root_idx,
                len: witness.len(),
            })?;
            Self::verify_fold(usable, root, hash, self.check_live(height)?)
        } else {
            // Accumulator is ahead: peaks on the witness path may be merged or
            // pruned, only the recent-leaf cache can vouch for the hash.
            let within_cache = match self.height.checked_sub(height.saturating_add(1)) {
                Some(gap) => gap < self.cache_size as u64,
                None => true,
            };
            if !within_cache {
                return Err(MtaError::WitnessTooOld {
                    leaf_height: height,
                    height: self.height,
                    cache_size: self.cache_size,
                });
            }
            if !self.has_cache(hash) {
                return Err(MtaError::InvalidOldWitness {
                    hash: hex::encode(hash),
                });
            }
            Ok(())
        }
    }

    fn verify_fold(
        witness: &[[u8; 32]],
        root: Option<&[u8; 32]>,
        hash: &[u8; 32],
        position: u64,
    ) -> Result<(), MtaError> {
        let computed = fold_witness(witness, hash, position);
        match root {
            Some(root) if *root == computed => Ok(()),
            _ => Err(MtaError::InvalidWitness {
                computed: hex::encode(computed),
                expected: root.map(hex::encode).unwrap_or_else(|| "none".to_string()),
            }),
        }
    }

    /// `[height, roots, offset, roots_size, cache_size, cache, allow_newer_witness]`
    pub fn to_bytes(&self) -> Vec<u8> {
        let roots = self
            .roots
            .iter()
            .map(|root| Item::optional_bytes(root.as_ref().map(|r| r.as_slice())))
            .collect();
        let cache = self.cache.iter().map(|h| Item::bytes(h.to_vec())).collect();
        Item::list(vec![
            Item::uint(self.height),
            Item::list(roots),
            Item::uint(self.offset),
            Item::uint(self.roots_size as u64),
            Item::uint(self.cache_size as u64),
            Item::list(cache),
            Item::boolean(self.allow_newer_witness),
        ])
        .encode()
    }

    /// Decode the stored form. Trailing fields may be absent and default.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MtaError> {
        let item = Item::decode(bytes)?;
        let fields = item.as_list()?;
        let mut mta = Self::default();

        if let Some(field) = fields.first() {
            mta.height = field.as_u64()?;
        }
        if let Some(field) = fields.get(1) {
            for root in field.as_list()? {
                let root = match root.as_optional_bytes()? {
                    Some(bytes) => Some(crate::codec::to_hash(bytes)?),
                    None => None,
                };
                mta.roots.push(root);
            }
        }
        if let Some(field) = fields.get(2) {
            mta.offset = field.as_u64()?;
        }
        if let Some(field) = fields.get(3) {
            mta.roots_size = to_size(field)?;
        }
        if let Some(field) = fields.get(4) {
            mta.cache_size = to_size(field)?;
        }
        if let Some(field) = fields.get(5) {
            for cached in field.as_list()? {
                mta.cache.push_back(cached.as_hash()?);
            }
        }
        if let Some(field) = fields.get(6) {
            mta.allow_newer_witness = field.as_bool()?;
        }

        if mta.height == 0 && mta.offset > 0 {
            mta.height = mta.offset;
        }
        Ok(mta)
    }
}

fn to_size(item: &Item) -> Result<usize, CodecError> {
    let value = item.as_u64()?;
    usize::try_from(value).map_err(|_| CodecError::IntegerOverflow { len: 8 })
}

/// Fold a sibling path upward. `position` is the leaf's index among live
/// leaves; its low bit at each level says whether the running hash is the
/// left or right operand.
pub fn fold_witness(witness: &[[u8; 32]], leaf: &[u8; 32], position: u64) -> [u8; 32] {
    let mut hash = *leaf;
    let mut index = position;
    for sibling in witness {
        hash = if index % 2 == 0 {
            sha3_256_concat(&hash, sibling)
        } else {
            sha3_256_concat(sibling, &hash)
        };
        index /= 2;
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::sha3_256;

    fn leaf(i: u64) -> [u8; 32] {
        sha3_256(format!("block-{}", i).as_bytes())
    }

    /// Hash of the perfect subtree at `level` with index `index`, over
    /// leaves numbered from zero.
    fn node(leaves: &[[u8; 32]], level: u32, index: usize) -> [u8; 32] {
        if level == 0 {
            return leaves[index];
        }
        sha3_256_concat(
            &node(leaves, level - 1, index * 2),
            &node(leaves, level - 1, index * 2 + 1),
        )
    }

    /// Witness for leaf `position` against an unpruned accumulator holding
    /// `leaves.len()` leaves.
    fn witness_for(leaves: &[[u8; 32]], position: usize) -> Vec<[u8; 32]> {
        let count = leaves.len();
        let mut start = 0usize;
        let mut level = 0u32;
        for bit in (0..usize::BITS).rev() {
            let weight = 1usize << bit;
            if count & weight == 0 {
                continue;
            }
            if position < start + weight {
                level = bit;
                break;
            }
            start += weight;
        }
        (0..level)
            .map(|l| node(leaves, l, (position >> l) ^ 1))
            .collect()
    }

    fn build(count: u64) -> (MerkleTreeAccumulator, Vec<[u8; 32]>) {
        let mut mta = MerkleTreeAccumulator::new();
        let mut leaves = Vec::new();
        for i in 0..count {
            mta.add(leaf(i)).unwrap();
            leaves.push(leaf(i));
        }
        (mta, leaves)
    }

    #[test]
    fn test_add_builds_binary_counter() {
        let (mta, leaves) = build(5);
        assert_eq!(mta.height(), 5);
        assert_eq!(mta.offset(), 0);
        assert_eq!(mta.roots().len(), 3);
        assert_eq!(mta.roots()[0], Some(leaves[4]));
        assert_eq!(mta.roots()[1], None);
        assert_eq!(mta.roots()[2], Some(node(&leaves, 2, 0)));
    }

    #[test]
    fn test_root_idx_by_height() {
        let (mta, _) = build(5);
        for height in 1..=4 {
            assert_eq!(mta.get_root_idx_by_height(height).unwrap(), 2);
        }
        assert_eq!(mta.get_root_idx_by_height(5).unwrap(), 0);
        assert!(matches!(
            mta.get_root_idx_by_height(0),
            Err(MtaError::HeightOutOfRange { .. })
        ));
        assert!(matches!(
            mta.get_root_idx_by_height(6),
            Err(MtaError::HeightOutOfRange { .. })
        ));
    }

    #[test]
    fn test_exact_witness_for_every_leaf() {
        let mut mta = MerkleTreeAccumulator::new();
        let mut leaves = Vec::new();
        for i in 0..13u64 {
            mta.add(leaf(i)).unwrap();
            leaves.push(leaf(i));
            for position in 0..leaves.len() {
                let witness = witness_for(&leaves, position);
                let height = position as u64 + 1;
                mta.verify(&witness, &leaves[position], height, mta.height())
                    .unwrap_or_else(|e| panic!("leaf {} at {}: {}", position, i + 1, e));
            }
        }
    }

    #[test]
    fn test_exact_witness_mutation_fails() {
        let (mta, leaves) = build(8);
        let witness = witness_for(&leaves, 5);
        assert_eq!(witness.len(), 3);

        for w in 0..witness.len() {
            for byte in [0usize, 17, 31] {
                let mut bad = witness.clone();
                bad[w][byte] ^= 0x80;
                assert!(matches!(
                    mta.verify(&bad, &leaves[5], 6, 8),
                    Err(MtaError::InvalidWitness { .. })
                ));
            }
        }

        let mut bad_leaf = leaves[5];
        bad_leaf[0] ^= 0x01;
        assert!(matches!(
            mta.verify(&witness, &bad_leaf, 6, 8),
            Err(MtaError::InvalidWitness { .. })
        ));

        // Right hash, wrong claimed height
        assert!(mta.verify(&witness, &leaves[5], 5, 8).is_err());
    }

    #[test]
    fn test_newer_witness_requires_opt_in() {
        let (mut mta, _) = build(5);
        let (_, later_leaves) = build(8);
        let witness = witness_for(&later_leaves, 4);

        assert!(matches!(
            mta.verify(&witness, &later_leaves[4], 5, 8),
            Err(MtaError::NewerWitnessNotAllowed { at: 8, height: 5 })
        ));

        mta.set_allow_newer_witness(true);
        // Leaf 5 sits alone in peak 0, so the usable prefix is empty
        mta.verify(&witness, &later_leaves[4], 5, 8).unwrap();

        // Leaf 2 lives under peak 2 in both states
        let witness = witness_for(&later_leaves, 1);
        mta.verify(&witness, &later_leaves[1], 2, 8).unwrap();

        // A leaf the accumulator has not seen yet
        let witness = witness_for(&later_leaves, 6);
        assert!(matches!(
            mta.verify(&witness, &later_leaves[6], 7, 8),
            Err(MtaError::LeafNewerThanAccumulator { leaf_height: 7, height: 5 })
        ));

        // Wrong leaf under a usable prefix
        let witness = witness_for(&later_leaves, 1);
        assert!(matches!(
            mta.verify(&witness, &later_leaves[2], 2, 8),
            Err(MtaError::InvalidWitness { .. })
        ));
    }

    #[test]
    fn test_old_witness_cache_window() {
        let mut mta = MerkleTreeAccumulator::new();
        mta.set_cache_size(3);
        let mut witnesses = Vec::new();
        let mut leaves = Vec::new();
        for i in 0..10u64 {
            mta.add(leaf(i)).unwrap();
            leaves.push(leaf(i));
            witnesses.push((witness_for(&leaves, i as usize), mta.height()));
        }
        assert_eq!(mta.height(), 10);

        // Cached leaves (heights 8 and 9) verify through the cache
        for height in 8..=9u64 {
            let (witness, at) = &witnesses[height as usize - 1];
            mta.verify(witness, &leaves[height as usize - 1], height, *at)
                .unwrap();
        }

        // Boundary: gap == cache_size
        let (witness, at) = &witnesses[5];
        assert!(matches!(
            mta.verify(witness, &leaves[5], 6, *at),
            Err(MtaError::WitnessTooOld { leaf_height: 6, .. })
        ));

        // Height 7 is inside the window but its hash was already evicted
        let (witness, at) = &witnesses[6];
        assert!(matches!(
            mta.verify(witness, &leaves[6], 7, *at),
            Err(MtaError::InvalidOldWitness { .. })
        ));

        // Inside the window but not the cached hash
        let (witness, at) = &witnesses[8];
        assert!(matches!(
            mta.verify(witness, &leaves[0], 9, *at),
            Err(MtaError::InvalidOldWitness { .. })
        ));
    }

    #[test]
    fn test_old_witness_without_cache_is_too_old() {
        let (mta, leaves) = build(4);
        let witness = witness_for(&leaves[..3], 2);
        assert!(matches!(
            mta.verify(&witness, &leaves[2], 3, 3),
            Err(MtaError::WitnessTooOld { .. })
        ));
    }

    #[test]
    fn test_roots_size_retires_oldest_peak() {
        let mut mta = MerkleTreeAccumulator::new();
        mta.set_roots_size(2);
        let leaves: Vec<[u8; 32]> = (0..6).map(leaf).collect();
        for l in &leaves {
            mta.add(*l).unwrap();
        }
        assert_eq!(mta.height(), 6);
        assert_eq!(mta.offset(), 4);
        assert_eq!(mta.roots().len(), 2);
        assert_eq!(mta.roots()[0], None);
        assert_eq!(mta.roots()[1], Some(sha3_256_concat(&leaves[4], &leaves[5])));

        // Live leaves are heights 5 and 6
        mta.verify(&[leaves[5]], &leaves[4], 5, 6).unwrap();
        mta.verify(&[leaves[4]], &leaves[5], 6, 6).unwrap();
        assert!(matches!(
            mta.verify(&[leaves[3]], &leaves[2], 3, 6),
            Err(MtaError::HeightOutOfRange { height: 3, offset: 4, .. })
        ));
    }

    #[test]
    fn test_with_offset_starts_height() {
        let mut mta = MerkleTreeAccumulator::with_offset(100);
        assert_eq!(mta.height(), 100);
        mta.add(leaf(0)).unwrap();
        mta.add(leaf(1)).unwrap();
        assert_eq!(mta.height(), 102);
        let witness = [leaf(0)];
        mta.verify(&witness, &leaf(1), 102, 102).unwrap();
        assert_eq!(mta.get_root_idx_by_height(101).unwrap(), 1);
    }

    #[test]
    fn test_serialization_roundtrip() {
        let mut mta = MerkleTreeAccumulator::with_offset(7);
        mta.set_cache_size(4);
        mta.set_roots_size(8);
        mta.set_allow_newer_witness(true);
        for i in 0..6 {
            mta.add(leaf(i)).unwrap();
        }
        assert!(mta.roots().iter().any(Option::is_none));

        let bytes = mta.to_bytes();
        let decoded = MerkleTreeAccumulator::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, mta);
        assert_eq!(decoded.to_bytes(), bytes);
    }

    #[test]
    fn test_decode_short_form() {
        let bytes = Item::list(vec![Item::uint(0), Item::list(vec![]), Item::uint(12)]).encode();
        let mta = MerkleTreeAccumulator::from_bytes(&bytes).unwrap();
        assert_eq!(mta.height(), 12);
        assert_eq!(mta.offset(), 12);
        assert_eq!(mta.cache_size(), 0);
        assert!(!mta.allow_newer_witness());

        assert!(MerkleTreeAccumulator::from_bytes(&[0xC1]).is_err());
    }
}
