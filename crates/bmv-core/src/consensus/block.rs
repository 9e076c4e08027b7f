use crate::consensus::votes::{verify_votes, VoteError};
use crate::mta::{MerkleTreeAccumulator, MtaError};
use crate::types::{BlockProof, BlockUpdate, Validators};
use thiserror::Error;

/// Errors verifying block updates and block proofs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockError {
    #[error("Block update at height {height} carries no votes")]
    MissingVotes { height: u64 },

    #[error("Invalid votes for block {height}: {source}")]
    Votes {
        height: u64,
        #[source]
        source: VoteError,
    },

    #[error("Block {height} rotates validators to {expected} but carries no next validator set")]
    MissingNextValidators { height: u64, expected: String },

    #[error("Block {height} next validator hash mismatch: header has {expected}, supplied set hashes to {actual}")]
    NextValidatorsMismatch {
        height: u64,
        expected: String,
        actual: String,
    },

    #[error("Block proof for height {height} carries no witness")]
    MissingWitness { height: u64 },

    #[error("Block proof height {height} is newer than accumulator height {mta_height}")]
    ProofHeightHigher { height: u64, mta_height: u64 },

    #[error("Invalid block witness for height {height}: {source}")]
    Witness {
        height: u64,
        #[source]
        source: MtaError,
    },
}

/// Outcome of a verified block update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidatorChange {
    Unchanged,
    Rotate(Validators),
}

/// Verify that a block update was finalized by `validators` and resolve the
/// validator set for the next block.
///
/// 1. Votes must be present and pass against the update's own height and hash
/// 2. If the header's next-validators hash equals the current set's hash the
///    set is unchanged
/// 3. Otherwise the update must carry the next set and its hash must match
pub fn verify_block_update(
    update: &BlockUpdate,
    validators: &Validators,
) -> Result<ValidatorChange, BlockError> {
    let header = &update.header;
    let height = header.height;

    let votes = update
        .votes
        .as_ref()
        .ok_or(BlockError::MissingVotes { height })?;
    verify_votes(votes, height, header.hash(), validators)
        .map_err(|source| BlockError::Votes { height, source })?;

    if header.next_validators_hash.as_slice() == validators.hash().as_slice() {
        return Ok(ValidatorChange::Unchanged);
    }

    let next = update
        .next_validators
        .as_ref()
        .ok_or_else(|| BlockError::MissingNextValidators {
            height,
            expected: hex::encode(&header.next_validators_hash),
        })?;
    if next.hash().as_slice() != header.next_validators_hash.as_slice() {
        return Err(BlockError::NextValidatorsMismatch {
            height,
            expected: hex::encode(&header.next_validators_hash),
            actual: hex::encode(next.hash()),
        });
    }

    Ok(ValidatorChange::Rotate(next.clone()))
}

/// Verify that a block proof's header is a leaf of the accumulator.
pub fn verify_block_proof(
    proof: &BlockProof,
    mta: &MerkleTreeAccumulator,
) -> Result<(), BlockError> {
    let height = proof.header.height;
    let witness = proof
        .witness
        .as_ref()
        .ok_or(BlockError::MissingWitness { height })?;

    if mta.height() < height {
        return Err(BlockError::ProofHeightHigher {
            height,
            mta_height: mta.height(),
        });
    }

    mta.verify(&witness.witness, proof.header.hash(), height, witness.height)
        .map_err(|source| BlockError::Witness { height, source })
}
