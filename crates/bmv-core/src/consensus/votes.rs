use crate::codec::Item;
use crate::hash::sha3_256;
use crate::types::{Address, Validators, Votes};
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use thiserror::Error;

/// Vote type tag for precommits in the signed vote message.
pub const VOTE_TYPE_PRECOMMIT: i128 = 1;

/// Length of a recoverable secp256k1 signature: r(32) || s(32) || v(1).
pub const SIGNATURE_LEN: usize = 65;

/// Errors that can occur during vote verification.
/// Each variant represents a specific, actionable failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoteError {
    #[error("Malformed signature in vote {index}: {reason}")]
    InvalidSignature { index: usize, reason: String },

    #[error("Vote {index} recovers to {address}, which is not in the validator set")]
    NotValidator { index: usize, address: String },

    #[error("Vote {index} duplicates an earlier vote from {address}")]
    DuplicateVote { index: usize, address: String },

    #[error("Insufficient votes: {signers}/{validators} validators signed (need at least {required})")]
    InsufficientVotes {
        signers: usize,
        validators: usize,
        required: usize,
    },
}

/// Smallest signer count that passes for a set of `validators` members:
/// strictly more than two thirds.
pub fn required_signers(validators: usize) -> usize {
    validators * 2 / 3 + 1
}

/// Encode the message a validator signs for a precommit:
/// `[height, round, PRECOMMIT, block_hash, [part_count, part_hash], timestamp]`.
pub fn vote_message(
    height: u64,
    round: i64,
    block_hash: &[u8; 32],
    part_set_id: &crate::types::PartSetId,
    timestamp: i64,
) -> Vec<u8> {
    Item::list(vec![
        Item::uint(height),
        Item::int(round as i128),
        Item::int(VOTE_TYPE_PRECOMMIT),
        Item::bytes(block_hash.to_vec()),
        part_set_id.to_item(),
        Item::int(timestamp as i128),
    ])
    .encode()
}

/// Recover the signer's account identifier from a message hash.
pub fn recover_address(hash: &[u8; 32], signature: &[u8], index: usize) -> Result<Address, VoteError> {
    let invalid = |reason: String| VoteError::InvalidSignature { index, reason };

    if signature.len() != SIGNATURE_LEN {
        return Err(invalid(format!(
            "expected {} bytes, got {}",
            SIGNATURE_LEN,
            signature.len()
        )));
    }
    let sig = Signature::from_slice(&signature[..64]).map_err(|e| invalid(e.to_string()))?;
    let recovery_id = RecoveryId::from_byte(signature[64])
        .ok_or_else(|| invalid(format!("invalid recovery id {}", signature[64])))?;
    let key = VerifyingKey::recover_from_prehash(hash, &sig, recovery_id)
        .map_err(|e| invalid(e.to_string()))?;

    let point = key.as_affine().to_encoded_point(false);
    Address::from_public_key(point.as_bytes()).map_err(|e| invalid(e.to_string()))
}

/// Verify precommit votes for the block at `height` with hash `block_hash`.
///
/// Every signature must recover to a distinct member of `validators`, and
/// more than two thirds of the set must have signed.
///
/// Returns the number of distinct signers.
pub fn verify_votes(
    votes: &Votes,
    height: u64,
    block_hash: &[u8; 32],
    validators: &Validators,
) -> Result<usize, VoteError> {
    let mut signers: Vec<Address> = Vec::with_capacity(votes.items.len());

    for (index, item) in votes.items.iter().enumerate() {
        let message = vote_message(
            height,
            votes.round,
            block_hash,
            &votes.part_set_id,
            item.timestamp,
        );
        let address = recover_address(&sha3_256(&message), &item.signature, index)?;

        if !validators.contains(&address) {
            return Err(VoteError::NotValidator {
                index,
                address: address.to_string(),
            });
        }
        if signers.contains(&address) {
            return Err(VoteError::DuplicateVote {
                index,
                address: address.to_string(),
            });
        }
        signers.push(address);
    }

    // 3 * signers > 2 * N, i.e. signers > floor(2N / 3)
    if signers.len() * 3 <= validators.len() * 2 {
        return Err(VoteError::InsufficientVotes {
            signers: signers.len(),
            validators: validators.len(),
            required: required_signers(validators.len()),
        });
    }

    Ok(signers.len())
}
