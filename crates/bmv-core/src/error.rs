use crate::codec::CodecError;
use crate::consensus::{BlockError, VoteError};
use crate::execution::{EventError, MptError, ReceiptError};
use crate::mta::MtaError;
use crate::types::{AddressError, DecodeError};
use thiserror::Error;

/// Numeric error codes reported to relayers.
pub mod code {
    pub const UNKNOWN: u32 = 0;
    pub const INVALID_MPT: u32 = 1;
    pub const INVALID_VOTES: u32 = 2;
    pub const INVALID_SEQUENCE: u32 = 3;
    pub const INVALID_BLOCK_UPDATE: u32 = 4;
    pub const INVALID_BLOCK_PROOF: u32 = 5;
    pub const INVALID_BLOCK_WITNESS: u32 = 6;
    pub const INVALID_SEQUENCE_HIGHER: u32 = 7;
    pub const INVALID_BLOCK_UPDATE_HEIGHT_HIGHER: u32 = 8;
    pub const INVALID_BLOCK_UPDATE_HEIGHT_LOWER: u32 = 9;
    pub const INVALID_BLOCK_PROOF_HEIGHT_HIGHER: u32 = 10;
    pub const INVALID_BLOCK_WITNESS_OLD: u32 = 11;
}

/// Rejection of a relay call. Every variant is a deterministic, input
/// dependent failure except [`BmvError::Internal`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BmvError {
    #[error("Malformed evidence: {0}")]
    Format(#[from] DecodeError),

    #[error("Invalid votes: {0}")]
    InvalidVotes(#[source] BlockError),

    #[error("Invalid block update: {0}")]
    InvalidBlockUpdate(#[source] BlockError),

    #[error("Invalid block proof: {0}")]
    InvalidBlockProof(#[source] BlockError),

    #[error("Block proof height {height} is newer than accumulator height {mta_height}")]
    BlockProofHeightHigher { height: u64, mta_height: u64 },

    #[error("Invalid block witness: {0}")]
    InvalidBlockWitness(#[source] BlockError),

    #[error("Block witness too old: {0}")]
    BlockWitnessTooOld(#[source] BlockError),

    #[error("Invalid trie proof: {0}")]
    InvalidProof(#[source] ReceiptError),

    #[error("Invalid sequence {seq}: expected {expected}")]
    SequenceTooHigh { seq: i128, expected: u64 },

    #[error("Invalid sequence {seq}: expected {expected}, message already delivered")]
    SequenceTooLow { seq: i128, expected: u64 },

    #[error("Invalid block update height {height}: expected {expected}")]
    BlockUpdateHeightHigher { height: u64, expected: u64 },

    #[error("Invalid block update height {height}: expected {expected}, block already applied")]
    BlockUpdateHeightLower { height: u64, expected: u64 },

    #[error("Invalid relay message: {0}")]
    InvalidRelayMessage(String),

    #[error("Invalid event log: {0}")]
    InvalidEvent(#[from] EventError),

    #[error("Not acceptable: {0}")]
    NotAcceptable(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(#[from] AddressError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BmvError {
    pub fn code(&self) -> u32 {
        match self {
            BmvError::InvalidProof(_) => code::INVALID_MPT,
            BmvError::InvalidVotes(_) => code::INVALID_VOTES,
            BmvError::SequenceTooLow { .. } => code::INVALID_SEQUENCE,
            BmvError::InvalidBlockUpdate(_) => code::INVALID_BLOCK_UPDATE,
            BmvError::InvalidBlockProof(_) => code::INVALID_BLOCK_PROOF,
            BmvError::InvalidBlockWitness(_) => code::INVALID_BLOCK_WITNESS,
            BmvError::SequenceTooHigh { .. } => code::INVALID_SEQUENCE_HIGHER,
            BmvError::BlockUpdateHeightHigher { .. } => code::INVALID_BLOCK_UPDATE_HEIGHT_HIGHER,
            BmvError::BlockUpdateHeightLower { .. } => code::INVALID_BLOCK_UPDATE_HEIGHT_LOWER,
            BmvError::BlockProofHeightHigher { .. } => code::INVALID_BLOCK_PROOF_HEIGHT_HIGHER,
            BmvError::BlockWitnessTooOld(_) => code::INVALID_BLOCK_WITNESS_OLD,
            BmvError::Format(_)
            | BmvError::InvalidRelayMessage(_)
            | BmvError::InvalidEvent(_)
            | BmvError::NotAcceptable(_)
            | BmvError::InvalidAddress(_)
            | BmvError::Internal(_) => code::UNKNOWN,
        }
    }
}

impl From<BlockError> for BmvError {
    fn from(err: BlockError) -> Self {
        match err {
            BlockError::Votes { .. } => BmvError::InvalidVotes(err),
            BlockError::MissingVotes { .. }
            | BlockError::MissingNextValidators { .. }
            | BlockError::NextValidatorsMismatch { .. } => BmvError::InvalidBlockUpdate(err),
            BlockError::MissingWitness { .. } => BmvError::InvalidBlockProof(err),
            BlockError::ProofHeightHigher { height, mta_height } => {
                BmvError::BlockProofHeightHigher { height, mta_height }
            }
            BlockError::Witness {
                source: MtaError::WitnessTooOld { .. },
                ..
            } => BmvError::BlockWitnessTooOld(err),
            BlockError::Witness {
                source: MtaError::Overflow,
                ..
            } => BmvError::Internal(err.to_string()),
            BlockError::Witness { .. } => BmvError::InvalidBlockWitness(err),
        }
    }
}

impl From<ReceiptError> for BmvError {
    fn from(err: ReceiptError) -> Self {
        match err {
            ReceiptError::Decode { source, .. } => BmvError::Format(source),
            other => BmvError::InvalidProof(other),
        }
    }
}

impl From<MtaError> for BmvError {
    /// Accumulator failures outside witness checks only come from appends.
    fn from(err: MtaError) -> Self {
        BmvError::Internal(err.to_string())
    }
}

impl From<CodecError> for BmvError {
    fn from(err: CodecError) -> Self {
        BmvError::Format(DecodeError::Codec {
            context: "input",
            source: err,
        })
    }
}

impl BmvError {
    /// The vote failure behind an `InvalidVotes` rejection.
    pub fn vote_error(&self) -> Option<&VoteError> {
        match self {
            BmvError::InvalidVotes(BlockError::Votes { source, .. }) => Some(source),
            _ => None,
        }
    }

    /// The trie failure behind an `InvalidProof` rejection.
    pub fn mpt_error(&self) -> Option<&MptError> {
        match self {
            BmvError::InvalidProof(ReceiptError::ReceiptProof { source, .. })
            | BmvError::InvalidProof(ReceiptError::EventProof { source, .. }) => Some(source),
            _ => None,
        }
    }
}
