//! # BMV Core
//!
//! Pure Rust verification logic for BTP relay messages from an ICON-family
//! source chain.
//!
//! This crate contains **no networking code** and **no WASM dependencies**.
//! Every block header, receipt and message event a relayer submits passes
//! through these checks before its payload is handed to the message center.
//!
//! ## Trust Model
//!
//! - **Vote verification** (`consensus` module): Recovers secp256k1 signers
//!   of precommit votes and requires more than two thirds of the current
//!   validator set. Trusts that the validator set is honest by that margin.
//!
//! - **Block accumulator** (`mta` module): Every verified header is appended
//!   to a Merkle tree accumulator, so later proofs can re-anchor on an older
//!   block with a witness instead of fresh votes.
//!
//! - **Receipt verification** (`execution` module): Verifies Merkle-Patricia
//!   trie proofs for receipts and event logs under a verified receipt root.
//!   Zero trust assumptions beyond the verified header.
//!
//! ## Usage
//!
//! ```ignore
//! use bmv_core::{BtpMessageVerifier, VerifierConfig};
//!
//! let config = VerifierConfig::from_json(json)?;
//! let mut verifier = BtpMessageVerifier::new(&config)?;
//! let messages = verifier.handle_relay_message(bmc, prev, seq, &relay_bytes)?;
//! ```

pub mod codec;
pub mod consensus;
pub mod error;
pub mod execution;
pub mod hash;
pub mod mta;
pub mod types;
pub mod verifier;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types for convenience
pub use consensus::{verify_block_proof, verify_block_update, verify_votes, BlockError, VoteError};
pub use error::{code, BmvError};
pub use execution::{parse_event, prove_receipt, MessageEvent, ReceiptError};
pub use mta::{MerkleTreeAccumulator, MtaError, MtaStatus};
pub use types::{Address, BtpAddress, RelayMessage, Validators};
pub use verifier::{BtpMessageVerifier, ConfigError, VerifierConfig, VerifierState, VerifierStatus};
