use crate::execution::mpt::{self, MptError};
use crate::types::{DecodeError, EventLog, EventProof, Receipt, ReceiptProof};
use thiserror::Error;

/// Errors proving receipts and event logs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReceiptError {
    #[error("Receipt proof for index {index} failed: {source}")]
    ReceiptProof {
        index: u64,
        #[source]
        source: MptError,
    },

    #[error("Event proof for index {index} failed: {source}")]
    EventProof {
        index: u64,
        #[source]
        source: MptError,
    },

    #[error("Anchor block {height} commits to no receipt root")]
    MissingReceiptHash { height: u64 },

    #[error("Receipt {index} carries event proofs but commits to no event-log root")]
    MissingEventLogsHash { index: u64 },

    #[error("Proven value at index {index} does not decode: {source}")]
    Decode {
        index: u64,
        #[source]
        source: DecodeError,
    },
}

/// Prove a receipt under `receipt_hash` and replace its event logs with the
/// logs proven by its event proofs.
///
/// The trie key is the codec encoding of the transaction index.
pub fn prove_receipt(proof: &ReceiptProof, receipt_hash: &[u8; 32]) -> Result<Receipt, ReceiptError> {
    let index = proof.index;
    let leaf = mpt::prove(receipt_hash, &proof.key(), &proof.proofs)
        .map_err(|source| ReceiptError::ReceiptProof { index, source })?;
    let mut receipt =
        Receipt::from_bytes(&leaf).map_err(|source| ReceiptError::Decode { index, source })?;

    let mut event_logs = Vec::with_capacity(proof.event_proofs.len());
    if !proof.event_proofs.is_empty() {
        let event_logs_hash = receipt
            .event_logs_hash
            .ok_or(ReceiptError::MissingEventLogsHash { index })?;
        for event_proof in &proof.event_proofs {
            event_logs.push(prove_event_log(event_proof, &event_logs_hash)?);
        }
    }
    receipt.event_logs = event_logs;

    Ok(receipt)
}

/// Prove one event log under a receipt's event-log root.
pub fn prove_event_log(proof: &EventProof, event_logs_hash: &[u8; 32]) -> Result<EventLog, ReceiptError> {
    let index = proof.index;
    let leaf = mpt::prove(event_logs_hash, &proof.key(), &proof.proofs)
        .map_err(|source| ReceiptError::EventProof { index, source })?;
    EventLog::from_bytes(&leaf).map_err(|source| ReceiptError::Decode { index, source })
}
