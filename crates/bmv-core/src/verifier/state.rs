use crate::mta::MerkleTreeAccumulator;
use crate::types::{DecodeError, Validators};
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Everything a verifier instance persists between calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StoredState", into = "StoredState")]
pub struct VerifierState {
    pub validators: Validators,
    pub mta: MerkleTreeAccumulator,
    /// Source height of the last anchor that delivered a message.
    pub last_height: u64,
    /// Sequence number the next delivered message must carry.
    pub next_sequence: u64,
}

/// Serialized form: binary parts as base64url strings.
#[derive(Serialize, Deserialize)]
struct StoredState {
    validators: String,
    mta: String,
    last_height: u64,
    next_sequence: u64,
}

impl From<VerifierState> for StoredState {
    fn from(state: VerifierState) -> Self {
        StoredState {
            validators: URL_SAFE.encode(state.validators.to_bytes()),
            mta: URL_SAFE.encode(state.mta.to_bytes()),
            last_height: state.last_height,
            next_sequence: state.next_sequence,
        }
    }
}

impl TryFrom<StoredState> for VerifierState {
    type Error = String;

    fn try_from(stored: StoredState) -> Result<Self, Self::Error> {
        let decode = |s: &str| {
            URL_SAFE
                .decode(s)
                .map_err(|e| DecodeError::Base64(e.to_string()).to_string())
        };
        let validators =
            Validators::from_bytes(&decode(&stored.validators)?).map_err(|e| e.to_string())?;
        let mta = MerkleTreeAccumulator::from_bytes(&decode(&stored.mta)?)
            .map_err(|e| e.to_string())?;
        Ok(VerifierState {
            validators,
            mta,
            last_height: stored.last_height,
            next_sequence: stored.next_sequence,
        })
    }
}

/// Progress reported to relayers so they can pick the next evidence to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifierStatus {
    /// Accumulator height.
    pub height: u64,
    /// Accumulator offset.
    pub offset: u64,
    /// Source height of the last relayed message.
    pub last_height: u64,
}

impl VerifierState {
    pub fn status(&self) -> VerifierStatus {
        let mta = self.mta.status();
        VerifierStatus {
            height: mta.height,
            offset: mta.offset,
            last_height: self.last_height,
        }
    }
}
