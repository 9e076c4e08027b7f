use crate::types::{Address, DecodeError, Validators};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid configuration JSON: {0}")]
    Json(String),

    #[error("Message center address {0} is not a contract address")]
    BmcNotContract(Address),

    #[error("Invalid network address {0:?}")]
    InvalidNet(String),

    #[error("Invalid validators: {0}")]
    Validators(#[from] DecodeError),
}

/// Install-time parameters of a verifier instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// Contract address of the local message center (`cx…`).
    pub bmc: Address,
    /// Network id of the source chain, e.g. `0x1.icon`.
    pub net: String,
    /// Comma-separated `hx…` list, or base64url of the encoded validator list.
    pub validators: String,
    /// Source height the accumulator starts after.
    #[serde(default)]
    pub offset: u64,
    /// Live accumulator peaks to keep; 0 keeps all.
    #[serde(default)]
    pub roots_size: usize,
    /// Recent block hashes kept for verifying stale witnesses.
    #[serde(default)]
    pub cache_size: usize,
    #[serde(default)]
    pub allow_newer_witness: bool,
}

impl VerifierConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Json(e.to_string()))
    }

    /// Check the configuration and resolve the initial validator set.
    pub fn validate(&self) -> Result<Validators, ConfigError> {
        if !self.bmc.is_contract() {
            return Err(ConfigError::BmcNotContract(self.bmc));
        }
        if self.net.is_empty() || self.net.contains('/') {
            return Err(ConfigError::InvalidNet(self.net.clone()));
        }
        let validators = Validators::from_string(&self.validators)?;
        if validators.is_empty() {
            return Err(ConfigError::Validators(DecodeError::EmptyValidators));
        }
        Ok(validators)
    }
}
