pub mod address;
pub mod block;
pub mod receipt;
pub mod relay;
pub mod validators;
pub mod votes;

pub use address::*;
pub use block::*;
pub use receipt::*;
pub use relay::*;
pub use validators::*;
pub use votes::*;

use crate::codec::CodecError;
use thiserror::Error;

/// Errors turning wire bytes into evidence types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("{context}: {source}")]
    Codec {
        context: &'static str,
        #[source]
        source: CodecError,
    },

    #[error("{context}: {source}")]
    Address {
        context: &'static str,
        #[source]
        source: AddressError,
    },

    #[error("Invalid base64url input: {0}")]
    Base64(String),

    #[error("Empty validator list")]
    EmptyValidators,

    #[error("Missing required {0}")]
    Missing(&'static str),
}

/// Attach a structure name to codec failures.
pub(crate) trait Context<T> {
    fn context(self, context: &'static str) -> Result<T, DecodeError>;
}

impl<T> Context<T> for Result<T, CodecError> {
    fn context(self, context: &'static str) -> Result<T, DecodeError> {
        self.map_err(|source| DecodeError::Codec { context, source })
    }
}

impl<T> Context<T> for Result<T, AddressError> {
    fn context(self, context: &'static str) -> Result<T, DecodeError> {
        self.map_err(|source| DecodeError::Address { context, source })
    }
}
