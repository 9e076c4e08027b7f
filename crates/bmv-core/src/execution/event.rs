use crate::codec::bytes_to_int;
use crate::types::{Address, EventLog};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Method name of the cross-chain message event.
pub const MESSAGE_EVENT: &str = "Message";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    #[error("Event log has no signature field")]
    MissingSignature,

    #[error("Malformed event signature {0:?}")]
    InvalidSignature(String),

    #[error("Unsupported parameter type {0:?} (only int, str, bool, bytes, Address are supported)")]
    UnsupportedType(String),

    #[error("Event {method} is missing parameter {index}")]
    MissingParam { method: String, index: usize },

    #[error("Parameter {index} of {method} is not a valid {ty}: {reason}")]
    InvalidParam {
        method: String,
        index: usize,
        ty: ParamType,
        reason: String,
    },

    #[error("Message event must be Message(str,int,bytes), got {0}")]
    InvalidMessageEvent(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Int,
    Str,
    Bool,
    Bytes,
    Address,
}

impl FromStr for ParamType {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "int" => Ok(ParamType::Int),
            "str" => Ok(ParamType::Str),
            "bool" => Ok(ParamType::Bool),
            "bytes" => Ok(ParamType::Bytes),
            "Address" => Ok(ParamType::Address),
            other => Err(EventError::UnsupportedType(other.to_string())),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamType::Int => "int",
            ParamType::Str => "str",
            ParamType::Bool => "bool",
            ParamType::Bytes => "bytes",
            ParamType::Address => "Address",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventParam {
    Int(i128),
    Str(String),
    Bool(bool),
    Bytes(Vec<u8>),
    Address(Address),
}

/// `Name(type,type,…)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSignature {
    pub method: String,
    pub params: Vec<ParamType>,
}

impl FromStr for EventSignature {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || EventError::InvalidSignature(s.to_string());
        let open = s.find('(').ok_or_else(invalid)?;
        let close = s.rfind(')').ok_or_else(invalid)?;
        if close < open || close != s.len() - 1 || open == 0 {
            return Err(invalid());
        }

        let inner = s[open + 1..close].trim();
        let params = if inner.is_empty() {
            Vec::new()
        } else {
            inner
                .split(',')
                .map(|t| t.trim().parse())
                .collect::<Result<Vec<_>, _>>()?
        };

        Ok(EventSignature {
            method: s[..open].to_string(),
            params,
        })
    }
}

/// An event log with its signature resolved into typed parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEvent {
    pub address: Address,
    pub method: String,
    pub params: Vec<EventParam>,
}

/// A cross-chain message emitted by the previous-hop message center.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEvent {
    /// Full BTP address of the message center the message is routed to.
    pub next_bmc: String,
    pub seq: i128,
    pub msg: Vec<u8>,
}

/// Resolve a raw log's parameters from its signature.
///
/// Parameters are taken from the indexed fields after the signature first,
/// then from the data fields, in signature order.
pub fn parse_event(log: &EventLog) -> Result<ParsedEvent, EventError> {
    let raw_signature = log.indexed.first().ok_or(EventError::MissingSignature)?;
    let text = std::str::from_utf8(raw_signature)
        .map_err(|_| EventError::InvalidSignature(hex::encode(raw_signature)))?;
    let signature: EventSignature = text.parse()?;

    let indexed_params = &log.indexed[1..];
    let mut params = Vec::with_capacity(signature.params.len());
    for (index, ty) in signature.params.iter().enumerate() {
        let raw = if index < indexed_params.len() {
            indexed_params.get(index)
        } else {
            log.data.get(index - indexed_params.len())
        }
        .ok_or_else(|| EventError::MissingParam {
            method: signature.method.clone(),
            index,
        })?;
        params.push(convert_param(&signature.method, index, *ty, raw)?);
    }

    Ok(ParsedEvent {
        address: log.address,
        method: signature.method,
        params,
    })
}

fn convert_param(method: &str, index: usize, ty: ParamType, raw: &[u8]) -> Result<EventParam, EventError> {
    let invalid = |reason: String| EventError::InvalidParam {
        method: method.to_string(),
        index,
        ty,
        reason,
    };
    match ty {
        ParamType::Int => bytes_to_int(raw)
            .map(EventParam::Int)
            .map_err(|e| invalid(e.to_string())),
        ParamType::Str => String::from_utf8(raw.to_vec())
            .map(EventParam::Str)
            .map_err(|e| invalid(e.to_string())),
        ParamType::Bool => match raw {
            [0x00] => Ok(EventParam::Bool(false)),
            [0x01] => Ok(EventParam::Bool(true)),
            other => Err(invalid(format!("byte string {}", hex::encode(other)))),
        },
        ParamType::Bytes => Ok(EventParam::Bytes(raw.to_vec())),
        ParamType::Address => Address::from_bytes(raw)
            .map(EventParam::Address)
            .map_err(|e| invalid(e.to_string())),
    }
}

impl ParsedEvent {
    /// `Some` for `Message(str,int,bytes)` events, `None` for other methods.
    pub fn to_message_event(&self) -> Result<Option<MessageEvent>, EventError> {
        if self.method != MESSAGE_EVENT {
            return Ok(None);
        }
        match self.params.as_slice() {
            [EventParam::Str(next_bmc), EventParam::Int(seq), EventParam::Bytes(msg)] => {
                Ok(Some(MessageEvent {
                    next_bmc: next_bmc.clone(),
                    seq: *seq,
                    msg: msg.clone(),
                }))
            }
            other => Err(EventError::InvalidMessageEvent(format!("{:?}", other))),
        }
    }
}
