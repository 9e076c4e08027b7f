//! Length-prefixed binary codec used by every BTP wire structure.
//!
//! The scheme is the familiar RLP layout with three additions:
//! - integers are minimal big-endian two's-complement (so negatives round-trip),
//! - booleans are a single `0x00` / `0x01` byte,
//! - `0xF8 0x00` is a reserved "present but empty" marker ([`Item::Null`]),
//!   distinct from the empty list `0xC0`.
//!
//! Decoding is strict: truncated input, trailing bytes and non-minimal length
//! prefixes are all rejected.

use thiserror::Error;

/// Reserved encoding for an omitted optional sub-structure.
pub const NULL_ENCODING: [u8; 2] = [0xF8, 0x00];

/// Nesting limit for decoded lists. Evidence structures are a handful of
/// levels deep, anything beyond this is hostile input.
const MAX_DEPTH: usize = 64;

/// Errors raised while encoding or decoding codec bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("Truncated input: need {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("Trailing bytes after item: {remaining} bytes left over")]
    TrailingBytes { remaining: usize },

    #[error("Non-canonical encoding: {reason}")]
    NonCanonical { reason: &'static str },

    #[error("Length prefix does not fit in memory")]
    LengthOverflow,

    #[error("Expected byte string, got list")]
    UnexpectedList,

    #[error("Expected list, got byte string")]
    UnexpectedBytes,

    #[error("Unexpected null marker where a value is required")]
    UnexpectedNull,

    #[error("List arity mismatch: expected {expected} items, got {got}")]
    ArityMismatch { expected: usize, got: usize },

    #[error("Integer of {len} bytes overflows the target type")]
    IntegerOverflow { len: usize },

    #[error("Negative integer {value} where an unsigned value is required")]
    NegativeInteger { value: i128 },

    #[error("Invalid boolean byte string: {0}")]
    InvalidBool(String),

    #[error("Invalid fixed-size field: expected {expected} bytes, got {got}")]
    InvalidLength { expected: usize, got: usize },

    #[error("Nesting deeper than 64 levels")]
    TooDeep,
}

/// A decoded (or to-be-encoded) codec value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Item {
    Bytes(Vec<u8>),
    List(Vec<Item>),
    /// The `0xF800` marker.
    Null,
}

impl Item {
    pub fn bytes(value: impl Into<Vec<u8>>) -> Self {
        Item::Bytes(value.into())
    }

    pub fn list(items: Vec<Item>) -> Self {
        Item::List(items)
    }

    /// Signed integer, minimal two's-complement. Zero is the empty string.
    pub fn int(value: i128) -> Self {
        Item::Bytes(int_to_bytes(value))
    }

    pub fn uint(value: u64) -> Self {
        Item::int(value as i128)
    }

    pub fn boolean(value: bool) -> Self {
        Item::Bytes(vec![value as u8])
    }

    pub fn string(value: &str) -> Self {
        Item::Bytes(value.as_bytes().to_vec())
    }

    /// `Some(bytes)` as a byte string, `None` as the null marker.
    pub fn optional_bytes(value: Option<&[u8]>) -> Self {
        match value {
            Some(b) => Item::Bytes(b.to_vec()),
            None => Item::Null,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Item::Null)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        out
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            Item::Bytes(b) => encode_bytes_into(b, out),
            Item::List(items) => {
                let mut payload = Vec::new();
                for item in items {
                    item.encode_into(&mut payload);
                }
                encode_header(0xC0, 0xF7, payload.len(), out);
                out.extend_from_slice(&payload);
            }
            Item::Null => out.extend_from_slice(&NULL_ENCODING),
        }
    }

    /// Decode exactly one item; trailing bytes are an error.
    pub fn decode(data: &[u8]) -> Result<Item, CodecError> {
        let (item, consumed) = decode_item(data, 0)?;
        if consumed != data.len() {
            return Err(CodecError::TrailingBytes {
                remaining: data.len() - consumed,
            });
        }
        Ok(item)
    }

    pub fn as_bytes(&self) -> Result<&[u8], CodecError> {
        match self {
            Item::Bytes(b) => Ok(b),
            Item::List(_) => Err(CodecError::UnexpectedList),
            Item::Null => Err(CodecError::UnexpectedNull),
        }
    }

    /// Null and the empty byte string both read as "absent".
    pub fn as_optional_bytes(&self) -> Result<Option<&[u8]>, CodecError> {
        match self {
            Item::Bytes(b) if b.is_empty() => Ok(None),
            Item::Bytes(b) => Ok(Some(b)),
            Item::Null => Ok(None),
            Item::List(_) => Err(CodecError::UnexpectedList),
        }
    }

    /// Variadic homogeneous list. Null reads as an empty list.
    pub fn as_list(&self) -> Result<&[Item], CodecError> {
        match self {
            Item::List(items) => Ok(items),
            Item::Null => Ok(&[]),
            Item::Bytes(_) => Err(CodecError::UnexpectedBytes),
        }
    }

    /// Fixed-arity record.
    pub fn as_record(&self, arity: usize) -> Result<&[Item], CodecError> {
        match self {
            Item::List(items) if items.len() == arity => Ok(items),
            Item::List(items) => Err(CodecError::ArityMismatch {
                expected: arity,
                got: items.len(),
            }),
            Item::Null => Err(CodecError::UnexpectedNull),
            Item::Bytes(_) => Err(CodecError::UnexpectedBytes),
        }
    }

    pub fn as_int(&self) -> Result<i128, CodecError> {
        bytes_to_int(self.as_bytes()?)
    }

    pub fn as_i64(&self) -> Result<i64, CodecError> {
        let bytes = self.as_bytes()?;
        let value = bytes_to_int(bytes)?;
        i64::try_from(value).map_err(|_| CodecError::IntegerOverflow { len: bytes.len() })
    }

    pub fn as_u64(&self) -> Result<u64, CodecError> {
        let bytes = self.as_bytes()?;
        let value = bytes_to_int(bytes)?;
        if value < 0 {
            return Err(CodecError::NegativeInteger { value });
        }
        u64::try_from(value).map_err(|_| CodecError::IntegerOverflow { len: bytes.len() })
    }

    pub fn as_bool(&self) -> Result<bool, CodecError> {
        match self.as_bytes()? {
            [0x00] => Ok(false),
            [0x01] => Ok(true),
            other => Err(CodecError::InvalidBool(hex::encode(other))),
        }
    }

    pub fn as_hash(&self) -> Result<[u8; 32], CodecError> {
        to_hash(self.as_bytes()?)
    }

    /// A byte string whose content is itself an encoded item.
    pub fn as_nested(&self) -> Result<Item, CodecError> {
        Item::decode(self.as_bytes()?)
    }
}

/// Encode a raw byte string.
pub fn encode_bytes(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() + 9);
    encode_bytes_into(bytes, &mut out);
    out
}

/// Encode a list from already-encoded elements.
pub fn encode_list(encoded_items: &[Vec<u8>]) -> Vec<u8> {
    let len = encoded_items.iter().map(Vec::len).sum();
    let mut out = Vec::with_capacity(len + 9);
    encode_header(0xC0, 0xF7, len, &mut out);
    for item in encoded_items {
        out.extend_from_slice(item);
    }
    out
}

/// Copy a byte string into a 32-byte hash.
pub fn to_hash(bytes: &[u8]) -> Result<[u8; 32], CodecError> {
    if bytes.len() != 32 {
        return Err(CodecError::InvalidLength {
            expected: 32,
            got: bytes.len(),
        });
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(bytes);
    Ok(out)
}

/// Minimal big-endian two's-complement bytes of `value`; zero is empty.
pub fn int_to_bytes(value: i128) -> Vec<u8> {
    if value == 0 {
        return Vec::new();
    }
    let full = value.to_be_bytes();
    let mut start = 0;
    while start < full.len() - 1 {
        let (b, next) = (full[start], full[start + 1]);
        let redundant = (b == 0x00 && next & 0x80 == 0) || (b == 0xFF && next & 0x80 != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    full[start..].to_vec()
}

/// Parse big-endian two's-complement bytes, rejecting redundant sign bytes.
/// A lone `0x00` is accepted as zero for compatibility with older encoders.
pub fn bytes_to_int(bytes: &[u8]) -> Result<i128, CodecError> {
    if bytes.is_empty() {
        return Ok(0);
    }
    if bytes.len() > 16 {
        return Err(CodecError::IntegerOverflow { len: bytes.len() });
    }
    if bytes.len() > 1 {
        let (b, next) = (bytes[0], bytes[1]);
        if (b == 0x00 && next & 0x80 == 0) || (b == 0xFF && next & 0x80 != 0) {
            return Err(CodecError::NonCanonical {
                reason: "integer has redundant sign byte",
            });
        }
    }
    let fill = if bytes[0] & 0x80 != 0 { 0xFF } else { 0x00 };
    let mut buf = [fill; 16];
    buf[16 - bytes.len()..].copy_from_slice(bytes);
    Ok(i128::from_be_bytes(buf))
}

fn encode_bytes_into(bytes: &[u8], out: &mut Vec<u8>) {
    if bytes.len() == 1 && bytes[0] < 0x80 {
        out.push(bytes[0]);
        return;
    }
    encode_header(0x80, 0xB7, bytes.len(), out);
    out.extend_from_slice(bytes);
}

fn encode_header(short_base: u8, long_base: u8, len: usize, out: &mut Vec<u8>) {
    if len <= 55 {
        out.push(short_base + len as u8);
        return;
    }
    let len_bytes = len.to_be_bytes();
    let start = len_bytes.iter().position(|&b| b != 0).unwrap_or(len_bytes.len() - 1);
    let significant = &len_bytes[start..];
    out.push(long_base + significant.len() as u8);
    out.extend_from_slice(significant);
}

/// Read a long-form length of `len_of_len` bytes starting at `data[1]`.
fn read_long_length(data: &[u8], len_of_len: usize) -> Result<usize, CodecError> {
    if data.len() < 1 + len_of_len {
        return Err(CodecError::Truncated {
            needed: 1 + len_of_len,
            available: data.len(),
        });
    }
    let raw = &data[1..1 + len_of_len];
    if raw[0] == 0 {
        return Err(CodecError::NonCanonical {
            reason: "length has leading zero byte",
        });
    }
    if len_of_len > std::mem::size_of::<usize>() {
        return Err(CodecError::LengthOverflow);
    }
    let mut length: usize = 0;
    for &b in raw {
        length = (length << 8) | b as usize;
    }
    if length <= 55 {
        return Err(CodecError::NonCanonical {
            reason: "long-form length used for short payload",
        });
    }
    Ok(length)
}

fn take(data: &[u8], header: usize, length: usize) -> Result<&[u8], CodecError> {
    let total = header.checked_add(length).ok_or(CodecError::LengthOverflow)?;
    if data.len() < total {
        return Err(CodecError::Truncated {
            needed: total,
            available: data.len(),
        });
    }
    Ok(&data[header..total])
}

/// Decode one item from the front of `data`, returning it and the bytes consumed.
fn decode_item(data: &[u8], depth: usize) -> Result<(Item, usize), CodecError> {
    if depth > MAX_DEPTH {
        return Err(CodecError::TooDeep);
    }
    let prefix = *data.first().ok_or(CodecError::Truncated {
        needed: 1,
        available: 0,
    })?;

    match prefix {
        0x00..=0x7F => Ok((Item::Bytes(vec![prefix]), 1)),
        0x80..=0xB7 => {
            let length = (prefix - 0x80) as usize;
            let payload = take(data, 1, length)?;
            if length == 1 && payload[0] < 0x80 {
                return Err(CodecError::NonCanonical {
                    reason: "single byte below 0x80 must encode as itself",
                });
            }
            Ok((Item::Bytes(payload.to_vec()), 1 + length))
        }
        0xB8..=0xBF => {
            let len_of_len = (prefix - 0xB7) as usize;
            let length = read_long_length(data, len_of_len)?;
            let payload = take(data, 1 + len_of_len, length)?;
            Ok((Item::Bytes(payload.to_vec()), 1 + len_of_len + length))
        }
        0xC0..=0xF7 => {
            let length = (prefix - 0xC0) as usize;
            let payload = take(data, 1, length)?;
            Ok((Item::List(decode_payload(payload, depth)?), 1 + length))
        }
        0xF8..=0xFF => {
            if prefix == NULL_ENCODING[0] && data.get(1) == Some(&NULL_ENCODING[1]) {
                return Ok((Item::Null, 2));
            }
            let len_of_len = (prefix - 0xF7) as usize;
            let length = read_long_length(data, len_of_len)?;
            let payload = take(data, 1 + len_of_len, length)?;
            Ok((
                Item::List(decode_payload(payload, depth)?),
                1 + len_of_len + length,
            ))
        }
    }
}

fn decode_payload(mut payload: &[u8], depth: usize) -> Result<Vec<Item>, CodecError> {
    let mut items = Vec::new();
    while !payload.is_empty() {
        let (item, consumed) = decode_item(payload, depth + 1)?;
        items.push(item);
        payload = &payload[consumed..];
    }
    Ok(items)
}
