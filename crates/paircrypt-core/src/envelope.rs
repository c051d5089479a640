//! Ciphertext envelope wire format.
//!
//! Every encrypted message or stream chunk travels as one JSON object:
//!
//! ```text
//! {"buffer": "<ciphertext>", "counter": "<16-byte counter block>"}
//! ```
//!
//! Both values are raw-byte strings: one character per byte, with the byte
//! value as the code point (U+0000..=U+00FF).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Size of the AES-CTR counter block carried in every envelope.
pub const COUNTER_LEN: usize = 16;

/// Envelope parsing errors.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("malformed envelope: {0}")]
    Json(#[from] serde_json::Error),

    #[error("character U+{0:04X} is not a byte value")]
    NotAByte(u32),

    #[error("invalid counter length: expected {COUNTER_LEN} bytes, got {0}")]
    CounterLength(usize),
}

#[derive(Serialize, Deserialize)]
struct RawEnvelope {
    buffer: String,
    counter: String,
}

/// Decoded envelope: ciphertext plus the counter block it was encrypted with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub buffer: Vec<u8>,
    pub counter: [u8; COUNTER_LEN],
}

impl Envelope {
    pub fn new(buffer: Vec<u8>, counter: [u8; COUNTER_LEN]) -> Self {
        Self { buffer, counter }
    }

    /// Encode to envelope JSON.
    pub fn encode(&self) -> String {
        let raw = RawEnvelope {
            buffer: bytes_to_raw_string(&self.buffer),
            counter: bytes_to_raw_string(&self.counter),
        };
        serde_json::to_string(&raw).expect("envelope of two strings always serializes")
    }

    /// Parse envelope JSON.
    pub fn decode(text: &str) -> Result<Self, EnvelopeError> {
        let raw: RawEnvelope = serde_json::from_str(text)?;

        let buffer = raw_string_to_bytes(&raw.buffer)?;
        let counter = raw_string_to_bytes(&raw.counter)?;
        let counter: [u8; COUNTER_LEN] = counter
            .try_into()
            .map_err(|c: Vec<u8>| EnvelopeError::CounterLength(c.len()))?;

        Ok(Self { buffer, counter })
    }
}

/// Map each byte to the character with the same code point.
pub fn bytes_to_raw_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Inverse of [`bytes_to_raw_string`]. Rejects characters above U+00FF.
pub fn raw_string_to_bytes(s: &str) -> Result<Vec<u8>, EnvelopeError> {
    s.chars()
        .map(|c| u8::try_from(c).map_err(|_| EnvelopeError::NotAByte(u32::from(c))))
        .collect()
}
