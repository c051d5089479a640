//! Session parameters.
//!
//! Both sides of a conversation must agree on every field. Nothing on the
//! wire carries them, so a mismatch is not detected here.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while parsing parameters.
#[derive(Debug, Error)]
pub enum ParameterError {
    #[error("unsupported counter length: {0} bits")]
    CounterLength(u16),

    #[error("unsupported key length: {0} bits")]
    KeyLength(u16),

    #[error("unsupported curve: {0}")]
    Curve(String),

    #[error("invalid parameters: {0}")]
    Json(#[from] serde_json::Error),
}

/// Number of low-order counter block bits that increment in AES-CTR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum CounterLength {
    Bits64,
    Bits128,
}

impl CounterLength {
    pub fn bits(self) -> u16 {
        match self {
            Self::Bits64 => 64,
            Self::Bits128 => 128,
        }
    }
}

impl TryFrom<u16> for CounterLength {
    type Error = ParameterError;

    fn try_from(bits: u16) -> Result<Self, Self::Error> {
        match bits {
            64 => Ok(Self::Bits64),
            128 => Ok(Self::Bits128),
            other => Err(ParameterError::CounterLength(other)),
        }
    }
}

impl From<CounterLength> for u16 {
    fn from(length: CounterLength) -> Self {
        length.bits()
    }
}

/// AES key size derived from the shared secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum KeyLength {
    Bits128,
    Bits192,
    Bits256,
}

impl KeyLength {
    pub fn bits(self) -> u16 {
        match self {
            Self::Bits128 => 128,
            Self::Bits192 => 192,
            Self::Bits256 => 256,
        }
    }

    /// Key size in bytes.
    pub fn bytes(self) -> usize {
        usize::from(self.bits() / 8)
    }
}

impl TryFrom<u16> for KeyLength {
    type Error = ParameterError;

    fn try_from(bits: u16) -> Result<Self, Self::Error> {
        match bits {
            128 => Ok(Self::Bits128),
            192 => Ok(Self::Bits192),
            256 => Ok(Self::Bits256),
            other => Err(ParameterError::KeyLength(other)),
        }
    }
}

impl From<KeyLength> for u16 {
    fn from(length: KeyLength) -> Self {
        length.bits()
    }
}

/// NIST curve used for ECDH.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NamedCurve {
    #[serde(rename = "P-256")]
    P256,
    #[serde(rename = "P-384")]
    P384,
    #[serde(rename = "P-521")]
    P521,
}

impl NamedCurve {
    /// Name as it appears in the JWK `crv` member.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::P256 => "P-256",
            Self::P384 => "P-384",
            Self::P521 => "P-521",
        }
    }

    /// Size of one field element (and one JWK coordinate) in bytes.
    pub fn field_size(self) -> usize {
        match self {
            Self::P256 => 32,
            Self::P384 => 48,
            Self::P521 => 66,
        }
    }
}

impl fmt::Display for NamedCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NamedCurve {
    type Err = ParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "P-256" => Ok(Self::P256),
            "P-384" => Ok(Self::P384),
            "P-521" => Ok(Self::P521),
            other => Err(ParameterError::Curve(other.to_string())),
        }
    }
}

/// Parameters fixed for the lifetime of an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameters {
    /// Counter bits used by AES-CTR. Default 64.
    pub counter_length: CounterLength,
    /// Curve for the identity key pair. Default P-256.
    pub named_curve: NamedCurve,
    /// Derived AES key size. Default 256.
    pub key_length: KeyLength,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            counter_length: CounterLength::Bits64,
            named_curve: NamedCurve::P256,
            key_length: KeyLength::Bits256,
        }
    }
}

impl Parameters {
    pub fn with_counter_length(mut self, counter_length: CounterLength) -> Self {
        self.counter_length = counter_length;
        self
    }

    pub fn with_named_curve(mut self, named_curve: NamedCurve) -> Self {
        self.named_curve = named_curve;
        self
    }

    pub fn with_key_length(mut self, key_length: KeyLength) -> Self {
        self.key_length = key_length;
        self
    }

    /// Parse parameters from their JSON form.
    pub fn from_json(json: &str) -> Result<Self, ParameterError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("parameters always serialize")
    }

    /// Every supported combination of counter length, curve and key length.
    pub fn all() -> impl Iterator<Item = Parameters> {
        [CounterLength::Bits64, CounterLength::Bits128]
            .into_iter()
            .flat_map(|counter_length| {
                [NamedCurve::P256, NamedCurve::P384, NamedCurve::P521]
                    .into_iter()
                    .flat_map(move |named_curve| {
                        [KeyLength::Bits128, KeyLength::Bits192, KeyLength::Bits256]
                            .into_iter()
                            .map(move |key_length| Parameters {
                                counter_length,
                                named_curve,
                                key_length,
                            })
                    })
            })
    }
}
