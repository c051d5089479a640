//! Error types.

use paircrypt_core::{EnvelopeError, NamedCurve, PeerId};
use thiserror::Error;

use crate::provider::KeyUsage;

/// Failures reported by a [`CryptoProvider`](crate::provider::CryptoProvider)
/// or while decoding what it consumes.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("curve mismatch: expected {expected}, got {actual}")]
    CurveMismatch {
        expected: NamedCurve,
        actual: String,
    },

    #[error("key usage not permitted: {0:?}")]
    UsageNotPermitted(KeyUsage),

    #[error("key is not extractable")]
    NotExtractable,

    #[error("invalid symmetric key length: {0} bytes")]
    KeyLength(usize),

    /// The message needs more keystream blocks than the counter can address.
    #[error("counter space exhausted for this message")]
    CounterExhausted,

    #[error("random source failed: {0}")]
    Random(String),

    #[error("envelope error: {0}")]
    Envelope(#[from] EnvelopeError),

    #[error("plaintext is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Broad class of a [`SessionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Operation not legal in the identity's current state.
    State,
    /// Export of a non-extractable private key.
    Permission,
    /// Failure inside the cryptographic provider or the wire format.
    Crypto,
}

/// Identity and cipher errors.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("key pair already exists")]
    KeyPairExists,

    #[error("no key pair: generate or import one first")]
    NoKeyPair,

    #[error("no shared secret established for {0}")]
    NoSharedSecret(PeerId),

    #[error("private key is not extractable")]
    NotExtractable,

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::KeyPairExists | Self::NoKeyPair | Self::NoSharedSecret(_) => ErrorKind::State,
            Self::NotExtractable => ErrorKind::Permission,
            Self::Crypto(_) => ErrorKind::Crypto,
        }
    }
}

impl From<EnvelopeError> for SessionError {
    fn from(err: EnvelopeError) -> Self {
        Self::Crypto(CryptoError::Envelope(err))
    }
}
