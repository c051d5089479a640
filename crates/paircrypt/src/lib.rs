//! Pairwise ECDH identities with AES-CTR encryption.
//!
//! This crate provides:
//! - An [`Identity`] holding one ECDH key pair (P-256, P-384 or P-521)
//! - Per-peer shared secrets derived from exchanged public keys
//! - One-shot message encryption into JSON envelopes
//! - Chunked stream encryption as composable transform stages
//! - Snapshots for persisting and restoring an identity
//!
//! # Design
//!
//! All primitives sit behind the [`CryptoProvider`] trait; the identity only
//! enforces the protocol and its state machine. [`RustCryptoProvider`] is the
//! default provider.
//!
//! Every message and every stream chunk carries its own random 16-byte
//! counter block, so envelopes can be decrypted independently and in any
//! order.

#![forbid(unsafe_code)]

mod cipher;
pub mod error;
pub mod identity;
mod jwk;
pub mod marshal;
pub mod provider;
pub mod rustcrypto;
pub mod stream;

pub use error::{CryptoError, ErrorKind, SessionError};
pub use identity::Identity;
pub use marshal::MarshalledIdentity;
pub use paircrypt_core::{
    CounterLength, Envelope, KeyLength, NamedCurve, Parameters, PeerId, COUNTER_LEN,
};
pub use provider::{CryptoProvider, KeyHandle, KeyPair, KeyUsage, SharedKeySpec};
pub use rustcrypto::RustCryptoProvider;
pub use stream::{ChunkTransformer, DecryptTransform, EncryptTransform, TransformStreamFactory};
