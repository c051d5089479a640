//! Cryptographic provider capability.
//!
//! An [`Identity`](crate::Identity) never touches key material itself. Key
//! generation, ECDH, AES-CTR, randomness and JWK import/export all go through
//! a [`CryptoProvider`]. Handles returned by the provider are opaque to the
//! identity; it only asks them whether they may be exported.
//!
//! [`RustCryptoProvider`](crate::rustcrypto::RustCryptoProvider) is the
//! default implementation.

use paircrypt_core::{CounterLength, KeyLength, NamedCurve, COUNTER_LEN};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroizing;

use crate::error::CryptoError;

/// Operations a key handle may be used for.
///
/// Serialized with the names used by the JWK `key_ops` member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyUsage {
    DeriveKey,
    DeriveBits,
    Encrypt,
    Decrypt,
}

/// Capability checks every provider handle answers.
pub trait KeyHandle {
    /// Whether the provider will export this key.
    fn extractable(&self) -> bool;

    /// Operations this key is allowed to perform.
    fn usages(&self) -> &[KeyUsage];

    fn allows(&self, usage: KeyUsage) -> bool {
        self.usages().contains(&usage)
    }
}

/// What to derive from an ECDH agreement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharedKeySpec {
    pub curve: NamedCurve,
    pub length: KeyLength,
}

/// Primitive operations an identity is built on.
pub trait CryptoProvider: Send + Sync + 'static {
    type PrivateKey: KeyHandle + Clone + fmt::Debug + Send + Sync + 'static;
    type PublicKey: KeyHandle + Clone + fmt::Debug + Send + Sync + 'static;
    type SharedKey: KeyHandle + Clone + fmt::Debug + Send + Sync + 'static;

    /// Generate an ECDH key pair. `usages` apply to the private key.
    fn generate_key_pair(
        &self,
        curve: NamedCurve,
        extractable: bool,
        usages: &[KeyUsage],
    ) -> Result<(Self::PrivateKey, Self::PublicKey), CryptoError>;

    /// ECDH agreement followed by derivation of a non-extractable AES key
    /// restricted to encrypt/decrypt.
    fn derive_shared_key(
        &self,
        private_key: &Self::PrivateKey,
        peer_public_key: &Self::PublicKey,
        spec: SharedKeySpec,
    ) -> Result<Self::SharedKey, CryptoError>;

    /// AES-CTR encryption starting at `counter`.
    fn encrypt(
        &self,
        key: &Self::SharedKey,
        counter: &[u8; COUNTER_LEN],
        counter_length: CounterLength,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, CryptoError>;

    /// AES-CTR decryption starting at `counter`.
    fn decrypt(
        &self,
        key: &Self::SharedKey,
        counter: &[u8; COUNTER_LEN],
        counter_length: CounterLength,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, CryptoError>;

    /// Import a private key from JWK text. Extractability and usages come
    /// from the key's own `ext` and `key_ops` members.
    fn import_private_key(
        &self,
        text: &str,
        curve: NamedCurve,
    ) -> Result<Self::PrivateKey, CryptoError>;

    /// Import a public key from JWK text.
    fn import_public_key(&self, text: &str, curve: NamedCurve)
        -> Result<Self::PublicKey, CryptoError>;

    /// Public half of a private key.
    fn public_key(&self, private_key: &Self::PrivateKey) -> Result<Self::PublicKey, CryptoError>;

    /// Export a private key as JWK text. Fails for non-extractable keys.
    fn export_private_key(&self, key: &Self::PrivateKey) -> Result<Zeroizing<String>, CryptoError>;

    /// Export a public key as JWK text.
    fn export_public_key(&self, key: &Self::PublicKey) -> Result<String, CryptoError>;

    /// Bytes from a cryptographically secure source.
    fn random_bytes(&self, count: usize) -> Result<Vec<u8>, CryptoError>;
}

/// An identity's key pair, as provider handles.
pub struct KeyPair<P: CryptoProvider> {
    private_key: P::PrivateKey,
    public_key: P::PublicKey,
}

impl<P: CryptoProvider> KeyPair<P> {
    pub fn new(private_key: P::PrivateKey, public_key: P::PublicKey) -> Self {
        Self {
            private_key,
            public_key,
        }
    }

    pub fn private_key(&self) -> &P::PrivateKey {
        &self.private_key
    }

    pub fn public_key(&self) -> &P::PublicKey {
        &self.public_key
    }
}

impl<P: CryptoProvider> Clone for KeyPair<P> {
    fn clone(&self) -> Self {
        Self {
            private_key: self.private_key.clone(),
            public_key: self.public_key.clone(),
        }
    }
}

impl<P: CryptoProvider> fmt::Debug for KeyPair<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("private_key", &self.private_key)
            .field("public_key", &self.public_key)
            .finish()
    }
}
