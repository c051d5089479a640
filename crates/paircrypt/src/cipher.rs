//! One-shot message encryption.
//!
//! Each message gets a fresh random 16-byte counter block, is encrypted with
//! AES-CTR under the peer's shared key and travels as an
//! [`Envelope`](paircrypt_core::Envelope).
//!
//! CTR mode has no integrity protection: decrypting with the wrong key or a
//! tampered envelope yields garbage rather than an error, unless the garbage
//! happens not to be valid UTF-8.

use paircrypt_core::{CounterLength, Envelope, PeerId, COUNTER_LEN};

use crate::error::{CryptoError, SessionError};
use crate::identity::Identity;
use crate::provider::CryptoProvider;

/// Encrypt `plaintext` under `key` with a newly drawn counter block.
pub(crate) fn seal<P: CryptoProvider>(
    provider: &P,
    key: &P::SharedKey,
    counter_length: CounterLength,
    plaintext: &[u8],
) -> Result<String, SessionError> {
    let counter: [u8; COUNTER_LEN] = provider
        .random_bytes(COUNTER_LEN)?
        .try_into()
        .map_err(|b: Vec<u8>| {
            CryptoError::Random(format!("expected {COUNTER_LEN} bytes, got {}", b.len()))
        })?;

    let buffer = provider.encrypt(key, &counter, counter_length, plaintext)?;
    Ok(Envelope::new(buffer, counter).encode())
}

/// Decrypt envelope text produced by [`seal`].
pub(crate) fn open<P: CryptoProvider>(
    provider: &P,
    key: &P::SharedKey,
    counter_length: CounterLength,
    envelope: &str,
) -> Result<Vec<u8>, SessionError> {
    let envelope = Envelope::decode(envelope)?;
    Ok(provider.decrypt(key, &envelope.counter, counter_length, &envelope.buffer)?)
}

impl<P: CryptoProvider> Identity<P> {
    /// Encrypt a message for the default peer.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, SessionError> {
        self.encrypt_for(PeerId::Default, plaintext)
    }

    /// Encrypt a message for `peer`.
    ///
    /// # Errors
    /// `NoSharedSecret` if no secret was agreed with `peer`.
    pub fn encrypt_for(
        &self,
        peer: impl Into<PeerId>,
        plaintext: &str,
    ) -> Result<String, SessionError> {
        let key = self.shared_secret(&peer.into())?;
        seal(
            &*self.provider,
            &key,
            self.parameters.counter_length,
            plaintext.as_bytes(),
        )
    }

    /// Decrypt a message from the default peer.
    pub fn decrypt(&self, envelope: &str) -> Result<String, SessionError> {
        self.decrypt_for(PeerId::Default, envelope)
    }

    /// Decrypt a message from `peer`.
    ///
    /// # Errors
    /// `NoSharedSecret` if no secret was agreed with `peer`; a crypto error
    /// for malformed envelopes or plaintext that is not UTF-8.
    pub fn decrypt_for(
        &self,
        peer: impl Into<PeerId>,
        envelope: &str,
    ) -> Result<String, SessionError> {
        let key = self.shared_secret(&peer.into())?;
        let plaintext = open(
            &*self.provider,
            &key,
            self.parameters.counter_length,
            envelope,
        )?;
        String::from_utf8(plaintext).map_err(|e| CryptoError::Utf8(e).into())
    }
}
