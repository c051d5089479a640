//! Local ECDH identity and its per-peer shared secrets.
//!
//! An [`Identity`] owns at most one key pair and a map from [`PeerId`] to
//! the AES key agreed with that peer.
//!
//! # Lifecycle
//!
//! ```text
//! new ──> generate_key_pair / import_key_pair ──> set_remote_public_key* ──> encrypt / decrypt
//!              (exactly once)                         (per peer)
//! ```
//!
//! # Example
//!
//! ```
//! use paircrypt::{Identity, Parameters};
//!
//! let alice = Identity::new(Parameters::default());
//! let bob = Identity::new(Parameters::default());
//! alice.generate_key_pair(false, &[]).unwrap();
//! bob.generate_key_pair(false, &[]).unwrap();
//!
//! alice.set_remote_public_key(&bob.export_public_key().unwrap()).unwrap();
//! bob.set_remote_public_key(&alice.export_public_key().unwrap()).unwrap();
//!
//! let envelope = alice.encrypt("hello bob").unwrap();
//! assert_eq!(bob.decrypt(&envelope).unwrap(), "hello bob");
//! ```

use paircrypt_core::{Parameters, PeerId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::debug;
use zeroize::Zeroizing;

use crate::error::{CryptoError, SessionError};
use crate::provider::{CryptoProvider, KeyHandle, KeyPair, KeyUsage, SharedKeySpec};
use crate::rustcrypto::RustCryptoProvider;

/// A party in pairwise ECDH conversations.
///
/// All operations except [`reset`](Identity::reset) take `&self`; an identity
/// can be shared behind an `Arc`.
pub struct Identity<P: CryptoProvider = RustCryptoProvider> {
    pub(crate) parameters: Parameters,
    pub(crate) provider: Arc<P>,
    key_pair: OnceLock<KeyPair<P>>,
    shared_secrets: RwLock<HashMap<PeerId, P::SharedKey>>,
}

impl Identity<RustCryptoProvider> {
    /// Create an identity backed by [`RustCryptoProvider`].
    pub fn new(parameters: Parameters) -> Self {
        Self::with_provider(parameters, RustCryptoProvider)
    }
}

impl<P: CryptoProvider> Identity<P> {
    pub fn with_provider(parameters: Parameters, provider: P) -> Self {
        Self::with_shared_provider(parameters, Arc::new(provider))
    }

    pub fn with_shared_provider(parameters: Parameters, provider: Arc<P>) -> Self {
        Self {
            parameters,
            provider,
            key_pair: OnceLock::new(),
            shared_secrets: RwLock::new(HashMap::new()),
        }
    }

    pub(crate) fn from_parts(
        parameters: Parameters,
        provider: Arc<P>,
        key_pair: Option<KeyPair<P>>,
    ) -> Self {
        let identity = Self::with_shared_provider(parameters, provider);
        if let Some(key_pair) = key_pair {
            // Freshly built, the slot is empty.
            let _ = identity.key_pair.set(key_pair);
        }
        identity
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn export_parameters(&self) -> Parameters {
        self.parameters
    }

    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    pub fn has_key_pair(&self) -> bool {
        self.key_pair.get().is_some()
    }

    pub(crate) fn key_pair(&self) -> Option<&KeyPair<P>> {
        self.key_pair.get()
    }

    /// Generate the identity key pair on the configured curve.
    ///
    /// The private key is always usable for key derivation; `additional_usages`
    /// are added on top. It can only be exported if `extractable` is set.
    ///
    /// # Errors
    /// `KeyPairExists` if a key pair was already generated or imported,
    /// including by a concurrent caller that won the race.
    pub fn generate_key_pair(
        &self,
        extractable: bool,
        additional_usages: &[KeyUsage],
    ) -> Result<(), SessionError> {
        if self.has_key_pair() {
            return Err(SessionError::KeyPairExists);
        }

        let mut usages = vec![KeyUsage::DeriveKey];
        for usage in additional_usages {
            if !usages.contains(usage) {
                usages.push(*usage);
            }
        }

        let curve = self.parameters.named_curve;
        let (private_key, public_key) = self
            .provider
            .generate_key_pair(curve, extractable, &usages)?;

        self.install(KeyPair::new(private_key, public_key))?;
        debug!(%curve, extractable, ?usages, "generated identity key pair");
        Ok(())
    }

    /// Import a key pair exported by another identity with the same parameters.
    ///
    /// Used to move an identity to a second device. Extractability and usages
    /// of the private key come from its own JWK metadata. The public key must
    /// be the one belonging to the private key.
    pub fn import_key_pair(
        &self,
        private_key_text: &str,
        public_key_text: &str,
    ) -> Result<(), SessionError> {
        if self.has_key_pair() {
            return Err(SessionError::KeyPairExists);
        }

        let curve = self.parameters.named_curve;
        let private_key = self.provider.import_private_key(private_key_text, curve)?;
        let public_key = self.provider.import_public_key(public_key_text, curve)?;

        let derived = self.provider.public_key(&private_key)?;
        let expected = self.provider.export_public_key(&derived)?;
        if self.provider.export_public_key(&public_key)? != expected {
            return Err(CryptoError::InvalidKey(
                "public key does not belong to the private key".into(),
            )
            .into());
        }

        self.install(KeyPair::new(private_key, public_key))?;
        debug!(%curve, "imported identity key pair");
        Ok(())
    }

    fn install(&self, key_pair: KeyPair<P>) -> Result<(), SessionError> {
        self.key_pair
            .set(key_pair)
            .map_err(|_| SessionError::KeyPairExists)
    }

    /// Public key as JWK text, for the peers of this identity.
    pub fn export_public_key(&self) -> Result<String, SessionError> {
        let key_pair = self.key_pair().ok_or(SessionError::NoKeyPair)?;
        Ok(self.provider.export_public_key(key_pair.public_key())?)
    }

    /// Private key as JWK text.
    ///
    /// # Security
    /// Anyone holding this text can impersonate the identity.
    ///
    /// # Errors
    /// `NoKeyPair` before a key pair exists, `NotExtractable` if the private
    /// key was not generated or imported as extractable.
    pub fn export_private_key(&self) -> Result<Zeroizing<String>, SessionError> {
        let key_pair = self.key_pair().ok_or(SessionError::NoKeyPair)?;
        if !key_pair.private_key().extractable() {
            return Err(SessionError::NotExtractable);
        }
        Ok(self.provider.export_private_key(key_pair.private_key())?)
    }

    /// Agree on a secret with the default (unicast) peer.
    pub fn set_remote_public_key(&self, remote_public_key: &str) -> Result<(), SessionError> {
        self.set_remote_public_key_for(PeerId::Default, remote_public_key)
    }

    /// Agree on a secret with `peer`, replacing any earlier secret for it.
    ///
    /// Nothing is stored unless import and derivation both succeed.
    pub fn set_remote_public_key_for(
        &self,
        peer: impl Into<PeerId>,
        remote_public_key: &str,
    ) -> Result<(), SessionError> {
        let peer = peer.into();
        let key_pair = self.key_pair().ok_or(SessionError::NoKeyPair)?;

        let curve = self.parameters.named_curve;
        let remote = self.provider.import_public_key(remote_public_key, curve)?;
        let spec = SharedKeySpec {
            curve,
            length: self.parameters.key_length,
        };
        let shared = self
            .provider
            .derive_shared_key(key_pair.private_key(), &remote, spec)?;

        let replaced = self.shared_secrets.write().insert(peer.clone(), shared).is_some();
        debug!(%peer, %curve, replaced, "derived shared secret");
        Ok(())
    }

    pub fn has_shared_secret(&self, peer: impl Into<PeerId>) -> bool {
        self.shared_secrets.read().contains_key(&peer.into())
    }

    /// Peers with an established secret, in no particular order.
    pub fn peers(&self) -> Vec<PeerId> {
        self.shared_secrets.read().keys().cloned().collect()
    }

    pub(crate) fn shared_secret(&self, peer: &PeerId) -> Result<P::SharedKey, SessionError> {
        self.shared_secrets
            .read()
            .get(peer)
            .cloned()
            .ok_or_else(|| SessionError::NoSharedSecret(peer.clone()))
    }

    /// Drop the key pair and every shared secret so a new key pair can be
    /// generated or imported.
    pub fn reset(&mut self) {
        self.key_pair.take();
        let peers = {
            let secrets = self.shared_secrets.get_mut();
            let count = secrets.len();
            secrets.clear();
            count
        };
        debug!(peers, "identity reset");
    }
}

impl<P: CryptoProvider> fmt::Debug for Identity<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("parameters", &self.parameters)
            .field("has_key_pair", &self.has_key_pair())
            .field("peers", &self.shared_secrets.read().len())
            .finish_non_exhaustive()
    }
}
