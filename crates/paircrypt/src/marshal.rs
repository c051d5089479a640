//! Identity snapshots.
//!
//! A [`MarshalledIdentity`] holds the parameters and the provider's key pair
//! handles, never exported key text. It deliberately does not implement
//! `Serialize`: storing it is up to whatever secure storage keeps the
//! provider's native handles. Shared secrets are not part of a snapshot and
//! must be agreed again after [`Identity::unmarshal`].

use paircrypt_core::Parameters;
use std::sync::Arc;
use tracing::debug;

use crate::identity::Identity;
use crate::provider::{CryptoProvider, KeyPair};
use crate::rustcrypto::RustCryptoProvider;

/// Parameters plus key pair handle of an identity.
pub struct MarshalledIdentity<P: CryptoProvider = RustCryptoProvider> {
    pub parameters: Parameters,
    pub key_pair: Option<KeyPair<P>>,
}

impl<P: CryptoProvider> Clone for MarshalledIdentity<P> {
    fn clone(&self) -> Self {
        Self {
            parameters: self.parameters,
            key_pair: self.key_pair.clone(),
        }
    }
}

impl<P: CryptoProvider> std::fmt::Debug for MarshalledIdentity<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarshalledIdentity")
            .field("parameters", &self.parameters)
            .field("key_pair", &self.key_pair)
            .finish()
    }
}

impl<P: CryptoProvider> Identity<P> {
    /// Snapshot parameters and key pair. Always succeeds, with or without a
    /// key pair.
    pub fn marshal(&self) -> MarshalledIdentity<P> {
        MarshalledIdentity {
            parameters: self.parameters,
            key_pair: self.key_pair().cloned(),
        }
    }

    /// Rebuild an identity from a snapshot using `provider`.
    ///
    /// The key pair handle is taken over as is; the shared secret store
    /// starts empty.
    pub fn unmarshal_with(marshalled: MarshalledIdentity<P>, provider: Arc<P>) -> Self {
        debug!(
            has_key_pair = marshalled.key_pair.is_some(),
            "restoring identity from snapshot"
        );
        Self::from_parts(marshalled.parameters, provider, marshalled.key_pair)
    }
}

impl Identity<RustCryptoProvider> {
    /// Rebuild an identity from a snapshot with the default provider.
    pub fn unmarshal(marshalled: MarshalledIdentity<RustCryptoProvider>) -> Self {
        Self::unmarshal_with(marshalled, Arc::new(RustCryptoProvider))
    }
}
