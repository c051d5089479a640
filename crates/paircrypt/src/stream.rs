//! Chunked stream encryption.
//!
//! A stream is a sequence of independent messages: every chunk is sealed with
//! its own random counter block and becomes one envelope, so chunk sizes may
//! vary freely and each envelope decrypts on its own.
//!
//! [`EncryptTransform`] and [`DecryptTransform`] are the per-chunk mappings.
//! Wiring them into a pipeline is left to a [`TransformStreamFactory`];
//! [`ChunkTransformer`] is the default one over `futures` streams.
//!
//! ```text
//! bytes ──> EncryptTransform ──> envelopes ──> (transport) ──> DecryptTransform ──> bytes
//! ```

use bytes::Bytes;
use futures_util::future;
use futures_util::stream::{BoxStream, Stream, StreamExt};
use paircrypt_core::{CounterLength, PeerId};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace, warn};

use crate::cipher::{open, seal};
use crate::error::SessionError;
use crate::identity::Identity;
use crate::provider::CryptoProvider;

/// Builds a chunk-by-chunk transform over an input stream.
pub trait TransformStreamFactory {
    /// Apply `map` to every item of `input`, in order.
    ///
    /// The returned stream must end right after yielding the first error.
    fn transform<'a, S, T, U, F>(&self, input: S, map: F) -> BoxStream<'a, Result<U, SessionError>>
    where
        S: Stream<Item = T> + Send + 'a,
        T: 'a,
        U: Send + 'a,
        F: FnMut(T) -> Result<U, SessionError> + Send + 'a;
}

/// Default [`TransformStreamFactory`]: a plain `map` that stops after the
/// first failed chunk. No buffering; backpressure is the consumer's.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChunkTransformer;

impl TransformStreamFactory for ChunkTransformer {
    fn transform<'a, S, T, U, F>(&self, input: S, map: F) -> BoxStream<'a, Result<U, SessionError>>
    where
        S: Stream<Item = T> + Send + 'a,
        T: 'a,
        U: Send + 'a,
        F: FnMut(T) -> Result<U, SessionError> + Send + 'a,
    {
        input
            .map(map)
            .scan(false, |failed, item| {
                if *failed {
                    return future::ready(None);
                }
                if let Err(e) = &item {
                    warn!(error = %e, "chunk failed, terminating stream");
                    *failed = true;
                }
                future::ready(Some(item))
            })
            .boxed()
    }
}

/// Encrypting stage: plaintext chunks in, envelopes out.
pub struct EncryptTransform<P: CryptoProvider> {
    provider: Arc<P>,
    key: P::SharedKey,
    counter_length: CounterLength,
    peer: PeerId,
}

impl<P: CryptoProvider> EncryptTransform<P> {
    pub fn peer(&self) -> &PeerId {
        &self.peer
    }

    /// Seal one chunk into an envelope.
    pub fn transform(&self, chunk: &[u8]) -> Result<String, SessionError> {
        trace!(peer = %self.peer, len = chunk.len(), "encrypting chunk");
        seal(&*self.provider, &self.key, self.counter_length, chunk)
    }

    /// Encrypt every chunk of `input` with [`ChunkTransformer`].
    pub fn pipe<'a, S, B>(self, input: S) -> BoxStream<'a, Result<String, SessionError>>
    where
        S: Stream<Item = B> + Send + 'a,
        B: AsRef<[u8]> + 'a,
    {
        self.pipe_with(&ChunkTransformer, input)
    }

    pub fn pipe_with<'a, F, S, B>(
        self,
        factory: &F,
        input: S,
    ) -> BoxStream<'a, Result<String, SessionError>>
    where
        F: TransformStreamFactory,
        S: Stream<Item = B> + Send + 'a,
        B: AsRef<[u8]> + 'a,
    {
        factory.transform(input, move |chunk: B| self.transform(chunk.as_ref()))
    }
}

/// Decrypting stage: envelopes in, plaintext chunks out.
pub struct DecryptTransform<P: CryptoProvider> {
    provider: Arc<P>,
    key: P::SharedKey,
    counter_length: CounterLength,
    peer: PeerId,
}

impl<P: CryptoProvider> DecryptTransform<P> {
    pub fn peer(&self) -> &PeerId {
        &self.peer
    }

    /// Open one envelope.
    pub fn transform(&self, envelope: &str) -> Result<Bytes, SessionError> {
        trace!(peer = %self.peer, len = envelope.len(), "decrypting chunk");
        open(&*self.provider, &self.key, self.counter_length, envelope).map(Bytes::from)
    }

    /// Decrypt every envelope of `input` with [`ChunkTransformer`].
    pub fn pipe<'a, S, E>(self, input: S) -> BoxStream<'a, Result<Bytes, SessionError>>
    where
        S: Stream<Item = E> + Send + 'a,
        E: AsRef<str> + 'a,
    {
        self.pipe_with(&ChunkTransformer, input)
    }

    pub fn pipe_with<'a, F, S, E>(
        self,
        factory: &F,
        input: S,
    ) -> BoxStream<'a, Result<Bytes, SessionError>>
    where
        F: TransformStreamFactory,
        S: Stream<Item = E> + Send + 'a,
        E: AsRef<str> + 'a,
    {
        factory.transform(input, move |envelope: E| self.transform(envelope.as_ref()))
    }
}

impl<P: CryptoProvider> fmt::Debug for EncryptTransform<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptTransform")
            .field("peer", &self.peer)
            .field("counter_length", &self.counter_length)
            .finish_non_exhaustive()
    }
}

impl<P: CryptoProvider> fmt::Debug for DecryptTransform<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptTransform")
            .field("peer", &self.peer)
            .field("counter_length", &self.counter_length)
            .finish_non_exhaustive()
    }
}

impl<P: CryptoProvider> Identity<P> {
    /// Encrypting stage for the default peer.
    pub fn encrypt_stream(&self) -> Result<EncryptTransform<P>, SessionError> {
        self.encrypt_stream_for(PeerId::Default)
    }

    /// Encrypting stage for `peer`.
    ///
    /// # Errors
    /// `NoSharedSecret`, before any chunk is read, if no secret was agreed
    /// with `peer`.
    pub fn encrypt_stream_for(
        &self,
        peer: impl Into<PeerId>,
    ) -> Result<EncryptTransform<P>, SessionError> {
        let peer = peer.into();
        let key = self.shared_secret(&peer)?;
        debug!(%peer, "opened encrypting stream");
        Ok(EncryptTransform {
            provider: Arc::clone(&self.provider),
            key,
            counter_length: self.parameters.counter_length,
            peer,
        })
    }

    /// Decrypting stage for the default peer.
    pub fn decrypt_stream(&self) -> Result<DecryptTransform<P>, SessionError> {
        self.decrypt_stream_for(PeerId::Default)
    }

    /// Decrypting stage for `peer`. Same precondition as
    /// [`encrypt_stream_for`](Identity::encrypt_stream_for).
    pub fn decrypt_stream_for(
        &self,
        peer: impl Into<PeerId>,
    ) -> Result<DecryptTransform<P>, SessionError> {
        let peer = peer.into();
        let key = self.shared_secret(&peer)?;
        debug!(%peer, "opened decrypting stream");
        Ok(DecryptTransform {
            provider: Arc::clone(&self.provider),
            key,
            counter_length: self.parameters.counter_length,
            peer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use paircrypt_core::{Envelope, Parameters};

    fn connected(name: &str) -> (Identity, Identity) {
        let sender = Identity::new(Parameters::default());
        let receiver = Identity::new(Parameters::default());
        sender.generate_key_pair(false, &[]).unwrap();
        receiver.generate_key_pair(false, &[]).unwrap();
        sender
            .set_remote_public_key_for(name, &receiver.export_public_key().unwrap())
            .unwrap();
        receiver
            .set_remote_public_key_for(name, &sender.export_public_key().unwrap())
            .unwrap();
        (sender, receiver)
    }

    #[test]
    fn test_one_envelope_per_chunk() {
        let (sender, receiver) = connected("peer");
        let encrypt = sender.encrypt_stream_for("peer").unwrap();
        let decrypt = receiver.decrypt_stream_for("peer").unwrap();

        let a = encrypt.transform(b"first").unwrap();
        let b = encrypt.transform(b"first").unwrap();
        assert_ne!(
            Envelope::decode(&a).unwrap().counter,
            Envelope::decode(&b).unwrap().counter
        );

        // Each envelope opens on its own, in any order.
        assert_eq!(decrypt.transform(&b).unwrap(), Bytes::from_static(b"first"));
        assert_eq!(decrypt.transform(&a).unwrap(), Bytes::from_static(b"first"));
    }

    #[test]
    fn test_stream_requires_secret_up_front() {
        let identity = Identity::new(Parameters::default());
        assert!(matches!(
            identity.encrypt_stream(),
            Err(SessionError::NoSharedSecret(PeerId::Default))
        ));
        assert!(matches!(
            identity.decrypt_stream_for("nobody"),
            Err(SessionError::NoSharedSecret(_))
        ));
    }

    #[tokio::test]
    async fn test_pipe_preserves_order() {
        let (sender, receiver) = connected("peer");
        let chunks: Vec<Vec<u8>> = (0u8..20).map(|i| vec![i; usize::from(i) * 7]).collect();

        let envelopes: Vec<String> = sender
            .encrypt_stream_for("peer")
            .unwrap()
            .pipe(stream::iter(chunks.clone()))
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(envelopes.len(), chunks.len());

        let decrypted: Vec<Bytes> = receiver
            .decrypt_stream_for("peer")
            .unwrap()
            .pipe(stream::iter(envelopes))
            .map(|r| r.unwrap())
            .collect()
            .await;

        let expected: Vec<Bytes> = chunks.into_iter().map(Bytes::from).collect();
        assert_eq!(decrypted, expected);
    }

    #[tokio::test]
    async fn test_failed_chunk_terminates_stream() {
        let (sender, receiver) = connected("peer");
        let encrypt = sender.encrypt_stream_for("peer").unwrap();
        let input = vec![
            encrypt.transform(b"one").unwrap(),
            "corrupted".to_string(),
            encrypt.transform(b"three").unwrap(),
        ];

        let results: Vec<_> = receiver
            .decrypt_stream_for("peer")
            .unwrap()
            .pipe(stream::iter(input))
            .collect()
            .await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap(), &Bytes::from_static(b"one"));
        assert!(results[1].is_err());
    }
}
