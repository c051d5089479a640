//! Default [`CryptoProvider`] backed by the RustCrypto crates.
//!
//! - ECDH on P-256, P-384 and P-521 (`p256`, `p384`, `p521`)
//! - AES-128/192/256 in counter mode with a 64- or 128-bit counter (`aes`, `ctr`)
//! - Keys exchanged as JWK text
//! - Randomness from the OS CSPRNG
//!
//! The derived AES key is the leading `key_length` bits of the raw ECDH
//! x-coordinate, which matches what WebCrypto produces for
//! `deriveKey(ECDH → AES-CTR)`, so envelopes interoperate with browser peers.

use aes::{Aes128, Aes192, Aes256};
use ctr::cipher::{KeyIvInit, StreamCipher};
use ctr::{Ctr128BE, Ctr64BE};
use elliptic_curve::ecdh::diffie_hellman;
use elliptic_curve::sec1::{FromEncodedPoint, ModulusSize, ToEncodedPoint};
use elliptic_curve::{AffinePoint, CurveArithmetic, FieldBytesSize, PublicKey, SecretKey};
use paircrypt_core::{CounterLength, NamedCurve, COUNTER_LEN};
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use zeroize::Zeroizing;

use crate::error::CryptoError;
use crate::jwk::Jwk;
use crate::provider::{CryptoProvider, KeyHandle, KeyUsage, SharedKeySpec};

/// Usages of every derived AES key.
const SHARED_KEY_USAGES: [KeyUsage; 2] = [KeyUsage::Encrypt, KeyUsage::Decrypt];

/// RustCrypto-backed provider. Stateless.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustCryptoProvider;

#[derive(Clone)]
enum EcSecret {
    P256(p256::SecretKey),
    P384(p384::SecretKey),
    P521(p521::SecretKey),
}

#[derive(Clone, Debug)]
enum EcPublic {
    P256(p256::PublicKey),
    P384(p384::PublicKey),
    P521(p521::PublicKey),
}

/// ECDH private key handle. Exposes no key bytes.
#[derive(Clone)]
pub struct EcPrivateKey {
    secret: EcSecret,
    extractable: bool,
    usages: Vec<KeyUsage>,
}

/// ECDH public key handle.
#[derive(Clone, Debug)]
pub struct EcPublicKey {
    public: EcPublic,
}

/// Derived AES-CTR key. Never extractable.
#[derive(Clone)]
pub struct AesCtrKey {
    bytes: Zeroizing<Vec<u8>>,
}

impl EcSecret {
    fn generate(curve: NamedCurve) -> Self {
        match curve {
            NamedCurve::P256 => Self::P256(SecretKey::random(&mut OsRng)),
            NamedCurve::P384 => Self::P384(SecretKey::random(&mut OsRng)),
            NamedCurve::P521 => Self::P521(SecretKey::random(&mut OsRng)),
        }
    }

    fn from_scalar(curve: NamedCurve, d: &[u8]) -> Result<Self, CryptoError> {
        Ok(match curve {
            NamedCurve::P256 => Self::P256(secret_from_scalar(d)?),
            NamedCurve::P384 => Self::P384(secret_from_scalar(d)?),
            NamedCurve::P521 => Self::P521(secret_from_scalar(d)?),
        })
    }

    fn curve(&self) -> NamedCurve {
        match self {
            Self::P256(_) => NamedCurve::P256,
            Self::P384(_) => NamedCurve::P384,
            Self::P521(_) => NamedCurve::P521,
        }
    }

    fn public_key(&self) -> EcPublic {
        match self {
            Self::P256(secret) => EcPublic::P256(secret.public_key()),
            Self::P384(secret) => EcPublic::P384(secret.public_key()),
            Self::P521(secret) => EcPublic::P521(secret.public_key()),
        }
    }

    fn scalar(&self) -> Zeroizing<Vec<u8>> {
        match self {
            Self::P256(secret) => Zeroizing::new(secret.to_bytes().to_vec()),
            Self::P384(secret) => Zeroizing::new(secret.to_bytes().to_vec()),
            Self::P521(secret) => Zeroizing::new(secret.to_bytes().to_vec()),
        }
    }

    /// Raw ECDH shared secret (the x-coordinate of the shared point).
    fn agree(&self, public: &EcPublic) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        match (self, public) {
            (Self::P256(secret), EcPublic::P256(public)) => Ok(agree(secret, public)),
            (Self::P384(secret), EcPublic::P384(public)) => Ok(agree(secret, public)),
            (Self::P521(secret), EcPublic::P521(public)) => Ok(agree(secret, public)),
            _ => Err(CryptoError::CurveMismatch {
                expected: self.curve(),
                actual: public.curve().to_string(),
            }),
        }
    }
}

impl EcPublic {
    fn from_sec1(curve: NamedCurve, sec1: &[u8]) -> Result<Self, CryptoError> {
        Ok(match curve {
            NamedCurve::P256 => Self::P256(public_from_sec1(sec1)?),
            NamedCurve::P384 => Self::P384(public_from_sec1(sec1)?),
            NamedCurve::P521 => Self::P521(public_from_sec1(sec1)?),
        })
    }

    fn curve(&self) -> NamedCurve {
        match self {
            Self::P256(_) => NamedCurve::P256,
            Self::P384(_) => NamedCurve::P384,
            Self::P521(_) => NamedCurve::P521,
        }
    }

    /// Affine `(x, y)`, each one field element long.
    fn coordinates(&self) -> Result<(Vec<u8>, Vec<u8>), CryptoError> {
        match self {
            Self::P256(public) => coordinates(public),
            Self::P384(public) => coordinates(public),
            Self::P521(public) => coordinates(public),
        }
    }
}

fn secret_from_scalar<C: CurveArithmetic>(d: &[u8]) -> Result<SecretKey<C>, CryptoError> {
    SecretKey::from_slice(d).map_err(|_| CryptoError::InvalidKey("invalid private scalar".into()))
}

fn public_from_sec1<C>(sec1: &[u8]) -> Result<PublicKey<C>, CryptoError>
where
    C: CurveArithmetic,
    AffinePoint<C>: FromEncodedPoint<C> + ToEncodedPoint<C>,
    FieldBytesSize<C>: ModulusSize,
{
    PublicKey::from_sec1_bytes(sec1)
        .map_err(|_| CryptoError::InvalidKey("point is not on the curve".into()))
}

fn coordinates<C>(public: &PublicKey<C>) -> Result<(Vec<u8>, Vec<u8>), CryptoError>
where
    C: CurveArithmetic,
    AffinePoint<C>: FromEncodedPoint<C> + ToEncodedPoint<C>,
    FieldBytesSize<C>: ModulusSize,
{
    let point = public.to_encoded_point(false);
    match (point.x(), point.y()) {
        (Some(x), Some(y)) => Ok((x.to_vec(), y.to_vec())),
        _ => Err(CryptoError::InvalidKey("point has no affine coordinates".into())),
    }
}

fn agree<C: CurveArithmetic>(secret: &SecretKey<C>, public: &PublicKey<C>) -> Zeroizing<Vec<u8>> {
    let shared = diffie_hellman(secret.to_nonzero_scalar(), public.as_affine());
    Zeroizing::new(shared.raw_secret_bytes().to_vec())
}

/// ECDH private keys may only be used for derivation.
fn check_private_usages(usages: &[KeyUsage]) -> Result<(), CryptoError> {
    if let Some(&usage) = usages
        .iter()
        .find(|u| !matches!(u, KeyUsage::DeriveKey | KeyUsage::DeriveBits))
    {
        return Err(CryptoError::UsageNotPermitted(usage));
    }
    if usages.is_empty() {
        return Err(CryptoError::UsageNotPermitted(KeyUsage::DeriveKey));
    }
    Ok(())
}

fn apply_keystream(
    key: &AesCtrKey,
    counter: &[u8; COUNTER_LEN],
    counter_length: CounterLength,
    data: &mut [u8],
) -> Result<(), CryptoError> {
    let key = key.bytes.as_slice();
    match (key.len(), counter_length) {
        (16, CounterLength::Bits64) => ctr_apply::<Ctr64BE<Aes128>>(key, counter, data),
        (24, CounterLength::Bits64) => ctr_apply::<Ctr64BE<Aes192>>(key, counter, data),
        (32, CounterLength::Bits64) => ctr_apply::<Ctr64BE<Aes256>>(key, counter, data),
        (16, CounterLength::Bits128) => ctr_apply::<Ctr128BE<Aes128>>(key, counter, data),
        (24, CounterLength::Bits128) => ctr_apply::<Ctr128BE<Aes192>>(key, counter, data),
        (32, CounterLength::Bits128) => ctr_apply::<Ctr128BE<Aes256>>(key, counter, data),
        (len, _) => Err(CryptoError::KeyLength(len)),
    }
}

fn ctr_apply<C: KeyIvInit + StreamCipher>(
    key: &[u8],
    counter: &[u8; COUNTER_LEN],
    data: &mut [u8],
) -> Result<(), CryptoError> {
    let mut cipher =
        C::new_from_slices(key, counter).map_err(|_| CryptoError::KeyLength(key.len()))?;
    cipher
        .try_apply_keystream(data)
        .map_err(|_| CryptoError::CounterExhausted)
}

impl CryptoProvider for RustCryptoProvider {
    type PrivateKey = EcPrivateKey;
    type PublicKey = EcPublicKey;
    type SharedKey = AesCtrKey;

    fn generate_key_pair(
        &self,
        curve: NamedCurve,
        extractable: bool,
        usages: &[KeyUsage],
    ) -> Result<(EcPrivateKey, EcPublicKey), CryptoError> {
        check_private_usages(usages)?;

        let secret = EcSecret::generate(curve);
        let public = EcPublicKey {
            public: secret.public_key(),
        };
        let private = EcPrivateKey {
            secret,
            extractable,
            usages: usages.to_vec(),
        };
        Ok((private, public))
    }

    fn derive_shared_key(
        &self,
        private_key: &EcPrivateKey,
        peer_public_key: &EcPublicKey,
        spec: SharedKeySpec,
    ) -> Result<AesCtrKey, CryptoError> {
        if !private_key.allows(KeyUsage::DeriveKey) && !private_key.allows(KeyUsage::DeriveBits) {
            return Err(CryptoError::UsageNotPermitted(KeyUsage::DeriveKey));
        }
        if private_key.curve() != spec.curve {
            return Err(CryptoError::CurveMismatch {
                expected: spec.curve,
                actual: private_key.curve().to_string(),
            });
        }

        let shared = private_key.secret.agree(&peer_public_key.public)?;
        let len = spec.length.bytes();
        if shared.len() < len {
            return Err(CryptoError::KeyLength(len));
        }

        Ok(AesCtrKey {
            bytes: Zeroizing::new(shared[..len].to_vec()),
        })
    }

    fn encrypt(
        &self,
        key: &AesCtrKey,
        counter: &[u8; COUNTER_LEN],
        counter_length: CounterLength,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        if !key.allows(KeyUsage::Encrypt) {
            return Err(CryptoError::UsageNotPermitted(KeyUsage::Encrypt));
        }
        let mut buf = plaintext.to_vec();
        apply_keystream(key, counter, counter_length, &mut buf)?;
        Ok(buf)
    }

    fn decrypt(
        &self,
        key: &AesCtrKey,
        counter: &[u8; COUNTER_LEN],
        counter_length: CounterLength,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        if !key.allows(KeyUsage::Decrypt) {
            return Err(CryptoError::UsageNotPermitted(KeyUsage::Decrypt));
        }
        let mut buf = ciphertext.to_vec();
        apply_keystream(key, counter, counter_length, &mut buf)?;
        Ok(buf)
    }

    fn import_private_key(&self, text: &str, curve: NamedCurve) -> Result<EcPrivateKey, CryptoError> {
        let jwk = Jwk::parse(text, curve)?;
        let scalar = jwk
            .scalar(curve)?
            .ok_or_else(|| CryptoError::InvalidKey("missing private scalar \"d\"".into()))?;
        let secret = EcSecret::from_scalar(curve, &scalar)?;

        let (x, y) = secret.public_key().coordinates()?;
        let mut derived = Vec::with_capacity(1 + x.len() + y.len());
        derived.push(0x04);
        derived.extend_from_slice(&x);
        derived.extend_from_slice(&y);
        if derived != jwk.sec1_point(curve)? {
            return Err(CryptoError::InvalidKey(
                "private scalar does not match the public coordinates".into(),
            ));
        }

        let usages = jwk.key_ops.clone().unwrap_or_else(|| vec![KeyUsage::DeriveKey]);
        check_private_usages(&usages)?;

        Ok(EcPrivateKey {
            secret,
            extractable: jwk.ext.unwrap_or(false),
            usages,
        })
    }

    fn import_public_key(&self, text: &str, curve: NamedCurve) -> Result<EcPublicKey, CryptoError> {
        let jwk = Jwk::parse(text, curve)?;
        if jwk.d.is_some() {
            return Err(CryptoError::InvalidKey(
                "expected a public key, got a private key".into(),
            ));
        }
        let public = EcPublic::from_sec1(curve, &jwk.sec1_point(curve)?)?;
        Ok(EcPublicKey { public })
    }

    fn public_key(&self, private_key: &EcPrivateKey) -> Result<EcPublicKey, CryptoError> {
        Ok(EcPublicKey {
            public: private_key.secret.public_key(),
        })
    }

    fn export_private_key(&self, key: &EcPrivateKey) -> Result<Zeroizing<String>, CryptoError> {
        if !key.extractable {
            return Err(CryptoError::NotExtractable);
        }
        let (x, y) = key.secret.public_key().coordinates()?;
        let d = key.secret.scalar();
        let jwk = Jwk::private(key.curve(), &x, &y, &d, key.extractable, &key.usages);
        Ok(Zeroizing::new(jwk.to_json()?))
    }

    fn export_public_key(&self, key: &EcPublicKey) -> Result<String, CryptoError> {
        let (x, y) = key.public.coordinates()?;
        Jwk::public(key.curve(), &x, &y).to_json()
    }

    fn random_bytes(&self, count: usize) -> Result<Vec<u8>, CryptoError> {
        let mut buf = vec![0u8; count];
        OsRng
            .try_fill_bytes(&mut buf)
            .map_err(|e| CryptoError::Random(e.to_string()))?;
        Ok(buf)
    }
}

impl EcPrivateKey {
    pub fn curve(&self) -> NamedCurve {
        self.secret.curve()
    }
}

impl KeyHandle for EcPrivateKey {
    fn extractable(&self) -> bool {
        self.extractable
    }

    fn usages(&self) -> &[KeyUsage] {
        &self.usages
    }
}

impl fmt::Debug for EcPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EcPrivateKey")
            .field("curve", &self.curve())
            .field("extractable", &self.extractable)
            .field("usages", &self.usages)
            .finish_non_exhaustive()
    }
}

impl EcPublicKey {
    pub fn curve(&self) -> NamedCurve {
        self.public.curve()
    }
}

impl KeyHandle for EcPublicKey {
    fn extractable(&self) -> bool {
        true
    }

    fn usages(&self) -> &[KeyUsage] {
        &[]
    }
}

impl KeyHandle for AesCtrKey {
    fn extractable(&self) -> bool {
        false
    }

    fn usages(&self) -> &[KeyUsage] {
        &SHARED_KEY_USAGES
    }
}

impl fmt::Debug for AesCtrKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AesCtrKey")
            .field("bits", &(self.bytes.len() * 8))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paircrypt_core::KeyLength;

    fn decode_hex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    fn key_from_hex(s: &str) -> AesCtrKey {
        AesCtrKey {
            bytes: Zeroizing::new(decode_hex(s)),
        }
    }

    // NIST SP 800-38A, F.5.1 CTR-AES128.Encrypt (first two blocks).
    const SP800_38A_KEY: &str = "2b7e151628aed2a6abf7158809cf4f3c";
    const SP800_38A_COUNTER: &str = "f0f1f2f3f4f5f6f7f8f9fafbfcfdfeff";
    const SP800_38A_PLAINTEXT: &str =
        "6bc1bee22e409f96e93d7e117393172aae2d8a571e03ac9c9eb76fac45af8e51";
    const SP800_38A_CIPHERTEXT: &str =
        "874d6191b620e3261bef6864990db6ce9806f66b7970fdff8617187bb9fffdff";

    #[test]
    fn test_aes_ctr_known_answer() {
        let provider = RustCryptoProvider;
        let key = key_from_hex(SP800_38A_KEY);
        let counter: [u8; COUNTER_LEN] = decode_hex(SP800_38A_COUNTER).try_into().unwrap();
        let plaintext = decode_hex(SP800_38A_PLAINTEXT);

        for counter_length in [CounterLength::Bits64, CounterLength::Bits128] {
            let ciphertext = provider
                .encrypt(&key, &counter, counter_length, &plaintext)
                .unwrap();
            assert_eq!(ciphertext, decode_hex(SP800_38A_CIPHERTEXT));

            let decrypted = provider
                .decrypt(&key, &counter, counter_length, &ciphertext)
                .unwrap();
            assert_eq!(decrypted, plaintext);
        }
    }

    #[test]
    fn test_counter_length_controls_wraparound() {
        let provider = RustCryptoProvider;
        let key = key_from_hex(SP800_38A_KEY);
        let mut counter = [0xffu8; COUNTER_LEN];
        counter[0] = 0x01;
        let plaintext = [0u8; 48];

        let wrapped = provider
            .encrypt(&key, &counter, CounterLength::Bits64, &plaintext)
            .unwrap();
        let carried = provider
            .encrypt(&key, &counter, CounterLength::Bits128, &plaintext)
            .unwrap();

        // 64-bit: the low half wraps to zero and the nonce half stays put,
        // so the third block is keyed by 01ff..ff|00..01.
        let mut third = [0u8; COUNTER_LEN];
        third[..8].copy_from_slice(&counter[..8]);
        third[15] = 0x01;
        let expected = provider
            .encrypt(&key, &third, CounterLength::Bits128, &[0u8; 16])
            .unwrap();
        assert_eq!(wrapped[32..], expected[..]);

        // 128-bit: the carry reaches the top byte instead.
        let mut third = [0u8; COUNTER_LEN];
        third[0] = 0x02;
        third[15] = 0x01;
        let expected = provider
            .encrypt(&key, &third, CounterLength::Bits128, &[0u8; 16])
            .unwrap();
        assert_eq!(carried[32..], expected[..]);

        assert_eq!(wrapped[..16], carried[..16]);
        assert_ne!(wrapped[16..], carried[16..]);
    }

    #[test]
    fn test_ecdh_agreement_is_symmetric() {
        let provider = RustCryptoProvider;
        let usages = [KeyUsage::DeriveKey];

        for curve in [NamedCurve::P256, NamedCurve::P384, NamedCurve::P521] {
            let (a_priv, a_pub) = provider.generate_key_pair(curve, false, &usages).unwrap();
            let (b_priv, b_pub) = provider.generate_key_pair(curve, false, &usages).unwrap();
            let spec = SharedKeySpec {
                curve,
                length: KeyLength::Bits256,
            };

            let ab = provider.derive_shared_key(&a_priv, &b_pub, spec).unwrap();
            let ba = provider.derive_shared_key(&b_priv, &a_pub, spec).unwrap();
            assert_eq!(*ab.bytes, *ba.bytes);
            assert_eq!(ab.bytes.len(), 32);
        }
    }

    #[test]
    fn test_derive_rejects_mixed_curves() {
        let provider = RustCryptoProvider;
        let usages = [KeyUsage::DeriveKey];
        let (a_priv, _) = provider
            .generate_key_pair(NamedCurve::P256, false, &usages)
            .unwrap();
        let (_, b_pub) = provider
            .generate_key_pair(NamedCurve::P384, false, &usages)
            .unwrap();

        let result = provider.derive_shared_key(
            &a_priv,
            &b_pub,
            SharedKeySpec {
                curve: NamedCurve::P256,
                length: KeyLength::Bits128,
            },
        );
        assert!(matches!(result, Err(CryptoError::CurveMismatch { .. })));
    }

    #[test]
    fn test_private_usages_restricted_to_derivation() {
        let provider = RustCryptoProvider;
        let result = provider.generate_key_pair(
            NamedCurve::P256,
            false,
            &[KeyUsage::DeriveKey, KeyUsage::Encrypt],
        );
        assert!(matches!(
            result,
            Err(CryptoError::UsageNotPermitted(KeyUsage::Encrypt))
        ));
    }

    #[test]
    fn test_jwk_round_trip() {
        let provider = RustCryptoProvider;
        let (private, public) = provider
            .generate_key_pair(
                NamedCurve::P521,
                true,
                &[KeyUsage::DeriveKey, KeyUsage::DeriveBits],
            )
            .unwrap();

        let private_text = provider.export_private_key(&private).unwrap();
        let public_text = provider.export_public_key(&public).unwrap();

        let imported = provider
            .import_private_key(&private_text, NamedCurve::P521)
            .unwrap();
        assert!(imported.extractable());
        assert_eq!(
            imported.usages(),
            &[KeyUsage::DeriveKey, KeyUsage::DeriveBits]
        );
        assert_eq!(*imported.secret.scalar(), *private.secret.scalar());

        let imported_public = provider
            .import_public_key(&public_text, NamedCurve::P521)
            .unwrap();
        assert_eq!(
            imported_public.public.coordinates().unwrap(),
            public.public.coordinates().unwrap()
        );
    }

    #[test]
    fn test_non_extractable_export_refused() {
        let provider = RustCryptoProvider;
        let (private, _) = provider
            .generate_key_pair(NamedCurve::P256, false, &[KeyUsage::DeriveKey])
            .unwrap();
        assert!(matches!(
            provider.export_private_key(&private),
            Err(CryptoError::NotExtractable)
        ));
    }

    #[test]
    fn test_import_rejects_mismatched_scalar() {
        let provider = RustCryptoProvider;
        let usages = [KeyUsage::DeriveKey];
        let (a_priv, _) = provider
            .generate_key_pair(NamedCurve::P256, true, &usages)
            .unwrap();
        let (_, b_pub) = provider
            .generate_key_pair(NamedCurve::P256, true, &usages)
            .unwrap();

        let mut forged: serde_json::Value =
            serde_json::from_str(&provider.export_private_key(&a_priv).unwrap()).unwrap();
        let b: serde_json::Value =
            serde_json::from_str(&provider.export_public_key(&b_pub).unwrap()).unwrap();
        forged["x"] = b["x"].clone();
        forged["y"] = b["y"].clone();

        let result = provider.import_private_key(&forged.to_string(), NamedCurve::P256);
        assert!(matches!(result, Err(CryptoError::InvalidKey(_))));
    }

    #[test]
    fn test_public_import_refuses_private_jwk() {
        let provider = RustCryptoProvider;
        let (private, _) = provider
            .generate_key_pair(NamedCurve::P256, true, &[KeyUsage::DeriveKey])
            .unwrap();
        let text = provider.export_private_key(&private).unwrap();
        assert!(provider.import_public_key(&text, NamedCurve::P256).is_err());
    }

    #[test]
    fn test_random_bytes() {
        let provider = RustCryptoProvider;
        let a = provider.random_bytes(COUNTER_LEN).unwrap();
        let b = provider.random_bytes(COUNTER_LEN).unwrap();
        assert_eq!(a.len(), COUNTER_LEN);
        assert_ne!(a, b);
    }

    #[test]
    fn test_debug_hides_key_material() {
        let key = key_from_hex(SP800_38A_KEY);
        let rendered = format!("{key:?}");
        assert_eq!(rendered, "AesCtrKey { bits: 128, .. }");
    }
}
