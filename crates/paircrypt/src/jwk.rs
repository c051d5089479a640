//! JSON Web Key text for EC keys (RFC 7517 / RFC 7518).
//!
//! Coordinates and the private scalar are base64url without padding, each
//! exactly one field element long.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use paircrypt_core::NamedCurve;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, Zeroizing};

use crate::error::CryptoError;
use crate::provider::KeyUsage;

const KTY_EC: &str = "EC";

/// EC key in JWK form.
#[derive(Serialize, Deserialize)]
pub(crate) struct Jwk {
    pub kty: String,
    pub crv: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_ops: Option<Vec<KeyUsage>>,
    pub x: String,
    pub y: String,
}

impl Drop for Jwk {
    fn drop(&mut self) {
        if let Some(d) = self.d.as_mut() {
            d.zeroize();
        }
    }
}

impl Jwk {
    pub fn public(curve: NamedCurve, x: &[u8], y: &[u8]) -> Self {
        Self {
            kty: KTY_EC.to_string(),
            crv: curve.as_str().to_string(),
            d: None,
            ext: Some(true),
            key_ops: Some(Vec::new()),
            x: URL_SAFE_NO_PAD.encode(x),
            y: URL_SAFE_NO_PAD.encode(y),
        }
    }

    pub fn private(
        curve: NamedCurve,
        x: &[u8],
        y: &[u8],
        d: &[u8],
        extractable: bool,
        usages: &[KeyUsage],
    ) -> Self {
        let mut jwk = Self::public(curve, x, y);
        jwk.d = Some(URL_SAFE_NO_PAD.encode(d));
        jwk.ext = Some(extractable);
        jwk.key_ops = Some(usages.to_vec());
        jwk
    }

    /// Parse JWK text and check it is an EC key on `curve`.
    pub fn parse(text: &str, curve: NamedCurve) -> Result<Self, CryptoError> {
        let jwk: Jwk = serde_json::from_str(text)
            .map_err(|e| CryptoError::InvalidKey(format!("malformed JWK: {e}")))?;

        if jwk.kty != KTY_EC {
            return Err(CryptoError::InvalidKey(format!(
                "unsupported key type: {}",
                jwk.kty
            )));
        }
        if jwk.crv != curve.as_str() {
            return Err(CryptoError::CurveMismatch {
                expected: curve,
                actual: jwk.crv.clone(),
            });
        }

        Ok(jwk)
    }

    pub fn to_json(&self) -> Result<String, CryptoError> {
        serde_json::to_string(self).map_err(|e| CryptoError::InvalidKey(e.to_string()))
    }

    /// Uncompressed SEC1 point `04 || x || y`.
    pub fn sec1_point(&self, curve: NamedCurve) -> Result<Vec<u8>, CryptoError> {
        let x = decode_field_element(&self.x, curve, "x")?;
        let y = decode_field_element(&self.y, curve, "y")?;

        let mut point = Vec::with_capacity(1 + x.len() + y.len());
        point.push(0x04);
        point.extend_from_slice(&x);
        point.extend_from_slice(&y);
        Ok(point)
    }

    /// The private scalar, if present.
    pub fn scalar(&self, curve: NamedCurve) -> Result<Option<Zeroizing<Vec<u8>>>, CryptoError> {
        self.d
            .as_deref()
            .map(|d| decode_field_element(d, curve, "d").map(Zeroizing::new))
            .transpose()
    }
}

fn decode_field_element(
    encoded: &str,
    curve: NamedCurve,
    member: &str,
) -> Result<Vec<u8>, CryptoError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|_| CryptoError::InvalidKey(format!("invalid base64url in \"{member}\"")))?;

    if bytes.len() != curve.field_size() {
        return Err(CryptoError::InvalidKey(format!(
            "invalid \"{member}\" length: expected {} bytes, got {}",
            curve.field_size(),
            bytes.len()
        )));
    }

    Ok(bytes)
}
