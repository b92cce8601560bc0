//! JWS signing for ACME requests.
//!
//! See [RFC 8555 §6.2](https://datatracker.ietf.org/doc/html/rfc8555#section-6.2).

use base64::prelude::*;
use ecdsa::signature::Signer as _;
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

use crate::{error::Result, key::AcmeKey};

/// JWS Protected Header as constrained by [RFC 8555 §6.2].
///
/// > For newAccount requests, and for revokeCert requests authenticated by a
/// > certificate key, there MUST be a "jwk" field. This field MUST contain
/// > the public key corresponding to the private key used to sign the JWS.
/// >
/// > For all other requests, the request is signed using an existing account,
/// > and there MUST be a "kid" field. This field MUST contain the account URL
/// > received by POSTing to the newAccount resource.
///
/// The `nonce` field is optional only because the inner JWS of a key rollover
/// request must omit it.
///
/// [RFC 8555 §6.2]: https://datatracker.ietf.org/doc/html/rfc8555#section-6.2
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct JwsProtectedHeader {
    /// Signature algorithm. Always `ES256` for the P-256 account keys this
    /// crate uses.
    alg: String,

    /// Anti-replay token, single use. See [RFC 8555 §6.5].
    ///
    /// [RFC 8555 §6.5]: https://datatracker.ietf.org/doc/html/rfc8555#section-6.5
    #[serde(skip_serializing_if = "Option::is_none")]
    nonce: Option<String>,

    /// Target URL of the request, per [RFC 8555 §6.4].
    ///
    /// [RFC 8555 §6.4]: https://datatracker.ietf.org/doc/html/rfc8555#section-6.4
    url: String,

    /// JSON Web Key.
    ///
    /// Mutually exclusive with `kid` field.
    #[serde(skip_serializing_if = "Option::is_none")]
    jwk: Option<Jwk>,

    /// Key ID (the account URL).
    ///
    /// Mutually exclusive with `jwk` field.
    #[serde(skip_serializing_if = "Option::is_none")]
    kid: Option<String>,
}

impl JwsProtectedHeader {
    pub(crate) fn new_jwk(jwk: Jwk, url: &str, nonce: Option<String>) -> Self {
        JwsProtectedHeader {
            alg: "ES256".to_owned(),
            url: url.to_owned(),
            nonce,
            jwk: Some(jwk),
            ..Default::default()
        }
    }

    pub(crate) fn new_kid(kid: &str, url: &str, nonce: String) -> Self {
        JwsProtectedHeader {
            alg: "ES256".to_owned(),
            url: url.to_owned(),
            nonce: Some(nonce),
            kid: Some(kid.to_owned()),
            ..Default::default()
        }
    }
}

/// JSON Web Key representation of a P-256 public key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Jwk {
    alg: String,
    crv: String,
    kty: String,
    #[serde(rename = "use")]
    _use: String,
    x: String,
    y: String,
}

impl From<&AcmeKey> for Jwk {
    fn from(key: &AcmeKey) -> Self {
        let point = key.signing_key().verifying_key().to_encoded_point(false);

        // an uncompressed point always carries x and y
        let x = point.x().unwrap();
        let y = point.y().unwrap();

        Jwk {
            alg: "ES256".to_owned(),
            kty: "EC".to_owned(),
            crv: "P-256".to_owned(),
            _use: "sig".to_owned(),
            x: BASE64_URL_SAFE_NO_PAD.encode(x),
            y: BASE64_URL_SAFE_NO_PAD.encode(y),
        }
    }
}

/// The subset of [`Jwk`] fields hashed into the RFC 7638 thumbprint.
///
/// See <https://datatracker.ietf.org/doc/html/rfc7638#section-3.2>.
#[derive(Debug, Clone, Serialize, Deserialize)]
// LEXICAL ORDER OF FIELDS MATTER! serde emits fields in declaration order and
// the thumbprint requires lexicographically sorted keys.
pub(crate) struct JwkThumb {
    crv: String,
    kty: String,
    x: String,
    y: String,
}

impl From<&Jwk> for JwkThumb {
    fn from(a: &Jwk) -> Self {
        JwkThumb {
            crv: a.crv.clone(),
            kty: a.kty.clone(),
            x: a.x.clone(),
            y: a.y.clone(),
        }
    }
}

/// RFC 7638 JWK thumbprint of an account key: SHA-256 over the canonical
/// thumbprint JSON, base64url-encoded.
pub(crate) fn thumbprint(key: &AcmeKey) -> Result<String> {
    let jwk = Jwk::from(key);
    let jwk_thumb = JwkThumb::from(&jwk);
    let jwk_json = serde_json::to_string(&jwk_thumb)?;
    Ok(BASE64_URL_SAFE_NO_PAD.encode(Sha256::digest(jwk_json)))
}

/// Key authorization for a challenge: `token "." thumbprint(account key)`.
///
/// A pure function of its inputs; no server state is involved.
///
/// See <https://datatracker.ietf.org/doc/html/rfc8555#section-8.1>.
pub(crate) fn key_authorization(token: &str, key: &AcmeKey) -> Result<String> {
    Ok(format!("{token}.{}", thumbprint(key)?))
}

/// Flattened JSON JWS serialization.
///
/// See <https://datatracker.ietf.org/doc/html/rfc7515#section-7.2.2>.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct FlattenedJsonJws {
    protected: String,
    payload: String,
    signature: String,
}

/// Sign `payload` under `protected` with an ES256 key.
///
/// `None` produces the empty payload used by POST-as-GET requests, which is
/// the empty string rather than a base64url-encoded `""`.
pub(crate) fn sign<T: Serialize + ?Sized>(
    protected: JwsProtectedHeader,
    signing_key: &p256::ecdsa::SigningKey,
    payload: Option<&T>,
) -> Result<FlattenedJsonJws> {
    let protected = {
        let protected_json = serde_json::to_string(&protected)?;
        BASE64_URL_SAFE_NO_PAD.encode(protected_json)
    };

    let payload = match payload {
        Some(payload) => BASE64_URL_SAFE_NO_PAD.encode(serde_json::to_string(payload)?),
        None => String::new(),
    };

    let to_sign = format!("{protected}.{payload}");
    let signature: p256::ecdsa::Signature = signing_key.sign(to_sign.as_bytes());
    let signature = BASE64_URL_SAFE_NO_PAD.encode(signature.to_bytes());

    Ok(FlattenedJsonJws {
        protected,
        payload,
        signature,
    })
}
