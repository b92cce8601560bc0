use serde::Serialize;

use crate::jws::Jwk;

/// Inner payload of an account key rollover request.
///
/// This object is signed by the *new* account key into an inner JWS, which is
/// in turn wrapped by an outer JWS signed by the current key.
///
/// See [RFC 8555 §7.3.5].
///
/// [RFC 8555 §7.3.5]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.3.5
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyChange {
    /// URL of the account whose key is being changed.
    pub(crate) account: String,

    /// JWK of the key that is being replaced.
    pub(crate) old_key: Jwk,
}
