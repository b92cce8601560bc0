use serde::{Deserialize, Serialize};

/// Payload POSTed to an order's finalize URL.
///
/// See <https://datatracker.ietf.org/doc/html/rfc8555#section-7.4>.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finalize {
    /// Certificate Signing Request (CSR) in base64url-encoded DER.
    ///
    /// Note: not PEM, since headers are omitted.
    pub csr: String,
}
