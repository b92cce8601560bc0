use serde::{Deserialize, Serialize};

use crate::api;

/// The status of an [`api::Authorization`].
///
/// See [RFC 8555 §7.1.6].
///
/// [RFC 8555 §7.1.6]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.6
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorizationStatus {
    Pending,
    Valid,
    Invalid,
    Deactivated,
    Expired,
    Revoked,
}

impl AuthorizationStatus {
    /// Returns true once the server will no longer change this status on its
    /// own.
    pub fn is_terminal(self) -> bool {
        !matches!(self, AuthorizationStatus::Pending)
    }
}

/// An ACME authorization object.
///
/// Represents a server's authorization for an account to represent an
/// identifier.
///
/// See [RFC 8555 §7.1.4].
///
/// [RFC 8555 §7.1.4]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.4
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    /// The identifier that the account is authorized to represent.
    ///
    /// For authorizations created from a wildcard order identifier this holds
    /// the base domain, with [`wildcard`](Self::wildcard) set.
    pub identifier: api::Identifier,

    pub status: AuthorizationStatus,

    /// The timestamp after which the server will consider this authorization
    /// invalid.
    ///
    /// Uses RFC 3339 format. Required for objects in the "valid" state.
    pub expires: Option<String>,

    /// The challenges related to the identifier.
    ///
    /// - For pending authorizations, the challenges that the client can
    ///   fulfill in order to prove possession of the identifier.
    /// - For valid authorizations, the challenge that was validated.
    /// - For invalid authorizations, the challenge that was attempted and
    ///   failed.
    ///
    /// A server considers any one fulfilled challenge sufficient to make the
    /// authorization valid.
    pub challenges: Vec<api::Challenge>,

    /// Present and true for authorizations created from a wildcard DNS
    /// identifier.
    pub wildcard: Option<bool>,
}

impl Authorization {
    /// Returns true if this authorization was created for a wildcard domain.
    pub fn is_wildcard(&self) -> bool {
        self.wildcard.unwrap_or(false)
    }

    /// Returns an `http-01` challenge, if one is present.
    pub fn http_challenge(&self) -> Option<&api::Challenge> {
        self.challenges.iter().find(|c| c._type == "http-01")
    }

    /// Returns a `dns-01` challenge, if one is present.
    pub fn dns_challenge(&self) -> Option<&api::Challenge> {
        self.challenges.iter().find(|c| c._type == "dns-01")
    }

    /// Returns a `tls-alpn-01` challenge, if one is present.
    pub fn tls_alpn_challenge(&self) -> Option<&api::Challenge> {
        self.challenges.iter().find(|c| c._type == "tls-alpn-01")
    }
}
