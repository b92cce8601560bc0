//! RFC 8555 JSON payloads.
//!
//! These are the exact wire shapes exchanged with the ACME server. They are
//! validated by serde at the transport boundary so higher layers never see
//! malformed resources.

use std::fmt;

use serde::{
    ser::{SerializeMap as _, Serializer},
    Deserialize, Serialize,
};

mod account;
mod authorization;
mod challenge;
mod directory;
mod finalize;
mod identifier;
mod key_change;
mod order;
mod revocation;

pub use self::{
    account::{Account, AccountStatus},
    authorization::{Authorization, AuthorizationStatus},
    challenge::{Challenge, ChallengeStatus},
    directory::{Directory, DirectoryMeta},
    finalize::Finalize,
    identifier::Identifier,
    key_change::KeyChange,
    order::{Order, OrderStatus},
    revocation::Revocation,
};

/// Serializes to `""`.
///
/// Used for POST-as-GET requests, where the JWS payload is the empty string.
pub struct EmptyString;

impl Serialize for EmptyString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("")
    }
}

/// Serializes to `{}`.
///
/// Used to trigger challenge validation, where the JWS payload is an empty
/// JSON object.
pub struct EmptyObject;

impl Serialize for EmptyObject {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_map(Some(0))?.end()
    }
}

/// An `application/problem+json` error document.
///
/// See [RFC 8555 §6.7].
///
/// [RFC 8555 §6.7]: https://datatracker.ietf.org/doc/html/rfc8555#section-6.7
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    /// Error type URN, e.g. `urn:ietf:params:acme:error:badNonce`.
    #[serde(rename = "type")]
    pub _type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// HTTP status code of the response carrying this problem.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// Per-identifier failures, e.g. on multi-domain order rejection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subproblems: Option<Vec<Subproblem>>,
}

impl Problem {
    /// Returns true if the problem type is `badNonce`.
    ///
    /// This is the only problem the transport handles transparently (with a
    /// single retry).
    pub fn is_bad_nonce(&self) -> bool {
        self._type.ends_with(":badNonce")
    }

    /// Returns true if the problem type is `accountDoesNotExist`.
    pub fn is_account_does_not_exist(&self) -> bool {
        self._type.ends_with(":accountDoesNotExist")
    }

    /// Returns true if the problem type is `rateLimited`.
    pub fn is_rate_limited(&self) -> bool {
        self._type.ends_with(":rateLimited")
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{}: {detail}", self._type),
            None => write!(f, "{}", self._type),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subproblem {
    #[serde(rename = "type")]
    pub _type: String,
    pub detail: Option<String>,
    pub identifier: Option<Identifier>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_payload() {
        let json = serde_json::to_string(&EmptyString).unwrap();
        assert_eq!("\"\"", json);
    }

    #[test]
    fn empty_object_payload() {
        let json = serde_json::to_string(&EmptyObject).unwrap();
        assert_eq!("{}", json);
    }

    #[test]
    fn problem_type_predicates() {
        let problem = Problem {
            _type: "urn:ietf:params:acme:error:badNonce".to_owned(),
            ..Problem::default()
        };
        assert!(problem.is_bad_nonce());
        assert!(!problem.is_account_does_not_exist());

        // pre-RFC 8555 URN form used by some CAs
        let problem = Problem {
            _type: "urn:acme:error:badNonce".to_owned(),
            ..Problem::default()
        };
        assert!(problem.is_bad_nonce());
    }

    #[test]
    fn problem_deserializes_with_subproblems() {
        let json = r#"{
            "type": "urn:ietf:params:acme:error:malformed",
            "detail": "Some of the identifiers requested were rejected",
            "subproblems": [
                {
                    "type": "urn:ietf:params:acme:error:malformed",
                    "detail": "Invalid underscore in DNS name \"_example.org\"",
                    "identifier": { "type": "dns", "value": "_example.org" }
                }
            ]
        }"#;

        let problem = serde_json::from_str::<Problem>(json).unwrap();
        let subproblems = problem.subproblems.as_ref().unwrap();
        assert_eq!(subproblems.len(), 1);
        assert_eq!(
            subproblems[0].identifier.as_ref().unwrap().value,
            "_example.org"
        );
    }
}
