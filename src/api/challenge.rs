use serde::{Deserialize, Serialize};

use crate::api;

/// The status of an [`api::Challenge`].
///
/// See [RFC 8555 §7.1.6].
///
/// [RFC 8555 §7.1.6]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.6
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeStatus {
    Pending,
    Processing,
    Valid,
    Invalid,
}

impl ChallengeStatus {
    /// Returns true once the server will no longer change this status on its
    /// own.
    pub fn is_terminal(self) -> bool {
        matches!(self, ChallengeStatus::Valid | ChallengeStatus::Invalid)
    }
}

/// An ACME challenge object.
///
/// Represents a server's offer to validate a client's possession of an
/// identifier in a specific way.
///
/// See [RFC 8555 §7.1.5].
///
/// # Example JSON
///
/// ```json
/// {
///   "type": "http-01",
///   "status": "pending",
///   "url": "https://example.com/acme/chall/prV_B7yEyA4",
///   "token": "MUi-gqeOJdRkSb_YR2eaMxQBqf6al8dgt_dOttSWb0w"
/// }
/// ```
///
/// [RFC 8555 §7.1.5]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.5
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    /// Type of challenge encoded in the object, e.g. `http-01`, `dns-01`,
    /// `tls-alpn-01`.
    #[serde(rename = "type")]
    pub _type: String,

    /// URL to which a response can be posted.
    pub url: String,

    pub status: ChallengeStatus,

    /// Time at which the server validated this challenge.
    ///
    /// Uses RFC 3339 format.
    pub validated: Option<String>,

    /// Error that occurred while the server was validating the challenge, if
    /// any.
    pub error: Option<api::Problem>,

    /// A random value that uniquely identifies the challenge.
    pub token: String,
}

impl Challenge {
    pub fn is_status_pending(&self) -> bool {
        self.status == ChallengeStatus::Pending
    }

    pub fn is_status_processing(&self) -> bool {
        self.status == ChallengeStatus::Processing
    }

    pub fn is_status_valid(&self) -> bool {
        self.status == ChallengeStatus::Valid
    }

    pub fn is_status_invalid(&self) -> bool {
        self.status == ChallengeStatus::Invalid
    }
}
