use crate::api;

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by the ACME client.
///
/// The CA's own `application/problem+json` responses are carried inside the
/// [`Api`](Error::Api), [`AccountNotFound`](Error::AccountNotFound) and
/// [`OrderCreation`](Error::OrderCreation) variants so callers can inspect the
/// problem `type` URN and subproblems to decide their own retry policy.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Problem document returned by the ACME server.
    #[error("ACME API problem: {0}")]
    Api(api::Problem),

    /// Underlying HTTP transport failure (connect, TLS, timeout).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A response body did not parse as the expected resource shape.
    #[error("malformed response payload: {0}")]
    Json(#[from] serde_json::Error),

    /// The directory served by the CA does not contain the requested resource
    /// URL (e.g. `newAuthz` on CAs without pre-authorization).
    #[error("ACME directory has no \"{0}\" resource")]
    UnknownResource(&'static str),

    /// The directory advertises a terms-of-service document that the caller
    /// has not agreed to. Raised before any request is sent.
    #[error("terms of service ({terms_url}) have not been agreed to")]
    TermsNotAgreed { terms_url: String },

    /// An operation that signs with the account URL (`kid`) was attempted
    /// before an account was created or loaded.
    #[error("no account URL known; create or load an account first")]
    NoAccount,

    /// `only_return_existing` was set and the CA knows no account for the key.
    #[error("no existing account for this key: {0}")]
    AccountNotFound(api::Problem),

    /// The CA rejected a new-order request (rate limit, deactivated account,
    /// unsupported identifier, ...).
    #[error("order creation rejected: {0}")]
    OrderCreation(api::Problem),

    /// A mandatory response header was absent.
    #[error("missing response header: {0}")]
    MissingHeader(&'static str),

    /// Polling gave up before the resource reached a terminal status.
    ///
    /// Distinct from the resource reaching `invalid`, which is reported by
    /// returning the resource itself.
    #[error("polling budget exhausted; last seen status: {last_status}")]
    PollTimeout { last_status: String },

    /// A poll deadline passed before the resource reached a terminal status.
    #[error("polling cancelled by deadline")]
    Cancelled,

    /// PKCS#8 key decoding/encoding failure.
    #[error("key error: {0}")]
    Pkcs8(#[from] pkcs8::Error),

    /// DER encoding failure while building a CSR or inspecting a certificate.
    #[error("DER error: {0}")]
    Der(#[from] der::Error),

    /// Certificate handling failure: CSR building, chain parsing, or an
    /// issuance URL the order does not carry yet.
    #[error("certificate error: {0}")]
    Cert(String),
}

impl From<api::Problem> for Error {
    fn from(problem: api::Problem) -> Self {
        Error::Api(problem)
    }
}

impl Error {
    /// The CA problem document carried by this error, if any.
    pub fn problem(&self) -> Option<&api::Problem> {
        match self {
            Error::Api(problem)
            | Error::AccountNotFound(problem)
            | Error::OrderCreation(problem) => Some(problem),
            _ => None,
        }
    }
}
