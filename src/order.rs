//! Resource snapshots handed to callers.
//!
//! Orders and authorizations are server-owned: their state advances on the CA
//! side while the client only observes. Every client operation therefore
//! returns a *fresh* snapshot and never mutates one the caller already holds;
//! replacing state is an explicit decision of the caller.

use crate::api;

/// A point-in-time view of an ACME order, paired with its URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub(crate) url: String,
    pub(crate) api_order: api::Order,
}

impl Order {
    pub(crate) fn new(url: String, api_order: api::Order) -> Self {
        Order { url, api_order }
    }

    /// URL identifying this order, used for refreshes.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn status(&self) -> Option<api::OrderStatus> {
        self.api_order.status
    }

    /// All domain names in the order, in request order.
    pub fn domains(&self) -> Vec<&str> {
        self.api_order.domains()
    }

    /// The authorization URLs listed on the order, in the server's order.
    pub fn authorization_urls(&self) -> &[String] {
        self.api_order
            .authorizations
            .as_deref()
            .unwrap_or_default()
    }

    /// The underlying JSON object.
    pub fn api_order(&self) -> &api::Order {
        &self.api_order
    }
}

/// A point-in-time view of an ACME authorization, paired with its URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorization {
    pub(crate) url: String,
    pub(crate) api_auth: api::Authorization,
}

impl Authorization {
    pub(crate) fn new(url: String, api_auth: api::Authorization) -> Self {
        Authorization { url, api_auth }
    }

    /// URL identifying this authorization, used for refreshes.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn status(&self) -> api::AuthorizationStatus {
        self.api_auth.status
    }

    /// Domain name this authorization is the ownership proof for.
    pub fn domain_name(&self) -> &str {
        &self.api_auth.identifier.value
    }

    /// Returns true if this authorization was created for a wildcard domain.
    pub fn is_wildcard(&self) -> bool {
        self.api_auth.is_wildcard()
    }

    /// The challenges offered for this authorization.
    pub fn challenges(&self) -> &[api::Challenge] {
        &self.api_auth.challenges
    }

    /// Whether a challenge still needs to be fulfilled.
    ///
    /// The CA may remember a recent proof of ownership, in which case the
    /// authorization arrives already valid.
    pub fn need_challenge(&self) -> bool {
        !matches!(self.api_auth.status, api::AuthorizationStatus::Valid)
    }

    /// The underlying JSON object.
    pub fn api_auth(&self) -> &api::Authorization {
        &self.api_auth
    }
}
