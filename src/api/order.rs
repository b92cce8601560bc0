use serde::{Deserialize, Serialize};

use crate::api;

/// The status of an [`api::Order`].
///
/// See [RFC 8555 §7.1.3].
///
/// [RFC 8555 §7.1.3]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.3
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Ready,
    Processing,
    Valid,
    Invalid,
}

/// An ACME order object.
///
/// Represents a client's request for a certificate and is used to track the
/// progress of that order through to issuance.
///
/// See [RFC 8555 §7.1.3].
///
/// # Example JSON
///
/// ```json
/// {
///   "status": "pending",
///   "expires": "2019-01-09T08:26:43.570360537Z",
///   "identifiers": [
///     {
///       "type": "dns",
///       "value": "acmetest.algesten.se"
///     }
///   ],
///   "authorizations": [
///     "https://example.com/acme/authz/YTqpYUthlVfwBncUufE8IRA2TkzZkN4eYWWLMSRqcSs"
///   ],
///   "finalize": "https://example.com/acme/finalize/7738992/18234324"
/// }
/// ```
///
/// [RFC 8555 §7.1.3]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.3
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,

    /// The timestamp after which the server considers this order invalid.
    ///
    /// Uses RFC 3339 format.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,

    pub identifiers: Vec<api::Identifier>,

    /// Requested `notBefore` value for the certificate, RFC 3339 format.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_before: Option<String>,

    /// Requested `notAfter` value for the certificate, RFC 3339 format.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_after: Option<String>,

    /// The error that occurred while processing the order, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<api::Problem>,

    /// For pending orders, the authorizations the client needs to complete.
    /// For final orders, the authorizations that were completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorizations: Option<Vec<String>>,

    /// URL a CSR must be POSTed to once all of the order's authorizations are
    /// satisfied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finalize: Option<String>,

    /// URL for the certificate that has been issued in response to this
    /// order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate: Option<String>,
}

impl Order {
    pub(crate) fn from_identifiers(identifiers: Vec<api::Identifier>) -> Self {
        Self {
            identifiers,
            ..Self::default()
        }
    }

    /// Returns true as long as there are outstanding authorizations.
    pub fn is_status_pending(&self) -> bool {
        self.status == Some(OrderStatus::Pending)
    }

    /// Returns true if all authorizations are finished and the CSR can be
    /// submitted.
    pub fn is_status_ready(&self) -> bool {
        self.status == Some(OrderStatus::Ready)
    }

    /// Returns true while the server is processing our CSR.
    pub fn is_status_processing(&self) -> bool {
        self.status == Some(OrderStatus::Processing)
    }

    /// Returns true if the certificate is issued and can be downloaded.
    pub fn is_status_valid(&self) -> bool {
        self.status == Some(OrderStatus::Valid)
    }

    /// Returns true if the order failed and can't be used again.
    pub fn is_status_invalid(&self) -> bool {
        self.status == Some(OrderStatus::Invalid)
    }

    /// All domain names in the order, in request order.
    pub fn domains(&self) -> Vec<&str> {
        self.identifiers
            .iter()
            .map(|identifier| identifier.value.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finalize_url_may_be_absent() {
        let json = r#"{
            "status": "processing",
            "identifiers": [{ "type": "dns", "value": "example.com" }]
        }"#;

        let order = serde_json::from_str::<Order>(json).unwrap();
        assert!(order.is_status_processing());
        assert_eq!(order.finalize, None);
    }
}
