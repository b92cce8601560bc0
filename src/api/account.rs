use serde::{Deserialize, Serialize};

/// The status of an [`Account`].
///
/// `deactivated` indicates client-initiated deactivation, `revoked`
/// server-initiated deactivation.
///
/// See [RFC 8555 §7.1.6].
///
/// [RFC 8555 §7.1.6]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.6
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Pending,
    Valid,
    Deactivated,
    Revoked,
}

/// An ACME account object.
///
/// Doubles as the newAccount request payload, which is why every field is
/// optional and skipped when absent.
///
/// See [RFC 8555 §7.1.2].
///
/// # Example JSON
///
/// ```json
/// {
///   "status": "valid",
///   "contact": [
///     "mailto:cert-admin@example.com",
///     "mailto:admin@example.com"
///   ],
///   "termsOfServiceAgreed": true,
///   "orders": "https://example.com/acme/acct/evOfKhNU60wg/orders"
/// }
/// ```
///
/// [RFC 8555 §7.1.2]: https://datatracker.ietf.org/doc/html/rfc8555#section-7.1.2
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AccountStatus>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub terms_of_service_agreed: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub only_return_existing: Option<bool>,

    /// URL from which a list of orders submitted by this account can be
    /// fetched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orders: Option<String>,
}

impl Account {
    pub fn is_status_valid(&self) -> bool {
        self.status == Some(AccountStatus::Valid)
    }

    pub fn is_status_deactivated(&self) -> bool {
        self.status == Some(AccountStatus::Deactivated)
    }

    pub fn is_status_revoked(&self) -> bool {
        self.status == Some(AccountStatus::Revoked)
    }

    pub fn terms_of_service_agreed(&self) -> bool {
        self.terms_of_service_agreed.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_payload_skips_absent_fields() {
        let account = Account {
            only_return_existing: Some(true),
            ..Account::default()
        };
        let json = serde_json::to_string(&account).unwrap();
        assert_eq!(json, r#"{"onlyReturnExisting":true}"#);
    }

    #[test]
    fn status_round_trip() {
        let account =
            serde_json::from_str::<Account>(r#"{"status":"deactivated"}"#).unwrap();
        assert!(account.is_status_deactivated());
        assert!(!account.is_status_valid());
    }
}
