use serde::{Deserialize, Serialize};

/// An identifier a certificate can be requested for.
///
/// Currently only `dns` identifiers (including wildcards) are in common use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    #[serde(rename = "type")]
    pub _type: String,
    pub value: String,
}

impl Identifier {
    /// A `dns` identifier for the given name.
    ///
    /// Wildcard names (`*.example.com`) are given verbatim; the server strips
    /// the wildcard label and sets the `wildcard` flag on the resulting
    /// authorization.
    pub fn dns(value: impl Into<String>) -> Self {
        Self {
            _type: "dns".to_owned(),
            value: value.into(),
        }
    }

    pub fn is_type_dns(&self) -> bool {
        self._type == "dns"
    }

    /// Returns true for a wildcard DNS identifier.
    pub fn is_wildcard(&self) -> bool {
        self.is_type_dns() && self.value.starts_with("*.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_detection() {
        assert!(Identifier::dns("*.example.com").is_wildcard());
        assert!(!Identifier::dns("example.com").is_wildcard());
    }
}
