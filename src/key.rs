use pkcs8::{DecodePrivateKey as _, EncodePrivateKey as _};
use zeroize::Zeroizing;

use crate::error::Result;

/// Make a P-256 private key (from which we can derive a public key).
///
/// Suitable both as an account key and as a certificate key.
pub fn create_p256_key() -> p256::ecdsa::SigningKey {
    let csprng = &mut rand::thread_rng();
    ecdsa::SigningKey::from(p256::SecretKey::random(csprng))
}

/// The account key plus the account URL (`kid`) once one is known.
///
/// The key is only ever read to sign requests and to derive the public
/// JWK/thumbprint; it is never logged or persisted by this crate.
#[derive(Clone, Debug)]
pub(crate) struct AcmeKey {
    signing_key: p256::ecdsa::SigningKey,

    /// Set once we contacted the ACME API to figure out the key ID.
    key_id: Option<String>,
}

impl AcmeKey {
    pub(crate) fn new() -> AcmeKey {
        Self::from_key(create_p256_key())
    }

    pub(crate) fn from_key(signing_key: p256::ecdsa::SigningKey) -> AcmeKey {
        AcmeKey {
            signing_key,
            key_id: None,
        }
    }

    pub(crate) fn from_pem(pem: &str) -> Result<AcmeKey> {
        let pri_key = ecdsa::SigningKey::<p256::NistP256>::from_pkcs8_pem(pem)?;
        Ok(Self::from_key(pri_key))
    }

    pub(crate) fn to_pem(&self) -> Result<Zeroizing<String>> {
        Ok(self.signing_key.to_pkcs8_pem(pem::LineEnding::LF)?)
    }

    pub(crate) fn signing_key(&self) -> &p256::ecdsa::SigningKey {
        &self.signing_key
    }

    pub(crate) fn key_id(&self) -> Option<&str> {
        self.key_id.as_deref()
    }

    pub(crate) fn set_key_id(&mut self, kid: String) {
        self.key_id = Some(kid)
    }

    /// Replace the signing key, keeping the account URL.
    ///
    /// Used after a successful key rollover.
    pub(crate) fn set_signing_key(&mut self, signing_key: p256::ecdsa::SigningKey) {
        self.signing_key = signing_key;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pem_round_trip() {
        let key = AcmeKey::new();
        let pem = key.to_pem().unwrap();
        let restored = AcmeKey::from_pem(&pem).unwrap();
        assert_eq!(
            key.signing_key().to_bytes(),
            restored.signing_key().to_bytes()
        );
    }

    #[test]
    fn key_id_survives_key_swap() {
        let mut key = AcmeKey::new();
        key.set_key_id("https://example.com/acme/acct/1".to_owned());
        key.set_signing_key(create_p256_key());
        assert_eq!(key.key_id(), Some("https://example.com/acme/acct/1"));
    }
}
