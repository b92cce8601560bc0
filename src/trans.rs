use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use crate::{
    api,
    error::{Error, Result},
    jws::{self, Jwk, JwsProtectedHeader},
    key::AcmeKey,
    nonce::NoncePool,
    req::{req_handle_error, req_post},
};

/// How the protected header identifies the signing key.
#[derive(Clone, Copy)]
enum Identify {
    /// Embed the full public JWK. Only for key-establishing requests
    /// (newAccount, revokeCert by certificate key).
    Jwk,
    /// Reference the account URL. For everything after an account exists.
    Kid,
}

/// Signed request plumbing: resolve nonce, sign, POST, harvest the response
/// nonce, map problem documents.
///
/// Cheap to clone; underlying state is shared.
#[derive(Debug, Clone)]
pub(crate) struct Transport {
    http_client: reqwest::Client,
    nonce_pool: Arc<NoncePool>,
    key: Arc<RwLock<AcmeKey>>,
}

impl Transport {
    pub(crate) fn new(
        http_client: reqwest::Client,
        nonce_pool: Arc<NoncePool>,
        key: Arc<RwLock<AcmeKey>>,
    ) -> Self {
        Transport {
            http_client,
            nonce_pool,
            key,
        }
    }

    /// Make a call identified by the full JWK.
    ///
    /// Only needed before an account URL is known.
    pub(crate) async fn call_jwk<T>(&self, url: &str, body: Option<&T>) -> Result<reqwest::Response>
    where
        T: Serialize + ?Sized,
    {
        self.do_call(url, body, Identify::Jwk).await
    }

    /// Make a call identified by the account URL (`kid`).
    ///
    /// Fails with [`Error::NoAccount`] before any I/O when no account URL has
    /// been established yet.
    pub(crate) async fn call<T>(&self, url: &str, body: Option<&T>) -> Result<reqwest::Response>
    where
        T: Serialize + ?Sized,
    {
        self.do_call(url, body, Identify::Kid).await
    }

    /// POST-as-GET: an authenticated read with the empty payload.
    pub(crate) async fn get(&self, url: &str) -> Result<reqwest::Response> {
        self.call::<api::EmptyString>(url, None).await
    }

    async fn do_call<T>(
        &self,
        url: &str,
        body: Option<&T>,
        identify: Identify,
    ) -> Result<reqwest::Response>
    where
        T: Serialize + ?Sized,
    {
        // A nonce may be rejected if the server invalidated its pool; retry
        // exactly once with a fresh nonce, all other problems propagate.
        for attempt in 0.. {
            // Either get a new nonce, or reuse one from a previous request.
            // Whether or not the request succeeds, this one is spent.
            let nonce = self.nonce_pool.get_nonce().await?;

            let signed = {
                let key = self.key.read();
                let protected = match identify {
                    Identify::Jwk => {
                        JwsProtectedHeader::new_jwk(Jwk::from(&*key), url, Some(nonce))
                    }
                    Identify::Kid => {
                        let kid = key.key_id().ok_or(Error::NoAccount)?;
                        JwsProtectedHeader::new_kid(kid, url, nonce)
                    }
                };
                jws::sign(protected, key.signing_key(), body)?
            };

            log::debug!("call endpoint: {url}");

            let response = req_post(&self.http_client, url, serde_json::to_string(&signed)?).await?;

            // Regardless of the request being a success or not, there might be
            // a nonce in the response.
            self.nonce_pool.extract_nonce(&response);

            return match req_handle_error(response).await {
                Ok(response) => Ok(response),
                Err(problem) if problem.is_bad_nonce() && attempt == 0 => {
                    log::debug!("retrying once on bad nonce");
                    continue;
                }
                Err(problem) => Err(Error::Api(problem)),
            };
        }

        unreachable!("bounded retry loop always returns")
    }
}
