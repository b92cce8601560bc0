use std::sync::Arc;

use base64::prelude::*;
use futures_util::{stream, StreamExt as _, TryStreamExt as _};
use parking_lot::RwLock;
use pkcs8::EncodePrivateKey as _;
use serde::{de, Serialize};
use sha2::{Digest as _, Sha256};
use zeroize::Zeroizing;

use crate::{
    api,
    cert::Certificate,
    dir::{Directory, Resource},
    error::{Error, Result},
    jws::{self, Jwk, JwsProtectedHeader},
    key::AcmeKey,
    order::{Authorization, Order},
    poll::{retry_after, PollConfig},
    req::{read_json, req_expect_header},
    trans::Transport,
};

const LETSENCRYPT_URL: &str = "https://acme-v02.api.letsencrypt.org/directory";
const LETSENCRYPT_STAGING_URL: &str = "https://acme-staging-v02.api.letsencrypt.org/directory";

/// How many authorization fetches are in flight at once.
const AUTHZ_FETCH_CONCURRENCY: usize = 4;

/// Enumeration of known ACME API directories.
#[derive(Debug, Clone)]
pub enum DirectoryUrl<'a> {
    /// The main Let's Encrypt directory.
    ///
    /// Not appropriate for testing / development.
    LetsEncrypt,

    /// The staging Let's Encrypt directory.
    ///
    /// Use for testing and development. Doesn't issue "valid" certificates.
    /// The root signing certificate is not supposed to be in any trust
    /// chains.
    LetsEncryptStaging,

    /// Provide an arbitrary directory URL to connect to.
    Other(&'a str),
}

impl DirectoryUrl<'_> {
    fn to_url(&self) -> &str {
        match self {
            DirectoryUrl::LetsEncrypt => LETSENCRYPT_URL,
            DirectoryUrl::LetsEncryptStaging => LETSENCRYPT_STAGING_URL,
            DirectoryUrl::Other(url) => url,
        }
    }
}

/// Options for [`Client::create_account()`].
#[derive(Debug, Clone, Default)]
pub struct NewAccount {
    /// Contact URLs for the account, e.g. `mailto:hostmaster@example.com`.
    pub contact: Option<Vec<String>>,

    /// Agreement with the CA's terms of service.
    ///
    /// When the directory advertises a terms-of-service URL this must be set,
    /// or account creation fails locally without a request being sent.
    pub terms_of_service_agreed: bool,

    /// Only look up an existing account for the key; never create one.
    pub only_return_existing: bool,
}

/// Options for [`Client::update_account()`].
#[derive(Debug, Clone, Default)]
pub struct UpdateAccount {
    /// Replacement contact list.
    pub contact: Option<Vec<String>>,

    /// Request account deactivation. Terminal: the CA rejects all further
    /// operations for a deactivated account.
    pub status: Option<api::AccountStatus>,
}

/// Options for [`Client::create_order()`].
#[derive(Debug, Clone, Default)]
pub struct NewOrder {
    /// The identifiers the certificate should cover, including wildcards.
    pub identifiers: Vec<api::Identifier>,

    /// Requested `notBefore` certificate field, RFC 3339 format.
    pub not_before: Option<String>,

    /// Requested `notAfter` certificate field, RFC 3339 format.
    pub not_after: Option<String>,
}

impl NewOrder {
    /// An order for the given DNS names, deduplicated, request order kept.
    pub fn dns<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut identifiers = Vec::new();
        for name in names {
            let identifier = api::Identifier::dns(name);
            if !identifiers.contains(&identifier) {
                identifiers.push(identifier);
            }
        }
        NewOrder {
            identifiers,
            ..NewOrder::default()
        }
    }
}

/// A point-in-time view of the ACME account, paired with its URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    url: String,
    api_account: api::Account,
}

impl Account {
    /// The account URL, doubling as the JWS `kid` for all signed requests.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn status(&self) -> Option<api::AccountStatus> {
        self.api_account.status
    }

    pub fn contact(&self) -> Option<&[String]> {
        self.api_account.contact.as_deref()
    }

    /// The underlying JSON object.
    pub fn api_account(&self) -> &api::Account {
        &self.api_account
    }
}

/// Enumeration of reasons for revocation.
///
/// The reason codes are taken from [RFC 5280 §5.3.1].
///
/// [RFC 5280 §5.3.1]: https://tools.ietf.org/html/rfc5280#section-5.3.1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevocationReason {
    Unspecified = 0,
    KeyCompromise = 1,
    CACompromise = 2,
    AffiliationChanged = 3,
    Superseded = 4,
    CessationOfOperation = 5,
    CertificateHold = 6,
    // value 7 is not used
    RemoveFromCRL = 8,
    PrivilegeWithdrawn = 9,
    AACompromise = 10,
}

#[derive(Serialize)]
struct Deactivate {
    status: &'static str,
}

const DEACTIVATE: Deactivate = Deactivate {
    status: "deactivated",
};

/// Builder for [`Client`].
pub struct ClientBuilder<'a> {
    directory_url: DirectoryUrl<'a>,
    http_client: Option<reqwest::Client>,
    key: Option<AcmeKey>,
    account_url: Option<String>,
}

impl<'a> ClientBuilder<'a> {
    /// The HTTP client (and thereby pooling/TLS configuration) used for all
    /// requests to the CA. A default client is built when not provided.
    pub fn http_client(mut self, http_client: reqwest::Client) -> Self {
        self.http_client = Some(http_client);
        self
    }

    /// The account key. A fresh P-256 key is generated when not provided.
    pub fn account_key(mut self, signing_key: p256::ecdsa::SigningKey) -> Self {
        self.key = Some(AcmeKey::from_key(signing_key));
        self
    }

    /// The account key, from a PKCS#8 PEM string as exported by
    /// [`Client::account_key_pem()`].
    pub fn account_key_pem(mut self, pem: &str) -> Result<Self> {
        self.key = Some(AcmeKey::from_pem(pem)?);
        Ok(self)
    }

    /// A previously discovered account URL.
    ///
    /// Setting this skips the newAccount round trip for clients resuming with
    /// a persisted key + URL pair.
    pub fn account_url(mut self, url: impl Into<String>) -> Self {
        self.account_url = Some(url.into());
        self
    }

    pub fn build(self) -> Client {
        let mut key = self.key.unwrap_or_else(AcmeKey::new);
        if let Some(url) = self.account_url {
            key.set_key_id(url);
        }

        Client {
            http_client: self.http_client.unwrap_or_default(),
            directory_url: self.directory_url.to_url().to_owned(),
            key: Arc::new(RwLock::new(key)),
            dir: tokio::sync::RwLock::new(None),
        }
    }
}

/// An ACME (RFC 8555) protocol client.
///
/// One client holds one account key (replaceable through
/// [`update_account_key()`](Client::update_account_key)), a lazily fetched
/// directory and a pool of replay nonces. Everything else — orders,
/// authorizations, challenges — is returned to the caller as value snapshots
/// that are refreshed on demand and never mutated in place.
///
/// Methods take `&self`; a client can be shared and driven concurrently.
pub struct Client {
    http_client: reqwest::Client,
    directory_url: String,
    key: Arc<RwLock<AcmeKey>>,
    dir: tokio::sync::RwLock<Option<Arc<Directory>>>,
}

impl Client {
    /// A client with a freshly generated account key and default HTTP
    /// configuration.
    pub fn new(directory_url: DirectoryUrl<'_>) -> Client {
        Self::builder(directory_url).build()
    }

    pub fn builder(directory_url: DirectoryUrl<'_>) -> ClientBuilder<'_> {
        ClientBuilder {
            directory_url,
            http_client: None,
            key: None,
            account_url: None,
        }
    }

    /// The cached directory, fetching it on first use.
    async fn directory(&self) -> Result<Arc<Directory>> {
        {
            let dir = self.dir.read().await;
            if let Some(dir) = &*dir {
                return Ok(Arc::clone(dir));
            }
        }

        let mut slot = self.dir.write().await;

        // another task may have fetched while we waited for the write lock
        if let Some(dir) = &*slot {
            return Ok(Arc::clone(dir));
        }

        let dir = Arc::new(Directory::fetch(&self.http_client, &self.directory_url).await?);
        *slot = Some(Arc::clone(&dir));

        Ok(dir)
    }

    /// Re-fetch the directory document, replacing the cached one.
    ///
    /// Never done implicitly; operations already in flight keep using the
    /// URLs they resolved.
    pub async fn refresh_directory(&self) -> Result<()> {
        let dir = Arc::new(Directory::fetch(&self.http_client, &self.directory_url).await?);
        *self.dir.write().await = Some(dir);
        Ok(())
    }

    /// The directory document served by the CA.
    ///
    /// Useful for debugging.
    pub async fn api_directory(&self) -> Result<api::Directory> {
        Ok(self.directory().await?.api_directory().clone())
    }

    /// The CA's current terms-of-service URL, if it advertises one.
    pub async fn terms_of_service_url(&self) -> Result<Option<String>> {
        let dir = self.directory().await?;
        Ok(dir.api_directory().terms_of_service().map(str::to_owned))
    }

    async fn transport(&self) -> Result<Transport> {
        let dir = self.directory().await?;
        Ok(Transport::new(
            self.http_client.clone(),
            dir.nonce_pool(),
            Arc::clone(&self.key),
        ))
    }

    /// The account URL (`kid`) discovered during the most recent account
    /// create/load.
    pub fn account_url(&self) -> Result<String> {
        self.key
            .read()
            .key_id()
            .map(str::to_owned)
            .ok_or(Error::NoAccount)
    }

    /// The account's private key as PKCS#8 PEM.
    ///
    /// This is the caller's to persist; the client keeps nothing across
    /// restarts.
    pub fn account_key_pem(&self) -> Result<Zeroizing<String>> {
        self.key.read().to_pem()
    }

    /// Create a new account, or look up the existing one for the key.
    ///
    /// When the directory advertises a terms-of-service URL and
    /// `terms_of_service_agreed` is not set, this fails locally with
    /// [`Error::TermsNotAgreed`] before anything is sent.
    ///
    /// With `only_return_existing` set, a key unknown to the CA yields
    /// [`Error::AccountNotFound`]; an account is never created in that mode.
    pub async fn create_account(&self, new_account: NewAccount) -> Result<Account> {
        let dir = self.directory().await?;

        if let Some(terms_url) = dir.api_directory().terms_of_service() {
            if !new_account.terms_of_service_agreed {
                return Err(Error::TermsNotAgreed {
                    terms_url: terms_url.to_owned(),
                });
            }
        }

        let url = dir.resolve(Resource::NewAccount)?.to_owned();

        let payload = api::Account {
            contact: new_account.contact,
            terms_of_service_agreed: new_account.terms_of_service_agreed.then_some(true),
            only_return_existing: new_account.only_return_existing.then_some(true),
            ..api::Account::default()
        };

        let transport = self.transport().await?;
        let res = match transport.call_jwk(&url, Some(&payload)).await {
            Err(Error::Api(problem)) if problem.is_account_does_not_exist() => {
                return Err(Error::AccountNotFound(problem));
            }
            res => res?,
        };

        let kid =
            req_expect_header(&res, "location").ok_or(Error::MissingHeader("Location"))?;
        log::debug!("account URL (kid): {kid}");

        let api_account = read_json::<api::Account>(res).await?;

        self.key.write().set_key_id(kid.clone());

        Ok(Account {
            url: kid,
            api_account,
        })
    }

    /// Fetch the current account object (POST-as-GET).
    pub async fn account(&self) -> Result<Account> {
        let url = self.account_url()?;
        let transport = self.transport().await?;
        let res = transport.get(&url).await?;
        let api_account = read_json::<api::Account>(res).await?;
        Ok(Account { url, api_account })
    }

    /// Update the account's contact list, or deactivate it.
    ///
    /// Deactivation is terminal. The CA enforces this; subsequent operations
    /// fail with the CA's problem document, which is propagated unchanged.
    pub async fn update_account(&self, update: UpdateAccount) -> Result<Account> {
        let url = self.account_url()?;

        let payload = api::Account {
            contact: update.contact,
            status: update.status,
            ..api::Account::default()
        };

        let transport = self.transport().await?;
        let res = transport.call(&url, Some(&payload)).await?;
        let api_account = read_json::<api::Account>(res).await?;

        Ok(Account { url, api_account })
    }

    /// Deactivate the account. Terminal.
    pub async fn deactivate_account(&self) -> Result<Account> {
        self.update_account(UpdateAccount {
            status: Some(api::AccountStatus::Deactivated),
            ..UpdateAccount::default()
        })
        .await
    }

    /// Roll the account over to a new key (RFC 8555 §7.3.5).
    ///
    /// Builds the inner JWS signed by `new_key` (carrying the account URL and
    /// the old public JWK, no nonce) and wraps it in an outer JWS signed by
    /// the current key. Only on success does the client start signing with
    /// `new_key`; on failure the old key stays active.
    pub async fn update_account_key(
        &self,
        new_key: p256::ecdsa::SigningKey,
    ) -> Result<Account> {
        let dir = self.directory().await?;
        let url = dir.resolve(Resource::KeyChange)?.to_owned();
        let account_url = self.account_url()?;

        let new_acme_key = AcmeKey::from_key(new_key.clone());

        let inner = {
            let old_jwk = Jwk::from(&*self.key.read());
            let protected =
                JwsProtectedHeader::new_jwk(Jwk::from(&new_acme_key), &url, None);
            let payload = api::KeyChange {
                account: account_url.clone(),
                old_key: old_jwk,
            };
            jws::sign(protected, new_acme_key.signing_key(), Some(&payload))?
        };

        let transport = self.transport().await?;
        transport.call(&url, Some(&inner)).await?;

        log::debug!("account key rolled over");
        self.key.write().set_signing_key(new_key);

        // confirm with a fresh snapshot signed by the new key
        self.account().await
    }

    /// Create a certificate order for the given identifiers.
    ///
    /// CA rejections (rate limits, deactivated account, unsupported
    /// identifiers) surface as [`Error::OrderCreation`] carrying the problem
    /// document; retrying is deliberately left to the caller.
    pub async fn create_order(&self, new_order: NewOrder) -> Result<Order> {
        let dir = self.directory().await?;
        let url = dir.resolve(Resource::NewOrder)?.to_owned();

        let payload = api::Order {
            not_before: new_order.not_before,
            not_after: new_order.not_after,
            ..api::Order::from_identifiers(new_order.identifiers)
        };

        let transport = self.transport().await?;
        let res = match transport.call(&url, Some(&payload)).await {
            Err(Error::Api(problem)) => return Err(Error::OrderCreation(problem)),
            res => res?,
        };

        let order_url =
            req_expect_header(&res, "location").ok_or(Error::MissingHeader("Location"))?;
        let api_order = read_json::<api::Order>(res).await?;

        Ok(Order::new(order_url, api_order))
    }

    /// Refresh an order (POST-as-GET), returning a fresh snapshot.
    pub async fn order(&self, order: &Order) -> Result<Order> {
        let transport = self.transport().await?;
        let res = transport.get(order.url()).await?;
        let api_order = read_json::<api::Order>(res).await?;
        Ok(Order::new(order.url().to_owned(), api_order))
    }

    /// Fetch all authorizations listed on the order, in the order's own
    /// listing order.
    ///
    /// Fetches run as a bounded concurrent fan-out; results keep their
    /// position.
    pub async fn authorizations(&self, order: &Order) -> Result<Vec<Authorization>> {
        let transport = self.transport().await?;

        stream::iter(order.authorization_urls().iter().cloned().map(|url| {
            let transport = transport.clone();
            async move {
                let res = transport.get(&url).await?;
                let api_auth = read_json::<api::Authorization>(res).await?;
                Ok::<_, Error>(Authorization::new(url, api_auth))
            }
        }))
        .buffered(AUTHZ_FETCH_CONCURRENCY)
        .try_collect()
        .await
    }

    /// The key authorization for a challenge:
    /// `token "." base64url(sha256(JWK thumbprint))`.
    ///
    /// A pure function of the challenge token and the account key; no request
    /// is made. This is the value to serve for `http-01` challenges.
    pub fn challenge_key_authorization(&self, challenge: &api::Challenge) -> Result<String> {
        jws::key_authorization(&challenge.token, &self.key.read())
    }

    /// The TXT record content for a `dns-01` challenge:
    /// `base64url(sha256(key authorization))`.
    pub fn dns_challenge_proof(&self, challenge: &api::Challenge) -> Result<String> {
        let key_auth = self.challenge_key_authorization(challenge)?;
        Ok(BASE64_URL_SAFE_NO_PAD.encode(Sha256::digest(key_auth)))
    }

    /// The certificate extension digest for a `tls-alpn-01` challenge:
    /// `sha256(key authorization)`.
    pub fn tls_alpn_challenge_proof(&self, challenge: &api::Challenge) -> Result<[u8; 32]> {
        let key_auth = self.challenge_key_authorization(challenge)?;
        Ok(Sha256::digest(key_auth).into())
    }

    /// Tell the CA the challenge proof is in place and validation can start.
    ///
    /// Does not poll; follow up with
    /// [`poll_challenge()`](Client::poll_challenge) or
    /// [`poll_authorization()`](Client::poll_authorization).
    pub async fn complete_challenge(&self, challenge: &api::Challenge) -> Result<api::Challenge> {
        let transport = self.transport().await?;
        let res = transport
            .call(&challenge.url, Some(&api::EmptyObject))
            .await?;
        read_json(res).await
    }

    /// Deactivate an authorization. Terminal: it can never again be used for
    /// issuance, and its challenges fail from here on.
    pub async fn deactivate_authorization(
        &self,
        auth: &Authorization,
    ) -> Result<Authorization> {
        let transport = self.transport().await?;
        let res = transport.call(auth.url(), Some(&DEACTIVATE)).await?;
        let api_auth = read_json::<api::Authorization>(res).await?;
        Ok(Authorization::new(auth.url().to_owned(), api_auth))
    }

    /// Submit the CSR (DER bytes) to the order's finalize URL.
    ///
    /// Requires all of the order's authorizations to be valid; the CA rejects
    /// a premature finalize and drives the order to `invalid`.
    pub async fn finalize_order(&self, order: &Order, csr_der: &[u8]) -> Result<Order> {
        let finalize_url = order
            .api_order
            .finalize
            .as_deref()
            .ok_or_else(|| Error::Cert("order has no finalize URL".to_owned()))?;

        let payload = api::Finalize {
            csr: BASE64_URL_SAFE_NO_PAD.encode(csr_der),
        };

        let transport = self.transport().await?;
        let res = transport.call(finalize_url, Some(&payload)).await?;
        let api_order = read_json::<api::Order>(res).await?;

        Ok(Order::new(order.url().to_owned(), api_order))
    }

    /// Download the certificate chain (PEM) for a valid order.
    pub async fn certificate(&self, order: &Order) -> Result<String> {
        let cert_url = order
            .api_order
            .certificate
            .as_deref()
            .ok_or_else(|| Error::Cert("order has no certificate URL yet".to_owned()))?;

        let transport = self.transport().await?;
        let res = transport.get(cert_url).await?;
        Ok(crate::req::req_safe_read_body(res).await)
    }

    /// Download the certificate chain and bundle it with its private key.
    pub async fn download_certificate(
        &self,
        order: &Order,
        private_key: &p256::ecdsa::SigningKey,
    ) -> Result<Certificate> {
        let chain = self.certificate(order).await?;
        let private_key_pem = private_key.to_pkcs8_pem(pem::LineEnding::LF)?;
        Ok(Certificate::new(private_key_pem, chain))
    }

    /// Revoke a certificate (DER bytes) for the reason given.
    pub async fn revoke_certificate(
        &self,
        cert_der: &[u8],
        reason: RevocationReason,
    ) -> Result<()> {
        let dir = self.directory().await?;
        let url = dir.resolve(Resource::RevokeCert)?.to_owned();

        let reason = match reason {
            // > the reason code CRL entry extension SHOULD be absent instead
            // > of using the unspecified (0) reasonCode value
            // see <https://datatracker.ietf.org/doc/html/rfc5280#section-5.3.1>
            RevocationReason::Unspecified => None,
            reason => Some(reason as usize),
        };

        let payload = api::Revocation::new(BASE64_URL_SAFE_NO_PAD.encode(cert_der), reason);

        let transport = self.transport().await?;
        transport.call(&url, Some(&payload)).await?;

        Ok(())
    }

    /// Poll an order until it leaves `pending`/`processing`.
    pub async fn poll_order(&self, order: &Order, config: &PollConfig) -> Result<Order> {
        let api_order = self
            .poll_loop::<api::Order>(
                order.url(),
                config,
                |order| {
                    matches!(
                        order.status,
                        None | Some(api::OrderStatus::Pending) | Some(api::OrderStatus::Processing)
                    )
                },
                |order| match order.status {
                    Some(status) => format!("{status:?}"),
                    None => "unknown".to_owned(),
                },
            )
            .await?;

        Ok(Order::new(order.url().to_owned(), api_order))
    }

    /// Poll an authorization until it leaves `pending`.
    pub async fn poll_authorization(
        &self,
        auth: &Authorization,
        config: &PollConfig,
    ) -> Result<Authorization> {
        let api_auth = self
            .poll_loop::<api::Authorization>(
                auth.url(),
                config,
                |auth| !auth.status.is_terminal(),
                |auth| format!("{:?}", auth.status),
            )
            .await?;

        Ok(Authorization::new(auth.url().to_owned(), api_auth))
    }

    /// Poll a challenge until it leaves `pending`/`processing`.
    pub async fn poll_challenge(
        &self,
        challenge: &api::Challenge,
        config: &PollConfig,
    ) -> Result<api::Challenge> {
        self.poll_loop::<api::Challenge>(
            &challenge.url,
            config,
            |challenge| !challenge.status.is_terminal(),
            |challenge| format!("{:?}", challenge.status),
        )
        .await
    }

    /// Shared poll loop: POST-as-GET the resource until `still_pending` turns
    /// false, waiting `Retry-After` (or the configured interval) in between.
    ///
    /// Exhausting the attempt budget is a poll timeout; passing the deadline
    /// is a cancellation. A resource settling on a failure status is *not* an
    /// error here: the snapshot is returned and the caller reads the status.
    async fn poll_loop<T: de::DeserializeOwned>(
        &self,
        url: &str,
        config: &PollConfig,
        still_pending: impl Fn(&T) -> bool,
        status_of: impl Fn(&T) -> String,
    ) -> Result<T> {
        let transport = self.transport().await?;
        let mut last_status = "unknown".to_owned();

        for attempt in 0..config.max_attempts {
            if let Some(deadline) = config.deadline {
                if tokio::time::Instant::now() >= deadline {
                    return Err(Error::Cancelled);
                }
            }

            let res = transport.get(url).await?;
            let wait = retry_after(res.headers()).unwrap_or(config.interval);
            let resource = read_json::<T>(res).await?;

            if !still_pending(&resource) {
                return Ok(resource);
            }

            last_status = status_of(&resource);
            log::debug!("{url} not done (status {last_status}), waiting {wait:?}");

            if attempt + 1 < config.max_attempts {
                match config.deadline {
                    Some(deadline) if tokio::time::Instant::now() + wait >= deadline => {
                        tokio::time::sleep_until(deadline).await;
                        return Err(Error::Cancelled);
                    }
                    _ => tokio::time::sleep(wait).await,
                }
            }
        }

        Err(Error::PollTimeout { last_status })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{cert::create_csr_der, key::create_p256_key, test::with_directory_server};

    fn client_for(server: &crate::test::TestServer) -> Client {
        Client::new(DirectoryUrl::Other(&server.dir_url))
    }

    fn agreed() -> NewAccount {
        NewAccount {
            terms_of_service_agreed: true,
            ..NewAccount::default()
        }
    }

    fn fast_poll() -> PollConfig {
        PollConfig::new(Duration::from_millis(10), 10)
    }

    async fn account_with_ready_order(
        server: &crate::test::TestServer,
    ) -> (Client, Order) {
        let client = client_for(server);
        client.create_account(agreed()).await.unwrap();

        let order = client
            .create_order(NewOrder::dns(["example.com"]))
            .await
            .unwrap();

        for auth in client.authorizations(&order).await.unwrap() {
            let challenge = auth.api_auth().http_challenge().unwrap();
            client.complete_challenge(challenge).await.unwrap();
        }

        let order = client.order(&order).await.unwrap();
        assert_eq!(order.status(), Some(api::OrderStatus::Ready));

        (client, order)
    }

    #[tokio::test]
    async fn terms_must_be_agreed_before_any_request() {
        let server = with_directory_server();
        let client = client_for(&server);

        let err = client
            .create_account(NewAccount::default())
            .await
            .unwrap_err();

        match err {
            Error::TermsNotAgreed { terms_url } => assert!(terms_url.ends_with("/terms")),
            err => panic!("unexpected error: {err}"),
        }

        // nothing reached the CA
        assert!(server.state.lock().accounts.is_empty());
    }

    #[tokio::test]
    async fn terms_free_directory_needs_no_agreement() {
        let server = with_directory_server();
        server.state.lock().omit_terms = true;

        let client = client_for(&server);
        assert_eq!(client.terms_of_service_url().await.unwrap(), None);

        let account = client
            .create_account(NewAccount::default())
            .await
            .unwrap();
        assert_eq!(account.status(), Some(api::AccountStatus::Valid));
    }

    #[tokio::test]
    async fn create_account_establishes_kid() {
        let server = with_directory_server();
        let client = client_for(&server);

        let account = client
            .create_account(NewAccount {
                contact: Some(vec!["mailto:admin@example.com".to_owned()]),
                ..agreed()
            })
            .await
            .unwrap();

        assert_eq!(account.status(), Some(api::AccountStatus::Valid));
        assert_eq!(account.contact(), Some(&["mailto:admin@example.com".to_owned()][..]));
        assert_eq!(client.account_url().unwrap(), account.url());
    }

    #[tokio::test]
    async fn only_return_existing_finds_and_refuses() {
        let server = with_directory_server();
        let key = create_p256_key();

        let client = Client::builder(DirectoryUrl::Other(&server.dir_url))
            .account_key(key.clone())
            .build();
        let created = client.create_account(agreed()).await.unwrap();

        // same key on a fresh client finds the same account
        let resumed = Client::builder(DirectoryUrl::Other(&server.dir_url))
            .account_key(key)
            .build();
        let found = resumed
            .create_account(NewAccount {
                only_return_existing: true,
                ..agreed()
            })
            .await
            .unwrap();
        assert_eq!(found.url(), created.url());

        // an unknown key is never registered in this mode
        let unknown = client_for(&server);
        let err = unknown
            .create_account(NewAccount {
                only_return_existing: true,
                ..agreed()
            })
            .await
            .unwrap_err();

        match err {
            Error::AccountNotFound(problem) => assert!(problem.is_account_does_not_exist()),
            err => panic!("unexpected error: {err}"),
        }
        assert_eq!(server.state.lock().accounts.len(), 1);
    }

    #[tokio::test]
    async fn resumes_from_persisted_key_and_url() {
        let server = with_directory_server();
        let client = client_for(&server);
        let created = client.create_account(agreed()).await.unwrap();

        let pem = client.account_key_pem().unwrap();

        let resumed = Client::builder(DirectoryUrl::Other(&server.dir_url))
            .account_key_pem(&pem)
            .unwrap()
            .account_url(created.url())
            .build();

        // no newAccount round trip needed
        let account = resumed.account().await.unwrap();
        assert_eq!(account.status(), Some(api::AccountStatus::Valid));
    }

    #[tokio::test]
    async fn deactivated_account_is_refused_orders() {
        let server = with_directory_server();
        let client = client_for(&server);
        client.create_account(agreed()).await.unwrap();

        let account = client.deactivate_account().await.unwrap();
        assert_eq!(account.status(), Some(api::AccountStatus::Deactivated));

        let err = client
            .create_order(NewOrder::dns(["example.com"]))
            .await
            .unwrap_err();

        match err {
            Error::OrderCreation(problem) => {
                assert_eq!(problem._type, "urn:ietf:params:acme:error:unauthorized");
            }
            err => panic!("unexpected error: {err}"),
        }
    }

    #[tokio::test]
    async fn order_lists_authorizations_in_order() {
        let server = with_directory_server();
        let client = client_for(&server);
        client.create_account(agreed()).await.unwrap();

        let order = client
            .create_order(NewOrder::dns(["example.com", "*.example.com"]))
            .await
            .unwrap();

        assert_eq!(order.status(), Some(api::OrderStatus::Pending));
        assert_eq!(order.domains(), ["example.com", "*.example.com"]);

        let auths = client.authorizations(&order).await.unwrap();
        assert_eq!(auths.len(), 2);

        assert_eq!(auths[0].domain_name(), "example.com");
        assert!(!auths[0].is_wildcard());
        assert!(auths[0].api_auth().http_challenge().is_some());

        // wildcard authorizations only offer dns-01
        assert_eq!(auths[1].domain_name(), "example.com");
        assert!(auths[1].is_wildcard());
        assert!(auths[1].api_auth().http_challenge().is_none());
        assert!(auths[1].api_auth().dns_challenge().is_some());
    }

    #[tokio::test]
    async fn challenge_proofs_are_pure_and_stable() {
        let server = with_directory_server();
        let client = client_for(&server);
        client.create_account(agreed()).await.unwrap();

        let order = client
            .create_order(NewOrder::dns(["example.com"]))
            .await
            .unwrap();
        let auths = client.authorizations(&order).await.unwrap();
        let challenge = auths[0].api_auth().http_challenge().unwrap();

        let key_auth = client.challenge_key_authorization(challenge).unwrap();
        assert_eq!(key_auth, client.challenge_key_authorization(challenge).unwrap());
        assert!(key_auth.starts_with(&format!("{}.", challenge.token)));

        let txt = client.dns_challenge_proof(challenge).unwrap();
        assert!(!txt.contains('='));
        assert_eq!(client.tls_alpn_challenge_proof(challenge).unwrap().len(), 32);
    }

    #[tokio::test]
    async fn completed_challenges_make_the_order_ready() {
        let server = with_directory_server();
        let (client, order) = account_with_ready_order(&server).await;

        let auths = client.authorizations(&order).await.unwrap();
        assert!(auths.iter().all(|auth| {
            auth.status() == api::AuthorizationStatus::Valid && !auth.need_challenge()
        }));
    }

    #[tokio::test]
    async fn finalize_and_download_certificate() {
        let server = with_directory_server();
        let (client, order) = account_with_ready_order(&server).await;

        let cert_key = create_p256_key();
        let csr = create_csr_der(&cert_key, &["example.com"]).unwrap();

        let order = client.finalize_order(&order, &csr).await.unwrap();
        assert_eq!(order.status(), Some(api::OrderStatus::Processing));

        let order = client.poll_order(&order, &fast_poll()).await.unwrap();
        assert_eq!(order.status(), Some(api::OrderStatus::Valid));

        let pem = client.certificate(&order).await.unwrap();
        assert!(pem.contains("BEGIN CERTIFICATE"));

        let cert = client.download_certificate(&order, &cert_key).await.unwrap();
        assert!(cert.private_key().contains("BEGIN PRIVATE KEY"));
        assert_eq!(cert.certificate(), pem);
    }

    #[tokio::test]
    async fn finalize_requires_a_finalize_url() {
        // the CA is unreachable on purpose: the missing URL must fail locally
        let client = Client::new(DirectoryUrl::Other("http://127.0.0.1:1/directory"));
        let order = Order::new(
            "http://127.0.0.1:1/acme/order/0".to_owned(),
            api::Order::default(),
        );

        let err = client.finalize_order(&order, b"csr-der").await.unwrap_err();
        assert!(matches!(err, Error::Cert(_)));
    }

    #[tokio::test]
    async fn premature_finalize_is_rejected() {
        let server = with_directory_server();
        let client = client_for(&server);
        client.create_account(agreed()).await.unwrap();

        let order = client
            .create_order(NewOrder::dns(["example.com"]))
            .await
            .unwrap();

        let cert_key = create_p256_key();
        let csr = create_csr_der(&cert_key, &["example.com"]).unwrap();

        let err = client.finalize_order(&order, &csr).await.unwrap_err();
        let problem = err.problem().expect("should carry the CA problem");
        assert_eq!(problem._type, "urn:ietf:params:acme:error:orderNotReady");
    }

    #[tokio::test]
    async fn stale_nonce_is_retried_once() {
        let server = with_directory_server();
        let client = client_for(&server);
        client.create_account(agreed()).await.unwrap();

        server.state.lock().reject_nonces = 1;
        let order = client
            .create_order(NewOrder::dns(["example.com"]))
            .await
            .unwrap();
        assert_eq!(order.status(), Some(api::OrderStatus::Pending));

        // two rejections in a row exhaust the single retry
        server.state.lock().reject_nonces = 2;
        let err = client
            .create_order(NewOrder::dns(["example.com"]))
            .await
            .unwrap_err();

        match err {
            Error::OrderCreation(problem) => assert!(problem.is_bad_nonce()),
            err => panic!("unexpected error: {err}"),
        }
    }

    #[tokio::test]
    async fn key_rollover_keeps_the_account_working() {
        let server = with_directory_server();
        let client = client_for(&server);
        let created = client.create_account(agreed()).await.unwrap();

        let jwk_before = server.state.lock().accounts[0].jwk.clone();

        let account = client.update_account_key(create_p256_key()).await.unwrap();
        assert_eq!(account.status(), Some(api::AccountStatus::Valid));

        let jwk_after = server.state.lock().accounts[0].jwk.clone();
        assert_ne!(jwk_before, jwk_after);

        // kid is unchanged and requests keep working under the new key
        assert_eq!(client.account_url().unwrap(), created.url());
        let order = client
            .create_order(NewOrder::dns(["example.com"]))
            .await
            .unwrap();
        assert_eq!(order.status(), Some(api::OrderStatus::Pending));
    }

    #[tokio::test]
    async fn deactivated_authorization_fails_its_challenges() {
        let server = with_directory_server();
        let client = client_for(&server);
        client.create_account(agreed()).await.unwrap();

        let order = client
            .create_order(NewOrder::dns(["example.com"]))
            .await
            .unwrap();
        let auths = client.authorizations(&order).await.unwrap();

        let auth = client.deactivate_authorization(&auths[0]).await.unwrap();
        assert_eq!(auth.status(), api::AuthorizationStatus::Deactivated);

        let challenge = auths[0].api_auth().http_challenge().unwrap();
        let err = client.complete_challenge(challenge).await.unwrap_err();
        assert!(err.problem().is_some());

        // a settled failure status is data, not a poll error
        let auth = client.poll_authorization(&auths[0], &fast_poll()).await.unwrap();
        assert_eq!(auth.status(), api::AuthorizationStatus::Deactivated);
    }

    #[tokio::test]
    async fn full_lifecycle_until_account_deactivation() {
        let server = with_directory_server();
        let client = client_for(&server);
        client.create_account(agreed()).await.unwrap();

        let order = client
            .create_order(NewOrder::dns(["example.com", "*.example.com"]))
            .await
            .unwrap();

        let auths = client.authorizations(&order).await.unwrap();
        assert_eq!(auths.len(), 2);
        assert!(auths
            .iter()
            .all(|auth| auth.status() == api::AuthorizationStatus::Pending));

        for auth in &auths {
            for challenge in auth.challenges() {
                let key_auth = client.challenge_key_authorization(challenge).unwrap();
                assert!(!key_auth.is_empty());
            }
        }

        for auth in &auths {
            let auth = client.deactivate_authorization(auth).await.unwrap();
            assert_eq!(auth.status(), api::AuthorizationStatus::Deactivated);
        }

        let account = client.deactivate_account().await.unwrap();
        assert_eq!(account.status(), Some(api::AccountStatus::Deactivated));

        let err = client
            .create_order(NewOrder::dns(["nope.com"]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::OrderCreation(_)));
    }

    #[tokio::test]
    async fn polling_gives_up_after_the_attempt_budget() {
        let server = with_directory_server();
        let (client, order) = account_with_ready_order(&server).await;

        server.state.lock().stick_processing = true;

        let cert_key = create_p256_key();
        let csr = create_csr_der(&cert_key, &["example.com"]).unwrap();
        let order = client.finalize_order(&order, &csr).await.unwrap();

        let config = PollConfig::new(Duration::from_millis(10), 3);
        let err = client.poll_order(&order, &config).await.unwrap_err();

        match err {
            Error::PollTimeout { last_status } => assert_eq!(last_status, "Processing"),
            err => panic!("unexpected error: {err}"),
        }
    }

    #[tokio::test]
    async fn polling_stops_at_the_deadline() {
        let server = with_directory_server();
        let (client, order) = account_with_ready_order(&server).await;

        server.state.lock().stick_processing = true;

        let cert_key = create_p256_key();
        let csr = create_csr_der(&cert_key, &["example.com"]).unwrap();
        let order = client.finalize_order(&order, &csr).await.unwrap();

        let config = PollConfig::new(Duration::from_secs(3600), 1000)
            .with_deadline(tokio::time::Instant::now() + Duration::from_millis(50));

        let before = std::time::Instant::now();
        let err = client.poll_order(&order, &config).await.unwrap_err();

        assert!(matches!(err, Error::Cancelled));
        assert!(before.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test]
    async fn revokes_a_certificate() {
        let server = with_directory_server();
        let client = client_for(&server);
        client.create_account(agreed()).await.unwrap();

        client
            .revoke_certificate(b"der-bytes", RevocationReason::KeyCompromise)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn refreshing_the_directory_replaces_the_cache() {
        let server = with_directory_server();
        let client = client_for(&server);

        let before = client.api_directory().await.unwrap();
        client.refresh_directory().await.unwrap();
        let after = client.api_directory().await.unwrap();

        assert_eq!(before.new_order, after.new_order);
    }
}
