//! Client for the ACME (Automatic Certificate Management Environment)
//! protocol, as served by providers such as
//! [Let's Encrypt](https://letsencrypt.org/).
//!
//! It follows the [RFC 8555](https://datatracker.ietf.org/doc/html/rfc8555)
//! spec, using ACME v2 to issue/renew certificates.
//!
//! # Usage
//!
//! Everything goes through a [`Client`], which holds the account key, the
//! CA's directory and a pool of replay nonces. The issuance flow is:
//!
//! 1. [`create_account`](Client::create_account) (or resume a persisted
//!    key + account URL pair through the [builder](Client::builder));
//! 2. [`create_order`](Client::create_order) for the domains;
//! 3. for each of the order's [`authorizations`](Client::authorizations),
//!    publish a challenge proof and call
//!    [`complete_challenge`](Client::complete_challenge);
//! 4. poll until the order is ready, then
//!    [`finalize_order`](Client::finalize_order) with a CSR and download the
//!    [`certificate`](Client::certificate).
//!
//! # Domain Ownership
//!
//! Most website TLS certificates tries to prove ownership/control over the
//! domain they are issued for. For ACME, this means proving you control
//! either:
//!
//! - a server answering TLS or HTTP requests for that domain;
//! - the DNS server answering name lookups against the domain.
//!
//! To use this library, there are points in the flow where you would need to
//! modify either the web server or DNS server before progressing to get the
//! certificate. See [`challenge_key_authorization`],
//! [`dns_challenge_proof`], and [`tls_alpn_challenge_proof`].
//!
//! # Rate Limits
//!
//! The ACME API provider Let's Encrypt uses [rate limits] to ensure the API
//! is not being abused. It might be tempting to put the poll interval really
//! low, but balance this against the real risk of having access cut off.
//!
//! ## Use Staging For Development!
//!
//! Especially take care to use the Let's Encrypt staging environment for
//! development where the rate limits are more relaxed. See
//! [`DirectoryUrl::LetsEncryptStaging`].
//!
//! [`challenge_key_authorization`]: Client::challenge_key_authorization()
//! [`dns_challenge_proof`]: Client::dns_challenge_proof()
//! [`tls_alpn_challenge_proof`]: Client::tls_alpn_challenge_proof()
//! [rate limits]: https://letsencrypt.org/docs/rate-limits

#![deny(rust_2018_idioms, nonstandard_style, future_incompatible)]

mod cert;
mod client;
mod dir;
mod error;
mod jws;
mod key;
mod nonce;
mod order;
mod poll;
mod req;
mod trans;

pub mod api;


pub use crate::{
    cert::{create_csr, create_csr_der, Certificate},
    client::{
        Account, Client, ClientBuilder, DirectoryUrl, NewAccount, NewOrder, RevocationReason,
        UpdateAccount,
    },
    error::{Error, Result},
    key::create_p256_key,
    order::{Authorization, Order},
    poll::PollConfig,
};
