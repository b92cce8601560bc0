use std::sync::Arc;

use crate::{
    api,
    error::{Error, Result},
    nonce::NoncePool,
    req::{req_get, req_handle_error, read_json},
};

/// Resources a client can look up in the directory document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Resource {
    NewAccount,
    NewOrder,
    NewAuthz,
    RevokeCert,
    KeyChange,
}

impl Resource {
    pub(crate) fn name(self) -> &'static str {
        match self {
            Resource::NewAccount => "newAccount",
            Resource::NewOrder => "newOrder",
            Resource::NewAuthz => "newAuthz",
            Resource::RevokeCert => "revokeCert",
            Resource::KeyChange => "keyChange",
        }
    }
}

/// A fetched directory document plus the nonce pool anchored at its
/// `newNonce` endpoint.
///
/// Immutable once fetched; the client re-fetches only on an explicit refresh,
/// never in the middle of an operation.
#[derive(Debug)]
pub(crate) struct Directory {
    api_directory: api::Directory,
    nonce_pool: Arc<NoncePool>,
}

impl Directory {
    /// Fetch the directory document with a plain (unsigned) GET.
    pub(crate) async fn fetch(http_client: &reqwest::Client, url: &str) -> Result<Self> {
        log::debug!("fetch directory: {url}");
        let res = req_handle_error(req_get(http_client, url).await?).await?;
        let api_directory = read_json::<api::Directory>(res).await?;

        let nonce_pool = Arc::new(NoncePool::new(
            http_client.clone(),
            &api_directory.new_nonce,
        ));

        Ok(Directory {
            api_directory,
            nonce_pool,
        })
    }

    /// The endpoint URL for `resource`.
    ///
    /// Fails when the CA's directory omits the resource; in practice that
    /// only happens for `newAuthz`, which is optional per RFC 8555.
    pub(crate) fn resolve(&self, resource: Resource) -> Result<&str> {
        let dir = &self.api_directory;
        let url = match resource {
            Resource::NewAccount => Some(dir.new_account.as_str()),
            Resource::NewOrder => Some(dir.new_order.as_str()),
            Resource::NewAuthz => dir.new_authz.as_deref(),
            Resource::RevokeCert => Some(dir.revoke_cert.as_str()),
            Resource::KeyChange => Some(dir.key_change.as_str()),
        };

        url.ok_or(Error::UnknownResource(resource.name()))
    }

    pub(crate) fn nonce_pool(&self) -> Arc<NoncePool> {
        Arc::clone(&self.nonce_pool)
    }

    pub(crate) fn api_directory(&self) -> &api::Directory {
        &self.api_directory
    }
}
