use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::{
    error::{Error, Result},
    req::{req_expect_header, req_head},
};

/// Number of unused nonces kept around between requests.
const POOL_CAP: usize = 10;

/// Shared pool of replay nonces.
///
/// Every nonce handed out is removed from the pool under the lock, so two
/// concurrent requests can never sign with the same nonce. Nonces are
/// harvested from the `Replay-Nonce` header of every response, success or
/// failure, and spent the moment they are assigned to a request.
#[derive(Debug)]
pub(crate) struct NoncePool {
    http_client: reqwest::Client,
    nonce_url: String,
    pool: Mutex<VecDeque<String>>,
}

impl NoncePool {
    pub(crate) fn new(http_client: reqwest::Client, nonce_url: &str) -> Self {
        NoncePool {
            http_client,
            nonce_url: nonce_url.to_owned(),
            pool: Mutex::new(VecDeque::new()),
        }
    }

    /// Remember a nonce returned in a response header.
    pub(crate) fn extract_nonce(&self, res: &reqwest::Response) {
        if let Some(nonce) = req_expect_header(res, "replay-nonce") {
            log::trace!("store nonce from response");

            let mut pool = self.pool.lock();
            pool.push_back(nonce);

            if pool.len() > POOL_CAP {
                pool.pop_front();
            }
        }
    }

    /// A nonce that has never been used in a request.
    ///
    /// Pops a pooled nonce when one is available, otherwise asks the
    /// `newNonce` endpoint for a fresh one.
    pub(crate) async fn get_nonce(&self) -> Result<String> {
        {
            let mut pool = self.pool.lock();

            if let Some(nonce) = pool.pop_front() {
                log::trace!("use pooled nonce");
                return Ok(nonce);
            }
        }

        log::debug!("request new nonce");
        let res = req_head(&self.http_client, &self.nonce_url).await?;

        req_expect_header(&res, "replay-nonce").ok_or(Error::MissingHeader("Replay-Nonce"))
    }

    #[cfg(test)]
    pub(crate) fn seed(&self, nonce: impl Into<String>) {
        let mut pool = self.pool.lock();
        pool.push_back(nonce.into());

        if pool.len() > POOL_CAP {
            pool.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, sync::Arc};

    use super::*;

    #[tokio::test]
    async fn concurrent_takers_never_share_a_nonce() {
        let pool = Arc::new(NoncePool::new(
            reqwest::Client::new(),
            "http://127.0.0.1:1/unused",
        ));

        for i in 0..POOL_CAP {
            pool.seed(format!("nonce-{i}"));
        }

        let mut tasks = Vec::new();
        for _ in 0..POOL_CAP {
            let pool = Arc::clone(&pool);
            tasks.push(tokio::spawn(async move { pool.get_nonce().await.unwrap() }));
        }

        let mut seen = HashSet::new();
        for task in tasks {
            let nonce = task.await.unwrap();
            assert!(seen.insert(nonce), "nonce handed out twice");
        }
    }

    #[test]
    fn pool_is_bounded() {
        let pool = NoncePool::new(reqwest::Client::new(), "http://127.0.0.1:1/unused");
        for i in 0..(POOL_CAP + 5) {
            pool.seed(format!("nonce-{i}"));
        }
        assert_eq!(pool.pool.lock().len(), POOL_CAP);
    }
}
