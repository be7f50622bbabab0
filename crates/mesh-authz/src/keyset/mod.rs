//! Remote key sets: cached JWKS retrieval with deduplicated refresh

mod fetch;
mod group;
mod jwk;

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;

pub use fetch::{FetchError, HttpFetch, ReqwestFetch, RetryPolicy, with_retry};
pub use group::RequestGroup;
pub use jwk::{Jwk, PublicKey, parse_key_set};

type KeyMap = HashMap<String, PublicKey>;
type RefreshResult = Result<Arc<KeyMap>, FetchError>;

/// Source of verification keys by key ID
#[async_trait]
pub trait KeySet: Send + Sync + std::fmt::Debug {
    /// URL the keys are published at
    fn url(&self) -> &str;

    /// Key for `kid`, if the set has (or after a refresh obtains) one
    async fn public_key(&self, kid: &str) -> Option<PublicKey>;
}

/// Key set cached from a JWKS endpoint.
///
/// A lookup miss refreshes the whole set synchronously and looks again. A
/// failed refresh keeps the previous keys.
pub struct RemoteKeySet {
    url: String,
    keys: ArcSwap<KeyMap>,
    fetcher: Arc<dyn HttpFetch>,
    group: Arc<RequestGroup<RefreshResult>>,
}

impl std::fmt::Debug for RemoteKeySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteKeySet")
            .field("url", &self.url)
            .field("keys_count", &self.keys.load().len())
            .finish_non_exhaustive()
    }
}

impl RemoteKeySet {
    pub fn new(
        url: impl Into<String>,
        fetcher: Arc<dyn HttpFetch>,
        group: Arc<RequestGroup<RefreshResult>>,
    ) -> Self {
        Self {
            url: url.into(),
            keys: ArcSwap::from_pointee(HashMap::new()),
            fetcher,
            group,
        }
    }

    /// Fetch the set and atomically replace the cached keys.
    ///
    /// Concurrent refreshes of the same URL share one fetch.
    pub async fn refresh(&self) -> Result<usize, FetchError> {
        let fetcher = Arc::clone(&self.fetcher);
        let url = self.url.clone();
        let request = async move {
            let body = fetcher.get(&url).await?;
            parse_key_set(&url, &body).map(Arc::new)
        };

        let result = self.group.run(&self.url, request).await;

        #[cfg(feature = "metrics")]
        crate::observability::record_key_fetch(result.is_ok());

        match result {
            Ok(keys) => {
                let count = keys.len();
                self.keys.store(keys);
                tracing::info!(url = %self.url, keys_count = count, "Key set refreshed");
                Ok(count)
            }
            Err(e) => {
                tracing::warn!(url = %self.url, error = %e, "Key set refresh failed, keeping previous keys");
                Err(e)
            }
        }
    }

    fn cached(&self, kid: &str) -> Option<PublicKey> {
        self.keys.load().get(kid).cloned()
    }

    pub fn keys_count(&self) -> usize {
        self.keys.load().len()
    }
}

#[async_trait]
impl KeySet for RemoteKeySet {
    fn url(&self) -> &str {
        &self.url
    }

    async fn public_key(&self, kid: &str) -> Option<PublicKey> {
        if let Some(key) = self.cached(kid) {
            return Some(key);
        }
        tracing::debug!(url = %self.url, kid, "Key not cached, refreshing key set");
        // failure is already logged and degrades to "key not found"
        let _ = self.refresh().await;
        self.cached(kid)
    }
}

/// Builds remote key sets sharing one fetcher and one in-flight table
#[derive(Debug, Clone)]
pub struct KeySetFactory {
    fetcher: Arc<dyn HttpFetch>,
    group: Arc<RequestGroup<RefreshResult>>,
}

impl KeySetFactory {
    #[must_use]
    pub fn new(fetcher: Arc<dyn HttpFetch>) -> Self {
        Self {
            fetcher,
            group: Arc::new(RequestGroup::new()),
        }
    }

    #[must_use]
    pub fn fetcher(&self) -> Arc<dyn HttpFetch> {
        Arc::clone(&self.fetcher)
    }

    #[must_use]
    pub fn create(&self, url: &str) -> Arc<RemoteKeySet> {
        Arc::new(RemoteKeySet::new(
            url,
            Arc::clone(&self.fetcher),
            Arc::clone(&self.group),
        ))
    }
}
