//! OAuth 2.0 / OIDC authorization server descriptor
//!
//! The discovery document is loaded on first use and the server's key set is
//! attached lazily from its `jwks_uri`.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Deserialize;
use tokio::sync::OnceCell;

use crate::keyset::{FetchError, KeySet, KeySetFactory};

/// Subset of the OIDC discovery document used by the engine
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProviderMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub jwks_uri: String,
    #[serde(default)]
    pub userinfo_endpoint: Option<String>,
}

pub struct AuthorizationServer {
    discovery_url: String,
    key_sets: KeySetFactory,
    metadata: OnceCell<ProviderMetadata>,
    key_set: RwLock<Option<Arc<dyn KeySet>>>,
}

impl std::fmt::Debug for AuthorizationServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationServer")
            .field("discovery_url", &self.discovery_url)
            .field("discovered", &self.metadata.initialized())
            .field("has_key_set", &self.key_set.read().is_some())
            .finish_non_exhaustive()
    }
}

impl AuthorizationServer {
    pub fn new(discovery_url: impl Into<String>, key_sets: KeySetFactory) -> Self {
        Self {
            discovery_url: discovery_url.into(),
            key_sets,
            metadata: OnceCell::new(),
            key_set: RwLock::new(None),
        }
    }

    pub fn discovery_url(&self) -> &str {
        &self.discovery_url
    }

    /// Discovery document, loaded once; a failed load is retried by the next caller.
    pub async fn metadata(&self) -> Result<&ProviderMetadata, FetchError> {
        self.metadata
            .get_or_try_init(|| async {
                tracing::info!(discovery_url = %self.discovery_url, "Loading OIDC discovery document");
                let body = self.key_sets.fetcher().get(&self.discovery_url).await?;
                serde_json::from_slice::<ProviderMetadata>(&body).map_err(|e| FetchError::Parse {
                    url: self.discovery_url.clone(),
                    reason: e.to_string(),
                })
            })
            .await
    }

    pub async fn jwks_endpoint(&self) -> Result<&str, FetchError> {
        Ok(self.metadata().await?.jwks_uri.as_str())
    }

    pub async fn authorization_endpoint(&self) -> Result<&str, FetchError> {
        Ok(self.metadata().await?.authorization_endpoint.as_str())
    }

    pub async fn token_endpoint(&self) -> Result<&str, FetchError> {
        Ok(self.metadata().await?.token_endpoint.as_str())
    }

    pub async fn userinfo_endpoint(&self) -> Result<Option<&str>, FetchError> {
        Ok(self.metadata().await?.userinfo_endpoint.as_deref())
    }

    pub fn set_key_set(&self, key_set: Arc<dyn KeySet>) {
        *self.key_set.write() = Some(key_set);
    }

    /// Key set for tokens issued by this server, attaching one for the
    /// discovered `jwks_uri` when none is attached yet.
    pub async fn key_set(&self) -> Result<Arc<dyn KeySet>, FetchError> {
        if let Some(key_set) = self.key_set.read().clone() {
            return Ok(key_set);
        }
        let jwks_uri = self.jwks_endpoint().await?;
        let mut slot = self.key_set.write();
        if let Some(key_set) = slot.as_ref() {
            return Ok(Arc::clone(key_set));
        }
        tracing::debug!(jwks_uri, "Attaching key set to authorization server");
        let key_set: Arc<dyn KeySet> = self.key_sets.create(jwks_uri);
        *slot = Some(Arc::clone(&key_set));
        Ok(key_set)
    }
}
