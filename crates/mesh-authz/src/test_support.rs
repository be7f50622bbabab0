//! Shared fixtures for unit tests

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use parking_lot::Mutex;

use crate::authserver::AuthorizationServer;
use crate::client::{AuthMethod, Client};
use crate::keyset::{FetchError, HttpFetch, KeySet, KeySetFactory, PublicKey, parse_key_set};

pub const TEST_KID: &str = "test-key-1";
pub const TEST_JWKS: &str = include_str!("../tests/fixtures/jwks.json");
pub const TEST_PRIVATE_KEY: &str = include_str!("../tests/fixtures/rsa_private.pem");

/// The single JWK of [`TEST_JWKS`], serialized on its own
pub fn test_jwk() -> String {
    let jwks: serde_json::Value = serde_json::from_str(TEST_JWKS).unwrap();
    jwks["keys"][0].to_string()
}

pub fn now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs()
        .try_into()
        .unwrap()
}

/// RS256 token over `claims`, signed with the fixture key
pub fn mint_token(claims: &serde_json::Value) -> String {
    mint_token_with_kid(claims, Some(TEST_KID))
}

pub fn mint_token_with_kid(claims: &serde_json::Value, kid: Option<&str>) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid.map(str::to_string);
    let key = EncodingKey::from_rsa_pem(TEST_PRIVATE_KEY.as_bytes()).unwrap();
    jsonwebtoken::encode(&header, claims, &key).unwrap()
}

/// In-memory key set with a fixed URL
#[derive(Debug)]
pub struct StaticKeySet {
    url: String,
    keys: HashMap<String, PublicKey>,
}

impl StaticKeySet {
    pub fn empty(url: &str) -> Self {
        Self {
            url: url.to_string(),
            keys: HashMap::new(),
        }
    }

    pub fn from_jwks(url: &str, jwks: &str) -> Self {
        Self {
            url: url.to_string(),
            keys: parse_key_set(url, jwks.as_bytes()).unwrap(),
        }
    }

    pub fn test_keys() -> Self {
        Self::from_jwks("https://issuer.example.com/jwks", TEST_JWKS)
    }
}

#[async_trait]
impl KeySet for StaticKeySet {
    fn url(&self) -> &str {
        &self.url
    }

    async fn public_key(&self, kid: &str) -> Option<PublicKey> {
        self.keys.get(kid).cloned()
    }
}

/// Scripted HTTP responses keyed by URL, counting requests
#[derive(Debug, Default)]
pub struct MockFetch {
    responses: Mutex<HashMap<String, Result<Vec<u8>, u16>>>,
    calls: Mutex<HashMap<String, usize>>,
    delay: Option<Duration>,
}

impl MockFetch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(self, url: &str, body: &str) -> Self {
        self.set_body(url, body);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_body(&self, url: &str, body: &str) {
        self.responses
            .lock()
            .insert(url.to_string(), Ok(body.as_bytes().to_vec()));
    }

    pub fn fail(&self, url: &str, status: u16) {
        self.responses.lock().insert(url.to_string(), Err(status));
    }

    pub fn calls(&self, url: &str) -> usize {
        self.calls.lock().get(url).copied().unwrap_or(0)
    }
}

#[async_trait]
impl HttpFetch for MockFetch {
    async fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        *self.calls.lock().entry(url.to_string()).or_default() += 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let response = self.responses.lock().get(url).cloned();
        match response {
            Some(Ok(body)) => Ok(body),
            Some(Err(status)) => Err(FetchError::Status {
                url: url.to_string(),
                status,
            }),
            None => Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

/// Client `name` whose server is never contacted
pub fn test_client(name: &str) -> Client {
    let factory = KeySetFactory::new(Arc::new(MockFetch::new()));
    let server = AuthorizationServer::new(
        "https://issuer.example.com/.well-known/openid-configuration",
        factory,
    );
    Client::new(
        name,
        "web-client",
        "s3cr3t",
        "https://app.example.com/oidc/callback",
        AuthMethod::default(),
        Arc::new(server),
    )
}
