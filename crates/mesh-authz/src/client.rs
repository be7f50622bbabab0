//! OIDC relying-party clients built from `OIDCConfig` records

use std::str::FromStr;
use std::sync::Arc;

use openidconnect::{AuthType, ClientId, ClientSecret};
use serde::Serialize;

use crate::authserver::AuthorizationServer;
use crate::constants::DEFAULT_AUTH_METHOD;

/// How the client authenticates at the token endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    #[default]
    ClientSecretBasic,
    ClientSecretPost,
}

impl AuthMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ClientSecretBasic => DEFAULT_AUTH_METHOD,
            Self::ClientSecretPost => "client_secret_post",
        }
    }

    /// Equivalent `openidconnect` client authentication style
    #[must_use]
    pub const fn auth_type(self) -> AuthType {
        match self {
            Self::ClientSecretBasic => AuthType::BasicAuth,
            Self::ClientSecretPost => AuthType::RequestBody,
        }
    }
}

impl FromStr for AuthMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | DEFAULT_AUTH_METHOD => Ok(Self::ClientSecretBasic),
            "client_secret_post" => Ok(Self::ClientSecretPost),
            other => Err(format!("unsupported auth method `{other}`")),
        }
    }
}

impl std::fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct Client {
    name: String,
    id: ClientId,
    secret: ClientSecret,
    callback: String,
    auth_method: AuthMethod,
    authorization_server: Arc<AuthorizationServer>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("name", &self.name)
            .field("id", &self.id.as_str())
            .field("callback", &self.callback)
            .field("auth_method", &self.auth_method)
            .field("discovery_url", &self.authorization_server.discovery_url())
            .finish_non_exhaustive()
    }
}

impl Client {
    pub fn new(
        name: impl Into<String>,
        id: impl Into<String>,
        secret: impl Into<String>,
        callback: impl Into<String>,
        auth_method: AuthMethod,
        authorization_server: Arc<AuthorizationServer>,
    ) -> Self {
        Self {
            name: name.into(),
            id: ClientId::new(id.into()),
            secret: ClientSecret::new(secret.into()),
            callback: callback.into(),
            auth_method,
            authorization_server,
        }
    }

    /// Store key, `namespace/name`
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> &ClientId {
        &self.id
    }

    pub fn secret(&self) -> &ClientSecret {
        &self.secret
    }

    pub fn callback(&self) -> &str {
        &self.callback
    }

    #[must_use]
    pub const fn auth_method(&self) -> AuthMethod {
        self.auth_method
    }

    pub fn authorization_server(&self) -> &Arc<AuthorizationServer> {
        &self.authorization_server
    }
}
