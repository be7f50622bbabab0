//! Request-time policy decisions

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use super::store::PolicyStore;
use super::types::{PathPolicy, PolicyType, Rule};
use super::{Endpoint, Method, Service};
use crate::client::Client;
use crate::constants::{CALLBACK_ENDPOINT, LOGOUT_ENDPOINT, ROOT_PATH};
use crate::keyset::KeySet;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("missing key set `{0}`: cannot authenticate request")]
    MissingKeySet(String),

    #[error("missing OIDC client `{0}`: cannot authenticate user")]
    MissingClient(String),
}

impl EngineError {
    #[must_use]
    pub const fn is_missing_key_set(&self) -> bool {
        matches!(self, Self::MissingKeySet(_))
    }

    #[must_use]
    pub const fn is_missing_client(&self) -> bool {
        matches!(self, Self::MissingClient(_))
    }
}

/// JWT bearer protection
#[derive(Debug, Clone)]
pub struct JwtAction {
    pub key_set: Arc<dyn KeySet>,
    pub rules: Vec<Rule>,
}

/// OIDC session protection
#[derive(Debug, Clone)]
pub struct OidcAction {
    pub client: Arc<Client>,
    pub rules: Vec<Rule>,
    pub redirect_uri: String,
}

/// Outcome of evaluating a request against the stored policies
#[derive(Debug, Clone)]
pub enum Decision {
    /// No policy governs the request
    None,
    Jwt(JwtAction),
    Oidc(OidcAction),
}

impl Decision {
    #[must_use]
    pub const fn kind(&self) -> DecisionKind {
        match self {
            Self::None => DecisionKind::None,
            Self::Jwt(_) => DecisionKind::Jwt,
            Self::Oidc(_) => DecisionKind::Oidc,
        }
    }

    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        match self {
            Self::None => &[],
            Self::Jwt(action) => &action.rules,
            Self::Oidc(action) => &action.rules,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DecisionKind {
    None,
    Jwt,
    Oidc,
}

impl fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("NONE"),
            Self::Jwt => f.write_str("JWT"),
            Self::Oidc => f.write_str("OIDC"),
        }
    }
}

/// Resolves the policy governing a request
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    store: Arc<dyn PolicyStore>,
}

impl PolicyEngine {
    #[must_use]
    pub fn new(store: Arc<dyn PolicyStore>) -> Self {
        Self { store }
    }

    /// Decide which protection applies to `method path` on `namespace/service`.
    ///
    /// The OIDC callback and logout endpoints under a path are governed by the
    /// policy of that path.
    pub fn evaluate(
        &self,
        namespace: &str,
        service: &str,
        path: &str,
        method: &str,
    ) -> Result<Decision, EngineError> {
        tracing::debug!(namespace, service, path, method, "Evaluating policies");

        let path = path
            .strip_suffix(CALLBACK_ENDPOINT)
            .or_else(|| path.strip_suffix(LOGOUT_ENDPOINT))
            .unwrap_or(path);
        let path = match path.trim_end_matches('/') {
            "" => ROOT_PATH,
            trimmed => trimmed,
        };
        let endpoint = Endpoint::new(
            Service::new(namespace, service),
            path,
            method.parse::<Method>().unwrap_or_default(),
        );

        let route = self.store.get_policies(&endpoint);
        let decision = match route.actions.first() {
            None => Decision::None,
            Some(action) => self.resolve(namespace, action)?,
        };

        tracing::debug!(
            endpoint = %endpoint,
            decision = %decision.kind(),
            policy = %route.policy_reference,
            "Policy decision"
        );
        #[cfg(feature = "metrics")]
        crate::observability::record_decision(decision.kind());

        Ok(decision)
    }

    fn resolve(&self, namespace: &str, action: &PathPolicy) -> Result<Decision, EngineError> {
        let name = format!("{namespace}/{}", action.config);
        match action.policy_type {
            PolicyType::Jwt => {
                let key_set = self.store.get_key_set(&name).ok_or_else(|| {
                    tracing::error!(config = %name, "Missing key set for JWT policy");
                    EngineError::MissingKeySet(name.clone())
                })?;
                Ok(Decision::Jwt(JwtAction {
                    key_set,
                    rules: action.rules.clone(),
                }))
            }
            PolicyType::Oidc => {
                let client = self.store.get_client(&name).ok_or_else(|| {
                    tracing::error!(config = %name, "Missing OIDC client for policy");
                    EngineError::MissingClient(name.clone())
                })?;
                Ok(Decision::Oidc(OidcAction {
                    client,
                    rules: action.rules.clone(),
                    redirect_uri: action.redirect_uri.clone(),
                }))
            }
        }
    }
}
