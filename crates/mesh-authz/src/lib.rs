//! Authorization decisions for service-mesh requests
//!
//! Declarative records (JWKS configs, OIDC client configs and policies) are
//! reconciled into a [`PolicyStore`]. At request time the [`PolicyEngine`]
//! resolves the policy governing a `(namespace, service, path, method)` and the
//! [`TokenValidator`] checks a bearer token against the decision's key set and
//! claim rules.

pub mod authserver;
pub mod client;
pub mod config;
mod constants;
mod error;
pub mod keyset;
pub mod observability;
pub mod policy;
pub mod reconcile;
#[cfg(test)]
pub(crate) mod test_support;
pub mod validator;

pub use authserver::{AuthorizationServer, ProviderMetadata};
pub use client::{AuthMethod, Client};
pub use config::{Config, ConfigBuilder, FetchConfig, TelemetryConfig, ValidationConfig};
pub use constants::{CALLBACK_ENDPOINT, LOGOUT_ENDPOINT};
pub use error::{Error, Result};
pub use keyset::{FetchError, HttpFetch, KeySet, KeySetFactory, RemoteKeySet, ReqwestFetch};
pub use policy::{
    Decision, DecisionKind, Endpoint, EngineError, LocalStore, MatchMode, Method, PathPolicy,
    PolicyEngine, PolicyStore, PolicyType, RoutePolicy, Rule, Service,
};
pub use reconcile::{
    DirectorySecretResolver, ReconcileError, Reconciler, Record, RecordEvent, RecordKey,
    SecretResolver, StaticSecretResolver,
};
pub use validator::{Claims, OAuthError, OAuthErrorCode, TokenValidator};
