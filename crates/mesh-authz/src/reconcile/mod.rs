//! Reconciliation of declarative record events into the policy store

mod records;
mod secret;

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub use records::{
    ClientSecretRef, JwtConfig, JwtConfigSpec, ObjectMeta, OidcConfig, OidcConfigSpec, Policy,
    PolicySpec, Record, RecordEvent, RecordKey, RecordKind, parse_events,
};
pub use secret::{DirectorySecretResolver, SecretError, SecretResolver, StaticSecretResolver};

use crate::authserver::AuthorizationServer;
use crate::client::{AuthMethod, Client};
use crate::keyset::KeySetFactory;
use crate::policy::{Endpoint, PolicyMapping, PolicyStore, RoutePolicy, expand_targets};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("invalid JWKS URL `{url}` in {record}: {reason}")]
    InvalidJwksUrl {
        record: String,
        url: String,
        reason: String,
    },

    #[error("invalid auth method in {record}: {reason}")]
    InvalidAuthMethod { record: String, reason: String },
}

impl ReconcileError {
    #[must_use]
    pub const fn is_invalid_record(&self) -> bool {
        matches!(self, Self::InvalidRecord(_))
    }

    #[must_use]
    pub const fn is_invalid_jwks_url(&self) -> bool {
        matches!(self, Self::InvalidJwksUrl { .. })
    }

    #[must_use]
    pub const fn is_invalid_auth_method(&self) -> bool {
        matches!(self, Self::InvalidAuthMethod { .. })
    }
}

/// Applies record lifecycle events to a [`PolicyStore`].
///
/// Every handler is idempotent. A rejected record leaves the store untouched.
#[derive(Debug, Clone)]
pub struct Reconciler {
    store: Arc<dyn PolicyStore>,
    secrets: Arc<dyn SecretResolver>,
    key_sets: KeySetFactory,
}

impl Reconciler {
    #[must_use]
    pub fn new(
        store: Arc<dyn PolicyStore>,
        secrets: Arc<dyn SecretResolver>,
        key_sets: KeySetFactory,
    ) -> Self {
        Self {
            store,
            secrets,
            key_sets,
        }
    }

    /// Consume events until the channel closes or `shutdown` is cancelled.
    ///
    /// Returns the number of events handled. Failed events are logged and do
    /// not stop the loop.
    pub async fn run(
        &self,
        mut events: mpsc::Receiver<RecordEvent>,
        shutdown: CancellationToken,
    ) -> usize {
        tracing::info!("Reconciler started");
        let mut handled = 0;
        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => {
                    tracing::info!(handled, "Reconciler shutting down");
                    break;
                }
                event = events.recv() => {
                    let Some(event) = event else {
                        tracing::info!(handled, "Record event channel closed");
                        break;
                    };
                    if let Err(e) = self.handle_event(&event) {
                        tracing::error!(error = %e, "Failed to reconcile record event");
                    }
                    handled += 1;
                }
            }
        }
        handled
    }

    pub fn handle_event(&self, event: &RecordEvent) -> Result<(), ReconcileError> {
        let (kind, result) = match event {
            RecordEvent::Added { object } | RecordEvent::Modified { object } => {
                (object.kind(), self.handle_add_update(object))
            }
            RecordEvent::Deleted { object } => (object.kind, self.handle_delete(object)),
        };
        #[cfg(feature = "metrics")]
        crate::observability::record_reconcile(
            kind.as_str(),
            if result.is_ok() { "applied" } else { "rejected" },
        );
        if let Err(e) = &result {
            tracing::debug!(kind = %kind, error = %e, "Record rejected");
        }
        result
    }

    /// Create or replace the store entities produced by `record`.
    pub fn handle_add_update(&self, record: &Record) -> Result<(), ReconcileError> {
        let meta = record.metadata();
        let id = meta.id();
        tracing::debug!(
            kind = %record.kind(),
            id = %id,
            uid = meta.uid.as_deref().unwrap_or_default(),
            "Create/Update record"
        );

        match record {
            Record::JwtConfig(config) => self.apply_jwt_config(&id, config)?,
            Record::OidcConfig(config) => self.apply_oidc_config(&id, config)?,
            Record::Policy(policy) => self.apply_policy(&id, policy),
        }

        tracing::info!(kind = %record.kind(), id = %id, "Record created/updated");
        Ok(())
    }

    /// Remove the store entities produced by the record `key` names.
    pub fn handle_delete(&self, key: &RecordKey) -> Result<(), ReconcileError> {
        let id = key.id();
        match key.kind {
            RecordKind::JwtConfig => {
                let existed = self.store.delete_key_set(&id);
                tracing::info!(id = %id, existed, "JwtConfig deleted");
            }
            RecordKind::OidcConfig => {
                let existed = self.store.delete_client(&id);
                tracing::info!(id = %id, existed, "OidcConfig deleted");
            }
            RecordKind::Policy => {
                let released = self.store.get_policy_mapping(&id).map_or(0, |mapping| {
                    mapping
                        .endpoints()
                        .filter(|endpoint| self.release(&id, endpoint))
                        .count()
                });
                self.store.delete_policy_mapping(&id);
                tracing::info!(id = %id, released, "Policy deleted");
            }
        }
        Ok(())
    }

    fn apply_jwt_config(&self, id: &str, config: &JwtConfig) -> Result<(), ReconcileError> {
        let url = config.spec.jwks_url.trim();
        url::Url::parse(url).map_err(|e| ReconcileError::InvalidJwksUrl {
            record: id.to_string(),
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        self.store.add_key_set(id, self.key_sets.create(url));
        Ok(())
    }

    fn apply_oidc_config(&self, id: &str, config: &OidcConfig) -> Result<(), ReconcileError> {
        let spec = &config.spec;
        let auth_method: AuthMethod = spec.auth_method.parse().map_err(|reason| {
            ReconcileError::InvalidAuthMethod {
                record: id.to_string(),
                reason,
            }
        })?;
        if spec.discovery_url.is_empty() {
            tracing::warn!(id = %id, "Empty discoveryUrl in OidcConfig");
        }

        let server = AuthorizationServer::new(spec.discovery_url.as_str(), self.key_sets.clone());
        let secret = self.client_secret(&config.metadata.namespace, spec);
        let client = Client::new(
            id,
            spec.client_id.as_str(),
            secret,
            spec.callback.as_str(),
            auth_method,
            Arc::new(server),
        );
        self.store.add_client(id, Arc::new(client));
        Ok(())
    }

    fn apply_policy(&self, id: &str, policy: &Policy) {
        let entries = expand_targets(&policy.spec.target, &policy.metadata.namespace);
        for entry in &entries {
            tracing::debug!(endpoint = %entry.endpoint, policy = id, "Adding policy for endpoint");
            self.store
                .set_policies(&entry.endpoint, RoutePolicy::new(id, entry.actions.clone()));
        }

        // Endpoints the previous version covered but this one no longer does.
        if let Some(previous) = self.store.get_policy_mapping(id) {
            for endpoint in previous.endpoints() {
                if !entries.iter().any(|entry| &entry.endpoint == endpoint)
                    && self.release(id, endpoint)
                {
                    tracing::debug!(endpoint = %endpoint, policy = id, "Released stale endpoint");
                }
            }
        }

        self.store.add_policy_mapping(PolicyMapping::new(id, entries));
    }

    /// Remove `endpoint` if `record` still owns it.
    fn release(&self, record: &str, endpoint: &Endpoint) -> bool {
        let stored = self.store.get_policies(endpoint);
        if stored.policy_reference != record {
            tracing::debug!(
                endpoint = %endpoint,
                policy = record,
                owner = %stored.policy_reference,
                "Endpoint owned by another policy; keeping"
            );
            return false;
        }
        self.store.delete_policies(endpoint)
    }

    /// Referenced secret if it resolves to a non-empty value, else the inline one.
    fn client_secret(&self, namespace: &str, spec: &OidcConfigSpec) -> String {
        let reference = &spec.client_secret_ref;
        if reference.is_set() {
            match self
                .secrets
                .resolve(namespace, &reference.name, &reference.key)
            {
                Ok(value) if !value.is_empty() => return value,
                Ok(_) => tracing::warn!(
                    namespace,
                    secret = %reference.name,
                    key = %reference.key,
                    "Referenced client secret is empty"
                ),
                Err(e) => tracing::warn!(
                    namespace,
                    secret = %reference.name,
                    error = %e,
                    "Failed to resolve client secret"
                ),
            }
        }
        spec.client_secret.clone()
    }
}
