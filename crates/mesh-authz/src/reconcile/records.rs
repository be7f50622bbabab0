//! Declarative records and their lifecycle events

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::policy::Target;

/// Kubernetes-style object metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ObjectMeta {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub uid: Option<String>,
}

impl ObjectMeta {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            uid: None,
        }
    }

    /// `namespace/name`
    pub fn id(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    JwtConfig,
    OidcConfig,
    Policy,
}

impl RecordKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::JwtConfig => "JwtConfig",
            Self::OidcConfig => "OidcConfig",
            Self::Policy => "Policy",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JwtConfigSpec {
    pub jwks_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JwtConfig {
    pub metadata: ObjectMeta,
    pub spec: JwtConfigSpec,
}

/// Reference to a key inside a named secret
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ClientSecretRef {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub key: String,
}

impl ClientSecretRef {
    #[must_use]
    pub fn is_set(&self) -> bool {
        !self.name.is_empty() && !self.key.is_empty()
    }
}

#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OidcConfigSpec {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub client_secret_ref: ClientSecretRef,
    #[serde(default)]
    pub discovery_url: String,
    #[serde(default)]
    pub callback: String,
    #[serde(default)]
    pub auth_method: String,
}

impl fmt::Debug for OidcConfigSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OidcConfigSpec")
            .field("client_id", &self.client_id)
            .field("client_secret_ref", &self.client_secret_ref)
            .field("discovery_url", &self.discovery_url)
            .field("callback", &self.callback)
            .field("auth_method", &self.auth_method)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OidcConfig {
    pub metadata: ObjectMeta,
    pub spec: OidcConfigSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PolicySpec {
    #[serde(default)]
    pub target: Vec<Target>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Policy {
    pub metadata: ObjectMeta,
    pub spec: PolicySpec,
}

/// Declarative record, tagged by `kind`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind")]
pub enum Record {
    JwtConfig(JwtConfig),
    OidcConfig(OidcConfig),
    Policy(Policy),
}

impl Record {
    #[must_use]
    pub const fn kind(&self) -> RecordKind {
        match self {
            Self::JwtConfig(_) => RecordKind::JwtConfig,
            Self::OidcConfig(_) => RecordKind::OidcConfig,
            Self::Policy(_) => RecordKind::Policy,
        }
    }

    #[must_use]
    pub const fn metadata(&self) -> &ObjectMeta {
        match self {
            Self::JwtConfig(r) => &r.metadata,
            Self::OidcConfig(r) => &r.metadata,
            Self::Policy(r) => &r.metadata,
        }
    }

    #[must_use]
    pub fn key(&self) -> RecordKey {
        RecordKey {
            kind: self.kind(),
            metadata: self.metadata().clone(),
        }
    }
}

/// Identity of a record; a full record also decodes as its key.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RecordKey {
    pub kind: RecordKind,
    pub metadata: ObjectMeta,
}

impl RecordKey {
    pub fn new(kind: RecordKind, namespace: &str, name: &str) -> Self {
        Self {
            kind,
            metadata: ObjectMeta::new(namespace, name),
        }
    }

    /// Store key derived from the record, `namespace/name`
    pub fn id(&self) -> String {
        self.metadata.id()
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.metadata.namespace, self.metadata.name)
    }
}

/// Watch event carrying a record
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum RecordEvent {
    Added { object: Record },
    Modified { object: Record },
    Deleted { object: RecordKey },
}

/// Decode a JSON array of watch events, skipping malformed entries.
pub fn parse_events(body: &str) -> crate::Result<Vec<RecordEvent>> {
    let raw: Vec<serde_json::Value> = serde_json::from_str(body)?;
    let mut events = Vec::with_capacity(raw.len());
    for (index, value) in raw.into_iter().enumerate() {
        match serde_json::from_value::<RecordEvent>(value) {
            Ok(event) => events.push(event),
            Err(e) => tracing::error!(index, error = %e, "Skipping malformed record event"),
        }
    }
    Ok(events)
}
