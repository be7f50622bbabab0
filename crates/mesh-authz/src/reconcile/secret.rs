//! Client secret resolution

use std::collections::HashMap;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("secret `{namespace}/{name}` has no key `{key}`")]
    NotFound {
        namespace: String,
        name: String,
        key: String,
    },

    #[error("failed to read secret: {0}")]
    Io(#[from] std::io::Error),
}

impl SecretError {
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Source of named secret values
pub trait SecretResolver: Send + Sync + std::fmt::Debug {
    fn resolve(&self, namespace: &str, name: &str, key: &str) -> Result<String, SecretError>;
}

/// Secrets mounted as files: `<dir>/<namespace>/<name>/<key>`
#[derive(Debug, Clone)]
pub struct DirectorySecretResolver {
    root: PathBuf,
}

impl DirectorySecretResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl SecretResolver for DirectorySecretResolver {
    fn resolve(&self, namespace: &str, name: &str, key: &str) -> Result<String, SecretError> {
        let not_found = || SecretError::NotFound {
            namespace: namespace.to_string(),
            name: name.to_string(),
            key: key.to_string(),
        };
        // Reject anything that would escape the secret root.
        if [namespace, name, key]
            .iter()
            .any(|part| part.is_empty() || part.contains(['/', '\\']) || *part == "..")
        {
            return Err(not_found());
        }

        let path = self.root.join(namespace).join(name).join(key);
        match std::fs::read_to_string(&path) {
            Ok(value) => Ok(value.trim_end_matches(['\n', '\r']).to_string()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(not_found()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory secrets keyed by `(namespace, name, key)`
#[derive(Default, Clone)]
pub struct StaticSecretResolver {
    secrets: HashMap<(String, String, String), String>,
}

impl std::fmt::Debug for StaticSecretResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticSecretResolver")
            .field("entries", &self.secrets.len())
            .finish()
    }
}

impl StaticSecretResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_secret(mut self, namespace: &str, name: &str, key: &str, value: &str) -> Self {
        self.secrets.insert(
            (namespace.to_string(), name.to_string(), key.to_string()),
            value.to_string(),
        );
        self
    }
}

impl SecretResolver for StaticSecretResolver {
    fn resolve(&self, namespace: &str, name: &str, key: &str) -> Result<String, SecretError> {
        self.secrets
            .get(&(namespace.to_string(), name.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| SecretError::NotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
                key: key.to_string(),
            })
    }
}
