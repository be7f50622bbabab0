//! Expansion of declared policy targets into concrete endpoints

use serde::Deserialize;

use super::types::PathPolicy;
use super::{Endpoint, Method, Service};
use crate::constants::{ROOT_PATH, WILDCARD_SEGMENT};

/// Declared target of a policy record
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub service_name: String,
    #[serde(default)]
    pub paths: Vec<TargetPath>,
}

/// One path entry of a declared target
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TargetPath {
    #[serde(default)]
    pub exact: String,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub policies: Vec<PathPolicy>,
}

impl TargetPath {
    /// Trie path this entry governs; `exact` wins over `prefix`.
    pub fn trie_path(&self) -> String {
        if !self.exact.is_empty() {
            let trimmed = self.exact.trim_end_matches('/');
            if trimmed.is_empty() {
                ROOT_PATH.to_string()
            } else {
                trimmed.to_string()
            }
        } else if !self.prefix.is_empty() {
            format!("{}{WILDCARD_SEGMENT}", self.prefix.trim_end_matches('/'))
        } else {
            WILDCARD_SEGMENT.to_string()
        }
    }
}

/// Concrete endpoint with the actions declared for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetPolicy {
    pub endpoint: Endpoint,
    pub actions: Vec<PathPolicy>,
}

/// Expand declared targets into one endpoint per path entry.
pub fn expand_targets(targets: &[Target], namespace: &str) -> Vec<TargetPolicy> {
    targets
        .iter()
        .flat_map(|target| {
            if target.paths.is_empty() {
                tracing::warn!(
                    namespace,
                    service = %target.service_name,
                    "Policy target declares no paths"
                );
            }
            let service = Service::new(namespace, target.service_name.as_str());
            target.paths.iter().map(move |path| TargetPolicy {
                endpoint: Endpoint::new(
                    service.clone(),
                    path.trie_path(),
                    path.method.parse::<Method>().unwrap_or_default(),
                ),
                actions: path.policies.clone(),
            })
        })
        .collect()
}
