//! Policy store: path tries per service plus key set, client and mapping registries

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::pathtrie::PathTrie;
use super::target::TargetPolicy;
use super::types::RoutePolicy;
use super::{Endpoint, Method, Service};
use crate::client::Client;
use crate::keyset::KeySet;

/// Per-path table of route policies keyed by method
pub type MethodTable = HashMap<Method, RoutePolicy>;

/// Endpoints produced by one policy record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyMapping {
    /// Record identity (`namespace/name`)
    pub record: String,
    pub entries: Vec<TargetPolicy>,
}

impl PolicyMapping {
    pub fn new(record: impl Into<String>, entries: Vec<TargetPolicy>) -> Self {
        Self {
            record: record.into(),
            entries,
        }
    }

    pub fn endpoints(&self) -> impl Iterator<Item = &Endpoint> {
        self.entries.iter().map(|entry| &entry.endpoint)
    }
}

/// Storage consulted at request time and mutated by reconciliation
pub trait PolicyStore: Send + Sync + std::fmt::Debug {
    fn add_key_set(&self, name: &str, key_set: Arc<dyn KeySet>);
    fn get_key_set(&self, name: &str) -> Option<Arc<dyn KeySet>>;
    fn delete_key_set(&self, name: &str) -> bool;

    fn add_client(&self, name: &str, client: Arc<Client>);
    fn get_client(&self, name: &str) -> Option<Arc<Client>>;
    fn delete_client(&self, name: &str) -> bool;

    /// Replace the route policy stored for exactly this endpoint
    fn set_policies(&self, endpoint: &Endpoint, policy: RoutePolicy);

    /// Resolve the governing route policy: wildcard path fallback first, then
    /// method fallback to `ALL`, else an empty default.
    fn get_policies(&self, endpoint: &Endpoint) -> RoutePolicy;

    /// Remove the entry for exactly this endpoint, pruning an emptied path.
    fn delete_policies(&self, endpoint: &Endpoint) -> bool;

    fn add_policy_mapping(&self, mapping: PolicyMapping);
    fn get_policy_mapping(&self, record: &str) -> Option<PolicyMapping>;
    fn delete_policy_mapping(&self, record: &str) -> bool;
}

#[derive(Default)]
struct Inner {
    policies: HashMap<Service, PathTrie<MethodTable>>,
    key_sets: HashMap<String, Arc<dyn KeySet>>,
    clients: HashMap<String, Arc<Client>>,
    mappings: HashMap<String, PolicyMapping>,
}

/// In-process store guarded by a single reader/writer lock
#[derive(Default)]
pub struct LocalStore {
    inner: RwLock<Inner>,
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("LocalStore")
            .field("services", &inner.policies.len())
            .field("key_sets", &inner.key_sets.len())
            .field("clients", &inner.clients.len())
            .field("mappings", &inner.mappings.len())
            .finish()
    }
}

impl LocalStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl PolicyStore for LocalStore {
    fn add_key_set(&self, name: &str, key_set: Arc<dyn KeySet>) {
        self.inner.write().key_sets.insert(name.to_owned(), key_set);
    }

    fn get_key_set(&self, name: &str) -> Option<Arc<dyn KeySet>> {
        self.inner.read().key_sets.get(name).cloned()
    }

    fn delete_key_set(&self, name: &str) -> bool {
        self.inner.write().key_sets.remove(name).is_some()
    }

    fn add_client(&self, name: &str, client: Arc<Client>) {
        self.inner.write().clients.insert(name.to_owned(), client);
    }

    fn get_client(&self, name: &str) -> Option<Arc<Client>> {
        self.inner.read().clients.get(name).cloned()
    }

    fn delete_client(&self, name: &str) -> bool {
        self.inner.write().clients.remove(name).is_some()
    }

    fn set_policies(&self, endpoint: &Endpoint, policy: RoutePolicy) {
        let mut inner = self.inner.write();
        let trie = inner.policies.entry(endpoint.service.clone()).or_default();
        if let Some(table) = trie.get_mut(&endpoint.path) {
            table.insert(endpoint.method, policy);
        } else {
            trie.put(&endpoint.path, HashMap::from([(endpoint.method, policy)]));
        }
    }

    fn get_policies(&self, endpoint: &Endpoint) -> RoutePolicy {
        let inner = self.inner.read();
        inner
            .policies
            .get(&endpoint.service)
            .and_then(|trie| trie.get_actions(&endpoint.path, true))
            .and_then(|table| {
                table
                    .get(&endpoint.method)
                    .or_else(|| table.get(&Method::All))
            })
            .cloned()
            .unwrap_or_default()
    }

    fn delete_policies(&self, endpoint: &Endpoint) -> bool {
        let mut inner = self.inner.write();
        let Some(trie) = inner.policies.get_mut(&endpoint.service) else {
            return false;
        };
        let Some(table) = trie.get_mut(&endpoint.path) else {
            return false;
        };
        let removed = table.remove(&endpoint.method).is_some();
        if table.is_empty() {
            trie.delete(&endpoint.path);
        }
        if trie.is_empty() {
            inner.policies.remove(&endpoint.service);
        }
        removed
    }

    fn add_policy_mapping(&self, mapping: PolicyMapping) {
        self.inner
            .write()
            .mappings
            .insert(mapping.record.clone(), mapping);
    }

    fn get_policy_mapping(&self, record: &str) -> Option<PolicyMapping> {
        self.inner.read().mappings.get(record).cloned()
    }

    fn delete_policy_mapping(&self, record: &str) -> bool {
        self.inner.write().mappings.remove(record).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{PathPolicy, PolicyType};
    use crate::test_support::StaticKeySet;

    fn endpoint(path: &str, method: Method) -> Endpoint {
        Endpoint::new(Service::new("ns", "svc"), path, method)
    }

    fn route(reference: &str, config: &str) -> RoutePolicy {
        RoutePolicy::new(
            reference,
            vec![PathPolicy {
                policy_type: PolicyType::Jwt,
                config: config.to_string(),
                redirect_uri: String::new(),
                rules: vec![],
            }],
        )
    }

    #[test]
    fn test_set_and_get_exact_method() {
        let store = LocalStore::new();
        store.set_policies(&endpoint("/api", Method::Get), route("ns/p1", "cfg"));
        assert_eq!(
            store.get_policies(&endpoint("/api", Method::Get)).policy_reference,
            "ns/p1"
        );
        assert!(store.get_policies(&endpoint("/api", Method::Post)).is_empty());
    }

    #[test]
    fn test_method_falls_back_to_all() {
        let store = LocalStore::new();
        let x = route("ns/x", "cfg-x");
        let y = route("ns/y", "cfg-y");
        store.set_policies(&endpoint("/api", Method::Get), x.clone());
        store.set_policies(&endpoint("/api", Method::All), y.clone());
        assert_eq!(store.get_policies(&endpoint("/api", Method::Put)), y);
        assert_eq!(store.get_policies(&endpoint("/api", Method::Get)), x);
    }

    #[test]
    fn test_path_falls_back_to_wildcard() {
        let store = LocalStore::new();
        store.set_policies(&endpoint("/web/*", Method::All), route("ns/web", "cfg"));
        assert_eq!(
            store
                .get_policies(&endpoint("/web/user", Method::Get))
                .policy_reference,
            "ns/web"
        );
        assert!(store.get_policies(&endpoint("/api", Method::Get)).is_empty());
    }

    #[test]
    fn test_services_are_isolated() {
        let store = LocalStore::new();
        store.set_policies(&endpoint("/api", Method::All), route("ns/p", "cfg"));
        let other = Endpoint::new(Service::new("ns", "other"), "/api", Method::All);
        assert!(store.get_policies(&other).is_empty());
        let other_ns = Endpoint::new(Service::new("other", "svc"), "/api", Method::All);
        assert!(store.get_policies(&other_ns).is_empty());
    }

    #[test]
    fn test_set_replaces_single_method() {
        let store = LocalStore::new();
        store.set_policies(&endpoint("/api", Method::Get), route("ns/a", "cfg"));
        store.set_policies(&endpoint("/api", Method::Post), route("ns/b", "cfg"));
        store.set_policies(&endpoint("/api", Method::Get), route("ns/c", "cfg"));
        assert_eq!(
            store.get_policies(&endpoint("/api", Method::Get)).policy_reference,
            "ns/c"
        );
        assert_eq!(
            store.get_policies(&endpoint("/api", Method::Post)).policy_reference,
            "ns/b"
        );
    }

    #[test]
    fn test_delete_policies_prunes_path() {
        let store = LocalStore::new();
        store.set_policies(&endpoint("/api", Method::Get), route("ns/a", "cfg"));
        store.set_policies(&endpoint("/api", Method::Post), route("ns/b", "cfg"));

        assert!(store.delete_policies(&endpoint("/api", Method::Get)));
        assert!(store.get_policies(&endpoint("/api", Method::Get)).is_empty());
        assert!(!store.get_policies(&endpoint("/api", Method::Post)).is_empty());

        assert!(store.delete_policies(&endpoint("/api", Method::Post)));
        assert!(!store.delete_policies(&endpoint("/api", Method::Post)));
        assert!(store.inner.read().policies.is_empty());
    }

    #[test]
    fn test_delete_policies_missing() {
        let store = LocalStore::new();
        assert!(!store.delete_policies(&endpoint("/api", Method::Get)));
        store.set_policies(&endpoint("/api", Method::Get), route("ns/a", "cfg"));
        assert!(!store.delete_policies(&endpoint("/other", Method::Get)));
        assert!(!store.delete_policies(&endpoint("/api", Method::Put)));
    }

    #[test]
    fn test_key_set_registry() {
        let store = LocalStore::new();
        let key_set: Arc<dyn KeySet> = Arc::new(StaticKeySet::empty("https://issuer/jwks"));
        store.add_key_set("ns/cfg", Arc::clone(&key_set));

        let found = store.get_key_set("ns/cfg").unwrap();
        assert_eq!(found.url(), "https://issuer/jwks");
        assert!(store.get_key_set("ns/other").is_none());

        assert!(store.delete_key_set("ns/cfg"));
        assert!(!store.delete_key_set("ns/cfg"));
        assert!(store.get_key_set("ns/cfg").is_none());
    }

    #[test]
    fn test_policy_mapping_registry() {
        let store = LocalStore::new();
        let mapping = PolicyMapping::new(
            "ns/p1",
            vec![TargetPolicy {
                endpoint: endpoint("/api", Method::Get),
                actions: vec![],
            }],
        );
        store.add_policy_mapping(mapping.clone());
        assert_eq!(store.get_policy_mapping("ns/p1"), Some(mapping));
        assert!(store.delete_policy_mapping("ns/p1"));
        assert!(store.get_policy_mapping("ns/p1").is_none());
    }

    #[test]
    fn test_debug_output() {
        let store = LocalStore::new();
        let debug = format!("{store:?}");
        assert!(debug.contains("LocalStore"));
        assert!(debug.contains("services"));
    }
}
