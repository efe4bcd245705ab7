//! Built-in resource kinds.
//!
//! Used when no discovery-backed resolver is attached. Lookup ignores case
//! and accepts the plural resource name as well as the kind.

use async_trait::async_trait;
use fleet_core::{ApiIdentity, ResolutionError, ResourceResolver, ScopeKey};

/// `(kind, group, version, plural, namespaced)`
const CORE_KINDS: &[(&str, &str, &str, &str, bool)] = &[
    ("Pod", "", "v1", "pods", true),
    ("Service", "", "v1", "services", true),
    ("ConfigMap", "", "v1", "configmaps", true),
    ("Secret", "", "v1", "secrets", true),
    ("ServiceAccount", "", "v1", "serviceaccounts", true),
    ("PersistentVolumeClaim", "", "v1", "persistentvolumeclaims", true),
    ("Event", "", "v1", "events", true),
    ("Namespace", "", "v1", "namespaces", false),
    ("Node", "", "v1", "nodes", false),
    ("PersistentVolume", "", "v1", "persistentvolumes", false),
    ("Deployment", "apps", "v1", "deployments", true),
    ("StatefulSet", "apps", "v1", "statefulsets", true),
    ("DaemonSet", "apps", "v1", "daemonsets", true),
    ("ReplicaSet", "apps", "v1", "replicasets", true),
    ("Job", "batch", "v1", "jobs", true),
    ("CronJob", "batch", "v1", "cronjobs", true),
    ("Ingress", "networking.k8s.io", "v1", "ingresses", true),
    ("NetworkPolicy", "networking.k8s.io", "v1", "networkpolicies", true),
    ("Role", "rbac.authorization.k8s.io", "v1", "roles", true),
    ("RoleBinding", "rbac.authorization.k8s.io", "v1", "rolebindings", true),
    ("ClusterRole", "rbac.authorization.k8s.io", "v1", "clusterroles", false),
    ("ClusterRoleBinding", "rbac.authorization.k8s.io", "v1", "clusterrolebindings", false),
    ("StorageClass", "storage.k8s.io", "v1", "storageclasses", false),
    ("CustomResourceDefinition", "apiextensions.k8s.io", "v1", "customresourcedefinitions", false),
];

/// Resolves the core kinds; the same table for every scope.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoreKindResolver;

impl CoreKindResolver {
    pub fn lookup(kind: &str) -> Option<ApiIdentity> {
        let kind = kind.trim();
        CORE_KINDS
            .iter()
            .find(|(name, _, _, plural, _)| {
                name.eq_ignore_ascii_case(kind) || plural.eq_ignore_ascii_case(kind)
            })
            .map(|(_, group, version, plural, namespaced)| {
                ApiIdentity::new(*group, *version, *plural, *namespaced)
            })
    }
}

#[async_trait]
impl ResourceResolver for CoreKindResolver {
    async fn resolve(&self, _scope: &ScopeKey, kind: &str) -> Result<ApiIdentity, ResolutionError> {
        Self::lookup(kind).ok_or_else(|| ResolutionError::UnknownKind {
            kind: kind.to_string(),
        })
    }
}
