//! One entry point wiring the catalog, graph, cache, engine, profile builder
//! and lifecycle manager over a shared [`Directory`].

use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::directory::{Directory, DirectoryResult};
use crate::error::Result;
use crate::rbac::{
    AccessControlEngine, AccessProfile, AccessProfileBuilder, CacheStats, ModuleCache,
    ModuleDependencyGraph, ModuleId, ModuleLifecycleManager, PermissionCatalog, PolicyDecision,
    SchoolId, StudentId, UserId,
};
use crate::telemetry;

/// Access layer facade.
#[derive(Clone)]
pub struct Gatekeeper {
    catalog: Arc<PermissionCatalog>,
    graph: Arc<ModuleDependencyGraph>,
    modules: Arc<ModuleCache>,
    engine: AccessControlEngine,
    profiles: AccessProfileBuilder,
    lifecycle: ModuleLifecycleManager,
}

impl Gatekeeper {
    /// Build over the standard catalog and dependency graph.
    pub fn new(directory: Arc<dyn Directory>, config: &Config) -> Result<Self> {
        let catalog = PermissionCatalog::standard().clone();
        let graph = ModuleDependencyGraph::standard()?;
        Self::with_catalog(directory, catalog, graph, config)
    }

    /// Build over a custom catalog and graph. Both are validated.
    pub fn with_catalog(
        directory: Arc<dyn Directory>,
        catalog: PermissionCatalog,
        graph: ModuleDependencyGraph,
        config: &Config,
    ) -> Result<Self> {
        catalog.validate()?;
        telemetry::describe_metrics();

        let catalog = Arc::new(catalog);
        let graph = Arc::new(graph);
        let modules = Arc::new(ModuleCache::new(config.cache.clone()));

        info!(
            permissions = catalog.len(),
            dependencies = graph.edges().count(),
            cache_enabled = modules.is_enabled(),
            "Access layer ready"
        );

        Ok(Self {
            engine: AccessControlEngine::new(directory.clone(), catalog.clone(), modules.clone()),
            profiles: AccessProfileBuilder::new(directory.clone(), catalog.clone(), modules.clone()),
            lifecycle: ModuleLifecycleManager::new(directory, graph.clone(), config.lifecycle.clone()),
            catalog,
            graph,
            modules,
        })
    }

    pub async fn check(
        &self,
        user_id: &UserId,
        permission_key: &str,
        resource_owner: Option<&StudentId>,
    ) -> DirectoryResult<bool> {
        self.engine.check(user_id, permission_key, resource_owner).await
    }

    pub async fn enforce(
        &self,
        user_id: &UserId,
        permission_key: &str,
        resource_owner: Option<&StudentId>,
    ) -> Result<()> {
        self.engine.enforce(user_id, permission_key, resource_owner).await
    }

    pub async fn evaluate(
        &self,
        user_id: &UserId,
        permission_key: &str,
        resource_owner: Option<&StudentId>,
    ) -> DirectoryResult<PolicyDecision> {
        self.engine.evaluate(user_id, permission_key, resource_owner).await
    }

    pub async fn build_profile(&self, user_id: &UserId) -> DirectoryResult<AccessProfile> {
        self.profiles.build_profile(user_id).await
    }

    pub async fn enable_module(&self, school_id: &SchoolId, module_id: &ModuleId) -> Result<()> {
        self.lifecycle.enable(school_id, module_id).await
    }

    pub async fn disable_module(&self, school_id: &SchoolId, module_id: &ModuleId) -> Result<()> {
        self.lifecycle.disable(school_id, module_id).await
    }

    pub fn engine(&self) -> &AccessControlEngine {
        &self.engine
    }

    pub fn catalog(&self) -> &PermissionCatalog {
        &self.catalog
    }

    pub fn graph(&self) -> &ModuleDependencyGraph {
        &self.graph
    }

    /// Drop cached module rows; `None` clears everything.
    pub fn invalidate_module_cache(&self, module_key: Option<&str>) {
        match module_key {
            Some(key) => {
                self.modules.invalidate(key);
            }
            None => self.modules.invalidate_all(),
        }
    }

    pub fn module_cache_stats(&self) -> CacheStats {
        self.modules.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::InMemoryDirectory;
    use crate::rbac::{ModuleKey, PermissionDefinition, Scope, SystemRole};

    #[tokio::test]
    async fn test_custom_catalog() {
        let dir = Arc::new(InMemoryDirectory::with_standard_catalog());
        dir.insert_user(
            crate::directory::UserRecord::new("root")
                .with_role(crate::directory::memory::standard_role_id(SystemRole::Superadmin)),
        );
        let narrow = PermissionCatalog::new(
            &[PermissionDefinition::new("students.read", ModuleKey::Students, Scope::School)],
            &[(SystemRole::Teacher, &["students.read"][..])],
        )
        .unwrap();
        let graph = ModuleDependencyGraph::standard().unwrap();
        let gate = Gatekeeper::with_catalog(dir, narrow, graph, &Config::default()).unwrap();
        assert_eq!(gate.catalog().len(), 1);

        let root = UserId::new("root");
        assert!(gate.check(&root, "students.read", None).await.unwrap());
        assert!(!gate.check(&root, "students.delete", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_module_cache_invalidation() {
        let dir = Arc::new(InMemoryDirectory::with_standard_catalog());
        let gate = Gatekeeper::new(dir.clone(), &Config::default()).unwrap();
        dir.insert_user(
            crate::directory::UserRecord::new("t")
                .in_school("s")
                .with_role(crate::directory::memory::standard_role_id(SystemRole::Teacher)),
        );

        gate.check(&UserId::new("t"), "students.read", None).await.unwrap();
        assert_eq!(gate.module_cache_stats().entries, 1);
        gate.invalidate_module_cache(Some("students"));
        assert_eq!(gate.module_cache_stats().entries, 0);
        gate.check(&UserId::new("t"), "students.read", None).await.unwrap();
        gate.invalidate_module_cache(None);
        assert_eq!(gate.module_cache_stats().entries, 0);
    }
}
