//! Per-tenant module enable/disable with dependency ordering.
//!
//! `enable` verifies every dependency before writing anything; `disable`
//! refuses while a dependent module is still active. Disabling leaves grant
//! rows in place, so re-enabling restores access without re-seeding roles.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, instrument, warn};

use super::catalog::{default_grant_roles, ModuleKey};
use super::graph::ModuleDependencyGraph;
use super::models::{ModuleFilter, ModuleId, ModuleRecord, SchoolId};
use crate::config::LifecycleConfig;
use crate::directory::Directory;
use crate::error::{Result, SchoolgateError};
use crate::telemetry::LifecycleMetrics;

/// Lifecycle operation, used for logs and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleOperation {
    Enable,
    Disable,
}

impl LifecycleOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enable => "enable",
            Self::Disable => "disable",
        }
    }
}

/// Enables and disables modules for a school.
#[derive(Clone)]
pub struct ModuleLifecycleManager {
    directory: Arc<dyn Directory>,
    graph: Arc<ModuleDependencyGraph>,
    /// One async mutex per school with an operation in flight.
    tenant_locks: Arc<DashMap<SchoolId, Arc<Mutex<()>>>>,
    config: LifecycleConfig,
}

impl ModuleLifecycleManager {
    pub fn new(
        directory: Arc<dyn Directory>,
        graph: Arc<ModuleDependencyGraph>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            directory,
            graph,
            tenant_locks: Arc::new(DashMap::new()),
            config,
        }
    }

    /// Turn a module on for a school and seed its default role grants.
    ///
    /// # Errors
    ///
    /// - [`SchoolgateError::ModuleNotFound`] if `module_id` is unknown
    /// - [`SchoolgateError::DependencyNotFound`] if a dependency has no directory row
    /// - [`SchoolgateError::DependencyNotEnabled`] naming the first inactive dependency
    #[instrument(skip(self), fields(school_id = %school_id, module_id = %module_id))]
    pub async fn enable(&self, school_id: &SchoolId, module_id: &ModuleId) -> Result<()> {
        let guard = self.lock(school_id).await;
        let result = self.enable_locked(school_id, module_id).await;
        drop(guard);
        self.release(school_id);
        Self::record(LifecycleOperation::Enable, school_id, module_id, &result);
        result
    }

    /// Turn a module off for a school. Grants are kept.
    ///
    /// # Errors
    ///
    /// - [`SchoolgateError::ModuleNotFound`] if `module_id` is unknown
    /// - [`SchoolgateError::DependentModuleEnabled`] naming an active dependent
    #[instrument(skip(self), fields(school_id = %school_id, module_id = %module_id))]
    pub async fn disable(&self, school_id: &SchoolId, module_id: &ModuleId) -> Result<()> {
        let guard = self.lock(school_id).await;
        let result = self.disable_locked(school_id, module_id).await;
        drop(guard);
        self.release(school_id);
        Self::record(LifecycleOperation::Disable, school_id, module_id, &result);
        result
    }

    pub fn graph(&self) -> &ModuleDependencyGraph {
        &self.graph
    }

    async fn enable_locked(&self, school_id: &SchoolId, module_id: &ModuleId) -> Result<()> {
        let module = self.load_module(module_id).await?;

        if let Some(key) = ModuleKey::parse(&module.key) {
            for dependency in self.graph.dependencies(key) {
                let Some(record) = self.directory.get_module_by_key(dependency.as_str()).await?
                else {
                    return Err(SchoolgateError::DependencyNotFound(dependency.to_string()));
                };
                let active = self
                    .directory
                    .get_school_module_activation(school_id, &record.id)
                    .await?
                    .is_some_and(|a| a.is_active);
                if !active {
                    return Err(SchoolgateError::DependencyNotEnabled(record.key));
                }
            }
        }

        self.directory
            .upsert_school_module_activation(school_id, module_id, true)
            .await?;

        for role in default_grant_roles(&module.key) {
            match self.directory.find_system_role_by_name(role.name()).await? {
                Some(record) => {
                    self.directory
                        .upsert_role_module_grant(&record.id, school_id, module_id)
                        .await?;
                }
                None => debug!(role = %role, module = %module.key, "System role missing, grant skipped"),
            }
        }

        Ok(())
    }

    async fn disable_locked(&self, school_id: &SchoolId, module_id: &ModuleId) -> Result<()> {
        let module = self.load_module(module_id).await?;

        if let Some(key) = ModuleKey::parse(&module.key) {
            let dependents: Vec<ModuleRecord> = self
                .directory
                .list_modules(&ModuleFilter::all())
                .await?
                .into_iter()
                .filter(|m| ModuleKey::parse(&m.key).is_some_and(|mk| self.graph.requires(mk, key)))
                .collect();

            if !dependents.is_empty() {
                let ids: Vec<ModuleId> = dependents.iter().map(|m| m.id.clone()).collect();
                let activations = self
                    .directory
                    .list_school_module_activations(school_id, &ids)
                    .await?;
                if let Some(active) = dependents.iter().find(|m| {
                    activations
                        .iter()
                        .any(|a| a.module_id == m.id && a.is_active)
                }) {
                    return Err(SchoolgateError::DependentModuleEnabled(active.key.clone()));
                }
            }
        }

        self.directory
            .upsert_school_module_activation(school_id, module_id, false)
            .await?;
        Ok(())
    }

    async fn load_module(&self, module_id: &ModuleId) -> Result<ModuleRecord> {
        self.directory
            .get_module_by_id(module_id)
            .await?
            .ok_or_else(|| SchoolgateError::ModuleNotFound(module_id.to_string()))
    }

    async fn lock(&self, school_id: &SchoolId) -> Option<OwnedMutexGuard<()>> {
        if !self.config.serialize_per_tenant {
            return None;
        }
        let mutex = self
            .tenant_locks
            .entry(school_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        Some(mutex.lock_owned().await)
    }

    /// Drop the school's mutex once no other caller holds or awaits it, so
    /// the map only tracks schools with operations in flight.
    fn release(&self, school_id: &SchoolId) {
        self.tenant_locks
            .remove_if(school_id, |_, mutex| Arc::strong_count(mutex) == 1);
    }

    fn record(
        operation: LifecycleOperation,
        school_id: &SchoolId,
        module_id: &ModuleId,
        result: &Result<()>,
    ) {
        if let Err(e) = result {
            e.record_metrics();
        }
        match result {
            Ok(()) => {
                info!(
                    operation = operation.as_str(),
                    school_id = %school_id,
                    module_id = %module_id,
                    "Module lifecycle updated"
                );
                LifecycleMetrics::record(operation.as_str(), "ok");
            }
            Err(e @ SchoolgateError::Directory(_)) => {
                e.log();
                LifecycleMetrics::record(operation.as_str(), "error");
            }
            Err(e) => {
                warn!(
                    operation = operation.as_str(),
                    school_id = %school_id,
                    module_id = %module_id,
                    error = %e,
                    "Module lifecycle rejected"
                );
                LifecycleMetrics::record(operation.as_str(), "rejected");
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::memory::{standard_module_id, standard_role_id};
    use crate::directory::InMemoryDirectory;
    use crate::rbac::models::RoleId;
    use crate::rbac::roles::SystemRole;

    fn school() -> SchoolId {
        SchoolId::new("school-1")
    }

    fn manager(dir: &Arc<InMemoryDirectory>) -> ModuleLifecycleManager {
        ModuleLifecycleManager::new(
            dir.clone(),
            Arc::new(ModuleDependencyGraph::standard().unwrap()),
            LifecycleConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_enable_seeds_default_grants() {
        let dir = Arc::new(InMemoryDirectory::with_standard_catalog());
        let billing = standard_module_id(ModuleKey::Billing);
        let students = standard_module_id(ModuleKey::Students);
        let manager = manager(&dir);

        manager.enable(&school(), &students).await.unwrap();
        manager.enable(&school(), &billing).await.unwrap();

        assert!(dir.is_active(&school(), &billing));
        assert!(dir.has_grant(&standard_role_id(SystemRole::Parent), &school(), &billing));
        assert!(dir.has_grant(&standard_role_id(SystemRole::SchoolAdmin), &school(), &billing));
        assert!(!dir.has_grant(&standard_role_id(SystemRole::Teacher), &school(), &billing));
    }

    #[tokio::test]
    async fn test_unknown_module_is_rejected() {
        let dir = Arc::new(InMemoryDirectory::with_standard_catalog());
        let manager = manager(&dir);
        let missing = ModuleId::new("module-nope");

        let err = manager.enable(&school(), &missing).await.unwrap_err();
        assert!(matches!(err, SchoolgateError::ModuleNotFound(ref id) if id == "module-nope"));
        let err = manager.disable(&school(), &missing).await.unwrap_err();
        assert!(matches!(err, SchoolgateError::ModuleNotFound(_)));
    }

    #[tokio::test]
    async fn test_missing_dependency_row() {
        let dir = Arc::new(InMemoryDirectory::new());
        let paces = dir.register_module("paces", "PACEs");
        let err = manager(&dir).enable(&school(), &paces).await.unwrap_err();
        assert!(matches!(err, SchoolgateError::DependencyNotFound(ref key) if key == "projections"));
        assert!(!dir.is_active(&school(), &paces));
    }

    #[tokio::test]
    async fn test_unrecognized_module_defaults_to_school_admin() {
        let dir = Arc::new(InMemoryDirectory::with_standard_catalog());
        let library = dir.register_module("library", "Library");
        manager(&dir).enable(&school(), &library).await.unwrap();

        assert!(dir.is_active(&school(), &library));
        assert!(dir.has_grant(&standard_role_id(SystemRole::SchoolAdmin), &school(), &library));
        assert_eq!(dir.grant_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_roles_are_skipped() {
        let dir = Arc::new(InMemoryDirectory::with_standard_catalog());
        dir.remove_role(&standard_role_id(SystemRole::Student));
        let students = standard_module_id(ModuleKey::Students);
        manager(&dir).enable(&school(), &students).await.unwrap();

        assert_eq!(dir.grant_count(), 3);
        assert!(!dir.has_grant(&RoleId::new("role-student"), &school(), &students));
    }

    #[tokio::test]
    async fn test_disable_ignores_inactive_dependents() {
        let dir = Arc::new(InMemoryDirectory::with_standard_catalog());
        let projections = standard_module_id(ModuleKey::Projections);
        let paces = standard_module_id(ModuleKey::Paces);
        let manager = manager(&dir);

        manager.enable(&school(), &projections).await.unwrap();
        manager.enable(&school(), &paces).await.unwrap();
        manager.disable(&school(), &paces).await.unwrap();
        manager.disable(&school(), &projections).await.unwrap();
        assert!(!dir.is_active(&school(), &projections));
    }

    #[tokio::test]
    async fn test_tenants_are_independent() {
        let dir = Arc::new(InMemoryDirectory::with_standard_catalog());
        let projections = standard_module_id(ModuleKey::Projections);
        let paces = standard_module_id(ModuleKey::Paces);
        let manager = manager(&dir);

        manager.enable(&school(), &projections).await.unwrap();
        let err = manager
            .enable(&SchoolId::new("school-2"), &paces)
            .await
            .unwrap_err();
        assert!(matches!(err, SchoolgateError::DependencyNotEnabled(ref key) if key == "projections"));
    }

    #[tokio::test]
    async fn test_concurrent_enables_on_one_school() {
        let dir = Arc::new(InMemoryDirectory::with_standard_catalog());
        let manager = manager(&dir);

        let handles: Vec<_> = ModuleKey::ALL
            .into_iter()
            .filter(|k| manager.graph().dependencies(*k).count() == 0)
            .map(|k| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.enable(&school(), &standard_module_id(k)).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert!(dir.is_active(&school(), &standard_module_id(ModuleKey::Students)));
        assert!(dir.is_active(&school(), &standard_module_id(ModuleKey::Projections)));
        assert!(manager.tenant_locks.is_empty());
    }

    #[tokio::test]
    async fn test_tenant_locks_released_after_each_operation() {
        let dir = Arc::new(InMemoryDirectory::with_standard_catalog());
        let manager = manager(&dir);
        let students = standard_module_id(ModuleKey::Students);

        for n in 0..20 {
            let school = SchoolId::new(format!("school-{n}"));
            manager.enable(&school, &students).await.unwrap();
            manager.disable(&school, &students).await.unwrap();
        }
        assert!(manager.tenant_locks.is_empty());

        // Failed operations release too.
        assert!(manager.enable(&school(), &ModuleId::new("nope")).await.is_err());
        assert!(manager.tenant_locks.is_empty());
    }
}
