//! In-memory directory backed by `DashMap`.
//!
//! Used by tests, benchmarks and the CLI (through snapshots). Upserts go
//! through the entry API so concurrent writers to the same key serialize.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::trace;
use uuid::Uuid;

use super::snapshot::{DirectorySnapshot, UserRecord};
use super::{Directory, DirectoryError, DirectoryResult};
use crate::rbac::catalog::ModuleKey;
use crate::rbac::models::{
    ModuleFilter, ModuleId, ModuleRecord, RoleId, RoleModuleGrant, RoleRecord, SchoolId,
    SchoolModuleActivation, UserContext, UserId,
};
use crate::rbac::roles::SystemRole;

/// Thread-safe in-memory implementation of [`Directory`].
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    roles: DashMap<RoleId, RoleRecord>,
    modules: DashMap<ModuleId, ModuleRecord>,
    users: DashMap<UserId, UserRecord>,
    activations: DashMap<(SchoolId, ModuleId), SchoolModuleActivation>,
    grants: DashMap<(RoleId, SchoolId, ModuleId), RoleModuleGrant>,

    /// Simulated outage: every call fails with `DirectoryError::Unavailable`.
    unavailable: AtomicBool,
    /// Number of contract calls served.
    calls: AtomicU64,
}

impl InMemoryDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// A directory holding the five system roles and one row per catalog
    /// module, with deterministic ids (`role-<name>`, `module-<key>`).
    pub fn with_standard_catalog() -> Self {
        let directory = Self::new();
        for role in SystemRole::all() {
            directory.insert_role(RoleRecord::new(standard_role_id(role).0, role.name()));
        }
        for module in ModuleKey::ALL {
            directory.insert_module(
                ModuleRecord::new(standard_module_id(module).0, module.as_str(), module.display_name())
                    .with_description(module.description())
                    .with_display_order(module.display_order()),
            );
        }
        directory
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Seeding
    // ─────────────────────────────────────────────────────────────────────────

    pub fn insert_role(&self, role: RoleRecord) {
        self.roles.insert(role.id.clone(), role);
    }

    pub fn insert_module(&self, module: ModuleRecord) {
        self.modules.insert(module.id.clone(), module);
    }

    /// Register a module row under a freshly generated id.
    pub fn register_module(&self, key: impl Into<String>, name: impl Into<String>) -> ModuleId {
        let id = ModuleId::new(Uuid::new_v4().to_string());
        self.insert_module(ModuleRecord::new(id.as_str(), key, name));
        id
    }

    pub fn insert_user(&self, user: UserRecord) {
        self.users.insert(user.id.clone(), user);
    }

    pub fn remove_role(&self, role_id: &RoleId) -> Option<RoleRecord> {
        self.roles.remove(role_id).map(|(_, role)| role)
    }

    /// Set an activation row without going through the lifecycle manager.
    pub fn set_activation(&self, school_id: &SchoolId, module_id: &ModuleId, is_active: bool) {
        self.write_activation(school_id, module_id, is_active);
    }

    /// Create a grant row without going through the lifecycle manager.
    pub fn grant(&self, role_id: &RoleId, school_id: &SchoolId, module_id: &ModuleId) {
        self.write_grant(role_id, school_id, module_id);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Inspection
    // ─────────────────────────────────────────────────────────────────────────

    pub fn has_grant(&self, role_id: &RoleId, school_id: &SchoolId, module_id: &ModuleId) -> bool {
        self.grants
            .contains_key(&(role_id.clone(), school_id.clone(), module_id.clone()))
    }

    pub fn is_active(&self, school_id: &SchoolId, module_id: &ModuleId) -> bool {
        self.activations
            .get(&(school_id.clone(), module_id.clone()))
            .is_some_and(|a| a.is_active)
    }

    pub fn grant_count(&self) -> usize {
        self.grants.len()
    }

    /// Number of contract calls served so far.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn reset_calls(&self) {
        self.calls.store(0, Ordering::Relaxed);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Relaxed);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Snapshots
    // ─────────────────────────────────────────────────────────────────────────

    pub fn from_snapshot(snapshot: DirectorySnapshot) -> Self {
        let directory = Self::new();
        for role in snapshot.roles {
            directory.insert_role(role);
        }
        for module in snapshot.modules {
            directory.insert_module(module);
        }
        for user in snapshot.users {
            directory.insert_user(user);
        }
        for activation in snapshot.activations {
            directory.activations.insert(
                (activation.school_id.clone(), activation.module_id.clone()),
                activation,
            );
        }
        for grant in snapshot.grants {
            directory.grants.insert(
                (grant.role_id.clone(), grant.school_id.clone(), grant.module_id.clone()),
                grant,
            );
        }
        directory
    }

    /// Copy the current state into a snapshot with stable ordering.
    pub fn to_snapshot(&self) -> DirectorySnapshot {
        let mut roles: Vec<_> = self.roles.iter().map(|e| e.value().clone()).collect();
        roles.sort_by(|a, b| a.id.cmp(&b.id));

        let mut modules: Vec<_> = self.modules.iter().map(|e| e.value().clone()).collect();
        modules.sort_by(|a, b| a.display_order.cmp(&b.display_order).then(a.key.cmp(&b.key)));

        let mut users: Vec<_> = self.users.iter().map(|e| e.value().clone()).collect();
        users.sort_by(|a, b| a.id.cmp(&b.id));

        let mut activations: Vec<_> = self.activations.iter().map(|e| e.value().clone()).collect();
        activations.sort_by(|a, b| {
            a.school_id
                .cmp(&b.school_id)
                .then(a.module_id.cmp(&b.module_id))
        });

        let mut grants: Vec<_> = self.grants.iter().map(|e| e.value().clone()).collect();
        grants.sort_by(|a, b| {
            a.school_id
                .cmp(&b.school_id)
                .then(a.module_id.cmp(&b.module_id))
                .then(a.role_id.cmp(&b.role_id))
        });

        DirectorySnapshot {
            roles,
            modules,
            users,
            activations,
            grants,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    fn enter(&self, operation: &'static str) -> DirectoryResult<()> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        trace!(operation, "Directory call");
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(DirectoryError::Unavailable(format!(
                "in-memory directory offline during {operation}"
            )));
        }
        Ok(())
    }

    fn write_activation(&self, school_id: &SchoolId, module_id: &ModuleId, is_active: bool) {
        let now = Utc::now();
        self.activations
            .entry((school_id.clone(), module_id.clone()))
            .and_modify(|a| {
                a.is_active = is_active;
                a.updated_at = now;
            })
            .or_insert_with(|| SchoolModuleActivation {
                school_id: school_id.clone(),
                module_id: module_id.clone(),
                is_active,
                updated_at: now,
            });
    }

    fn write_grant(&self, role_id: &RoleId, school_id: &SchoolId, module_id: &ModuleId) {
        self.grants
            .entry((role_id.clone(), school_id.clone(), module_id.clone()))
            .or_insert_with(|| RoleModuleGrant {
                role_id: role_id.clone(),
                school_id: school_id.clone(),
                module_id: module_id.clone(),
                granted_at: Utc::now(),
            });
    }
}

/// Role row id used by [`InMemoryDirectory::with_standard_catalog`].
pub fn standard_role_id(role: SystemRole) -> RoleId {
    RoleId::new(format!("role-{}", role.name().to_lowercase()))
}

/// Module row id used by [`InMemoryDirectory::with_standard_catalog`].
pub fn standard_module_id(module: ModuleKey) -> ModuleId {
    ModuleId::new(format!("module-{}", module.as_str()))
}

#[async_trait]
impl Directory for InMemoryDirectory {
    async fn get_user_context(&self, user_id: &UserId) -> DirectoryResult<Option<UserContext>> {
        self.enter("get_user_context")?;
        let Some(user) = self.users.get(user_id) else {
            return Ok(None);
        };

        let roles = user
            .role_ids
            .iter()
            .filter_map(|id| self.roles.get(id).map(|r| r.value().clone()))
            .collect();

        Ok(Some(UserContext {
            user_id: user.id.clone(),
            school_id: user.school_id.clone(),
            roles,
            linked_student_ids: user.linked_student_ids.iter().cloned().collect(),
            own_student_id: user.student_id.clone(),
        }))
    }

    async fn get_module_by_key(&self, key: &str) -> DirectoryResult<Option<ModuleRecord>> {
        self.enter("get_module_by_key")?;
        Ok(self
            .modules
            .iter()
            .find(|m| m.key == key)
            .map(|m| m.value().clone()))
    }

    async fn get_module_by_id(&self, id: &ModuleId) -> DirectoryResult<Option<ModuleRecord>> {
        self.enter("get_module_by_id")?;
        Ok(self.modules.get(id).map(|m| m.value().clone()))
    }

    async fn list_modules(&self, filter: &ModuleFilter) -> DirectoryResult<Vec<ModuleRecord>> {
        self.enter("list_modules")?;
        let mut modules: Vec<_> = self
            .modules
            .iter()
            .filter(|m| filter.matches(m.value()))
            .map(|m| m.value().clone())
            .collect();
        modules.sort_by(|a, b| a.display_order.cmp(&b.display_order).then(a.key.cmp(&b.key)));
        Ok(modules)
    }

    async fn get_school_module_activation(
        &self,
        school_id: &SchoolId,
        module_id: &ModuleId,
    ) -> DirectoryResult<Option<SchoolModuleActivation>> {
        self.enter("get_school_module_activation")?;
        Ok(self
            .activations
            .get(&(school_id.clone(), module_id.clone()))
            .map(|a| a.value().clone()))
    }

    async fn list_school_module_activations(
        &self,
        school_id: &SchoolId,
        module_ids: &[ModuleId],
    ) -> DirectoryResult<Vec<SchoolModuleActivation>> {
        self.enter("list_school_module_activations")?;
        Ok(module_ids
            .iter()
            .filter_map(|module_id| {
                self.activations
                    .get(&(school_id.clone(), module_id.clone()))
                    .map(|a| a.value().clone())
            })
            .collect())
    }

    async fn list_role_module_grants(
        &self,
        school_id: &SchoolId,
        module_ids: &[ModuleId],
        role_ids: &[RoleId],
    ) -> DirectoryResult<Vec<RoleModuleGrant>> {
        self.enter("list_role_module_grants")?;
        let mut grants = Vec::new();
        for role_id in role_ids {
            for module_id in module_ids {
                let key = (role_id.clone(), school_id.clone(), module_id.clone());
                if let Some(grant) = self.grants.get(&key) {
                    grants.push(grant.value().clone());
                }
            }
        }
        Ok(grants)
    }

    async fn upsert_school_module_activation(
        &self,
        school_id: &SchoolId,
        module_id: &ModuleId,
        is_active: bool,
    ) -> DirectoryResult<()> {
        self.enter("upsert_school_module_activation")?;
        self.write_activation(school_id, module_id, is_active);
        Ok(())
    }

    async fn upsert_role_module_grant(
        &self,
        role_id: &RoleId,
        school_id: &SchoolId,
        module_id: &ModuleId,
    ) -> DirectoryResult<()> {
        self.enter("upsert_role_module_grant")?;
        self.write_grant(role_id, school_id, module_id);
        Ok(())
    }

    async fn find_system_role_by_name(&self, name: &str) -> DirectoryResult<Option<RoleRecord>> {
        self.enter("find_system_role_by_name")?;
        Ok(self
            .roles
            .iter()
            .find(|r| r.name == name)
            .map(|r| r.value().clone()))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbac::models::StudentId;

    fn school() -> SchoolId {
        SchoolId::new("school-1")
    }

    #[tokio::test]
    async fn test_standard_catalog_rows() {
        let dir = InMemoryDirectory::with_standard_catalog();
        let students = dir.get_module_by_key("students").await.unwrap().unwrap();
        assert_eq!(students.id, standard_module_id(ModuleKey::Students));
        assert_eq!(students.name, "Students");

        let teacher = dir.find_system_role_by_name("TEACHER").await.unwrap().unwrap();
        assert_eq!(teacher.id, standard_role_id(SystemRole::Teacher));

        let all = dir.list_modules(&ModuleFilter::all()).await.unwrap();
        assert_eq!(all.len(), ModuleKey::ALL.len());
        assert_eq!(all[0].key, "users");
    }

    #[tokio::test]
    async fn test_user_context_resolves_roles() {
        let dir = InMemoryDirectory::with_standard_catalog();
        dir.insert_user(
            UserRecord::new("parent-1")
                .in_school("school-1")
                .with_role(standard_role_id(SystemRole::Parent))
                .with_role(RoleId::new("role-deleted"))
                .with_linked_student("student-1"),
        );

        let ctx = dir
            .get_user_context(&UserId::new("parent-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ctx.school_id, Some(school()));
        assert_eq!(ctx.roles.len(), 1);
        assert_eq!(ctx.roles[0].name, "PARENT");
        assert!(ctx.linked_student_ids.contains(&StudentId::new("student-1")));

        assert!(dir
            .get_user_context(&UserId::new("ghost"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_activation_upsert_is_idempotent() {
        let dir = InMemoryDirectory::with_standard_catalog();
        let module = standard_module_id(ModuleKey::Students);

        dir.upsert_school_module_activation(&school(), &module, true)
            .await
            .unwrap();
        dir.upsert_school_module_activation(&school(), &module, true)
            .await
            .unwrap();
        assert!(dir.is_active(&school(), &module));

        dir.upsert_school_module_activation(&school(), &module, false)
            .await
            .unwrap();
        let row = dir
            .get_school_module_activation(&school(), &module)
            .await
            .unwrap()
            .unwrap();
        assert!(!row.is_active);
        assert_eq!(dir.to_snapshot().activations.len(), 1);
    }

    #[tokio::test]
    async fn test_grant_listing_filters_by_role_and_module() {
        let dir = InMemoryDirectory::with_standard_catalog();
        let teacher = standard_role_id(SystemRole::Teacher);
        let parent = standard_role_id(SystemRole::Parent);
        let students = standard_module_id(ModuleKey::Students);
        let paces = standard_module_id(ModuleKey::Paces);

        dir.grant(&teacher, &school(), &students);
        dir.grant(&teacher, &school(), &students);
        dir.grant(&parent, &school(), &paces);
        dir.grant(&teacher, &SchoolId::new("school-2"), &paces);
        assert_eq!(dir.grant_count(), 3);

        let grants = dir
            .list_role_module_grants(&school(), &[students.clone(), paces.clone()], &[teacher.clone()])
            .await
            .unwrap();
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].module_id, students);
    }

    #[tokio::test]
    async fn test_outage_is_reported() {
        let dir = InMemoryDirectory::with_standard_catalog();
        dir.set_unavailable(true);
        let err = dir.get_module_by_key("students").await.unwrap_err();
        assert!(matches!(err, DirectoryError::Unavailable(_)));
        dir.set_unavailable(false);
        assert!(dir.get_module_by_key("students").await.is_ok());
        assert_eq!(dir.calls(), 2);
    }

    #[test]
    fn test_snapshot_round_trip_keeps_rows() {
        let dir = InMemoryDirectory::with_standard_catalog();
        let module = dir.register_module("library", "Library");
        dir.set_activation(&school(), &module, true);

        let restored = InMemoryDirectory::from_snapshot(dir.to_snapshot());
        assert!(restored.is_active(&school(), &module));
        assert_eq!(restored.to_snapshot().modules.len(), ModuleKey::ALL.len() + 1);
    }
}
