//! Access control engine.
//!
//! The engine answers the question:
//! "Can user X use permission P, optionally on the record owned by student S?"
//!
//! A decision reconciles three independent sources: the static role
//! entitlement lists of the catalog, the tenant's module activation, and the
//! tenant's role→module grants. Unknown permissions, users and modules all
//! deny; only directory failures surface as errors.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use super::cache::ModuleCache;
use super::catalog::{PermissionCatalog, PermissionDefinition};
use super::models::{RoleId, Scope, StudentId, UserContext, UserId};
use super::roles::SystemRole;
use crate::directory::{Directory, DirectoryResult};
use crate::error::{Result, SchoolgateError};
use crate::telemetry::AccessMetrics;

// ═══════════════════════════════════════════════════════════════════════════════
// Decision
// ═══════════════════════════════════════════════════════════════════════════════

/// Why a permission was granted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowReason {
    /// The user holds the SUPERADMIN role.
    Superadmin,
    /// Global-scope permission listed for this role.
    RoleEntitlement(SystemRole),
    /// School-scope permission, module active and granted to this role.
    SchoolGrant(SystemRole),
    /// Own-scope permission without a specific record.
    OwnListing(SystemRole),
    /// The record belongs to a student linked to this parent.
    LinkedStudent,
    /// The record is the student's own.
    OwnRecord,
}

/// Why a permission was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    UnknownPermission,
    UnknownUser,
    NoRoles,
    /// None of the user's roles lists the permission.
    NotEntitled,
    /// The user belongs to no school.
    NoSchool,
    /// The directory has no row for the permission's module.
    ModuleNotFound(String),
    ModuleInactive(String),
    /// No entitled role holds a grant for the module.
    NoGrant(String),
    /// An own-scope check on a record the user is not tied to.
    NotOwner(StudentId),
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownPermission => write!(f, "unknown permission"),
            Self::UnknownUser => write!(f, "unknown user"),
            Self::NoRoles => write!(f, "user has no roles"),
            Self::NotEntitled => write!(f, "no role lists the permission"),
            Self::NoSchool => write!(f, "user belongs to no school"),
            Self::ModuleNotFound(module) => write!(f, "module {module} not found"),
            Self::ModuleInactive(module) => write!(f, "module {module} is not active"),
            Self::NoGrant(module) => write!(f, "no role holds a grant for module {module}"),
            Self::NotOwner(student) => write!(f, "record {student} is not owned by the user"),
        }
    }
}

impl fmt::Display for AllowReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Superadmin => write!(f, "superadmin"),
            Self::RoleEntitlement(role) => write!(f, "global permission of {role}"),
            Self::SchoolGrant(role) => write!(f, "module granted to {role}"),
            Self::OwnListing(role) => write!(f, "own records of {role}"),
            Self::LinkedStudent => write!(f, "linked student"),
            Self::OwnRecord => write!(f, "own record"),
        }
    }
}

/// Result of a policy evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDecision {
    /// The action is allowed.
    Allow(AllowReason),
    /// The action is denied, with a reason.
    Deny(DenyReason),
}

impl PolicyDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow(_))
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Deny(_))
    }
}

impl fmt::Display for PolicyDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow(reason) => write!(f, "allow ({reason})"),
            Self::Deny(reason) => write!(f, "deny ({reason})"),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Engine
// ═══════════════════════════════════════════════════════════════════════════════

/// Scope-aware permission resolution against a [`Directory`].
///
/// Cheap to clone; holds no per-request state.
#[derive(Clone)]
pub struct AccessControlEngine {
    directory: Arc<dyn Directory>,
    catalog: Arc<PermissionCatalog>,
    modules: Arc<ModuleCache>,
}

impl AccessControlEngine {
    pub fn new(
        directory: Arc<dyn Directory>,
        catalog: Arc<PermissionCatalog>,
        modules: Arc<ModuleCache>,
    ) -> Self {
        Self {
            directory,
            catalog,
            modules,
        }
    }

    /// Whether the user may use `permission_key`, optionally on the record of
    /// `resource_owner`.
    pub async fn check(
        &self,
        user_id: &UserId,
        permission_key: &str,
        resource_owner: Option<&StudentId>,
    ) -> DirectoryResult<bool> {
        Ok(self
            .evaluate(user_id, permission_key, resource_owner)
            .await?
            .is_allowed())
    }

    /// Like [`check`](Self::check), but fails with
    /// [`SchoolgateError::PermissionDenied`] on denial.
    pub async fn enforce(
        &self,
        user_id: &UserId,
        permission_key: &str,
        resource_owner: Option<&StudentId>,
    ) -> Result<()> {
        match self.evaluate(user_id, permission_key, resource_owner).await? {
            PolicyDecision::Allow(_) => Ok(()),
            PolicyDecision::Deny(reason) => {
                warn!(
                    user_id = %user_id,
                    permission = permission_key,
                    reason = %reason,
                    "Permission denied"
                );
                let err = SchoolgateError::PermissionDenied(permission_key.to_string());
                err.record_metrics();
                Err(err)
            }
        }
    }

    /// Full decision with the reason behind it.
    pub async fn evaluate(
        &self,
        user_id: &UserId,
        permission_key: &str,
        resource_owner: Option<&StudentId>,
    ) -> DirectoryResult<PolicyDecision> {
        let Some(definition) = self.catalog.lookup(permission_key) else {
            return Ok(self.finish(user_id, permission_key, None, PolicyDecision::Deny(DenyReason::UnknownPermission)));
        };

        let decision = match self.directory.get_user_context(user_id).await? {
            None => PolicyDecision::Deny(DenyReason::UnknownUser),
            Some(ctx) => self.decide(&ctx, definition, resource_owner).await?,
        };

        Ok(self.finish(user_id, permission_key, Some(definition.scope), decision))
    }

    /// `true` if every key is allowed. The user context is loaded once.
    pub async fn check_all(&self, user_id: &UserId, permission_keys: &[&str]) -> DirectoryResult<bool> {
        let Some(ctx) = self.directory.get_user_context(user_id).await? else {
            return Ok(false);
        };

        for key in permission_keys {
            let Some(definition) = self.catalog.lookup(key) else {
                return Ok(false);
            };
            let decision = self.decide(&ctx, definition, None).await?;
            if !self.finish(user_id, key, Some(definition.scope), decision).is_allowed() {
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// `true` if at least one key is allowed.
    pub async fn check_any(&self, user_id: &UserId, permission_keys: &[&str]) -> DirectoryResult<bool> {
        let Some(ctx) = self.directory.get_user_context(user_id).await? else {
            return Ok(false);
        };

        for key in permission_keys {
            let Some(definition) = self.catalog.lookup(key) else {
                continue;
            };
            let decision = self.decide(&ctx, definition, None).await?;
            if self.finish(user_id, key, Some(definition.scope), decision).is_allowed() {
                return Ok(true);
            }
        }

        Ok(false)
    }

    pub fn catalog(&self) -> &PermissionCatalog {
        &self.catalog
    }

    async fn decide(
        &self,
        ctx: &UserContext,
        definition: &PermissionDefinition,
        resource_owner: Option<&StudentId>,
    ) -> DirectoryResult<PolicyDecision> {
        if ctx.roles.is_empty() {
            return Ok(PolicyDecision::Deny(DenyReason::NoRoles));
        }
        if ctx.is_superadmin() {
            return Ok(PolicyDecision::Allow(AllowReason::Superadmin));
        }

        // Roles whose static list contains the key.
        let entitled: Vec<(&RoleId, SystemRole)> = ctx
            .roles
            .iter()
            .filter_map(|role| role.system_role().map(|system| (&role.id, system)))
            .filter(|(_, system)| self.catalog.role_has_permission(*system, definition.key))
            .collect();

        let Some(&(_, first)) = entitled.first() else {
            return Ok(PolicyDecision::Deny(DenyReason::NotEntitled));
        };

        if definition.scope == Scope::Global {
            return Ok(PolicyDecision::Allow(AllowReason::RoleEntitlement(first)));
        }

        let Some(school_id) = &ctx.school_id else {
            return Ok(PolicyDecision::Deny(DenyReason::NoSchool));
        };

        let module_key = definition.module.as_str();
        let Some(module) = self
            .modules
            .get_or_fetch(self.directory.as_ref(), module_key)
            .await?
        else {
            return Ok(PolicyDecision::Deny(DenyReason::ModuleNotFound(module_key.to_string())));
        };

        let active = self
            .directory
            .get_school_module_activation(school_id, &module.id)
            .await?
            .is_some_and(|activation| activation.is_active);
        if !active {
            return Ok(PolicyDecision::Deny(DenyReason::ModuleInactive(module.key)));
        }

        let role_ids: Vec<RoleId> = entitled.iter().map(|(id, _)| (*id).clone()).collect();
        let grants = self
            .directory
            .list_role_module_grants(school_id, std::slice::from_ref(&module.id), &role_ids)
            .await?;
        if grants.is_empty() {
            return Ok(PolicyDecision::Deny(DenyReason::NoGrant(module.key)));
        }

        let mut denial = DenyReason::NoGrant(module.key.clone());
        for (role_id, role) in &entitled {
            if !grants
                .iter()
                .any(|g| &g.role_id == *role_id && g.module_id == module.id)
            {
                continue;
            }

            match (definition.scope, resource_owner) {
                (Scope::School, _) => return Ok(PolicyDecision::Allow(AllowReason::SchoolGrant(*role))),
                (_, None) => return Ok(PolicyDecision::Allow(AllowReason::OwnListing(*role))),
                (_, Some(owner)) => match role {
                    SystemRole::Parent if ctx.linked_student_ids.contains(owner) => {
                        return Ok(PolicyDecision::Allow(AllowReason::LinkedStudent));
                    }
                    SystemRole::Student if ctx.own_student_id.as_ref() == Some(owner) => {
                        return Ok(PolicyDecision::Allow(AllowReason::OwnRecord));
                    }
                    _ => denial = DenyReason::NotOwner(owner.clone()),
                },
            }
        }

        Ok(PolicyDecision::Deny(denial))
    }

    fn finish(
        &self,
        user_id: &UserId,
        permission_key: &str,
        scope: Option<Scope>,
        decision: PolicyDecision,
    ) -> PolicyDecision {
        debug!(
            user_id = %user_id,
            permission = permission_key,
            decision = %decision,
            "Access decision"
        );
        AccessMetrics::record_check(scope.map_or("unknown", |s| s.as_str()), decision.is_allowed());
        decision
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::directory::memory::{standard_module_id, standard_role_id};
    use crate::directory::{InMemoryDirectory, UserRecord};
    use crate::rbac::catalog::ModuleKey;
    use crate::rbac::models::SchoolId;

    fn school() -> SchoolId {
        SchoolId::new("school-1")
    }

    fn engine(dir: &Arc<InMemoryDirectory>) -> AccessControlEngine {
        AccessControlEngine::new(
            dir.clone(),
            Arc::new(PermissionCatalog::standard().clone()),
            Arc::new(ModuleCache::new(CacheConfig::default())),
        )
    }

    fn activate(dir: &InMemoryDirectory, module: ModuleKey, roles: &[SystemRole]) {
        let module_id = standard_module_id(module);
        dir.set_activation(&school(), &module_id, true);
        for role in roles {
            dir.grant(&standard_role_id(*role), &school(), &module_id);
        }
    }

    fn user(dir: &InMemoryDirectory, id: &str, role: SystemRole) -> UserId {
        dir.insert_user(
            UserRecord::new(id)
                .in_school("school-1")
                .with_role(standard_role_id(role)),
        );
        UserId::new(id)
    }

    #[tokio::test]
    async fn test_unknown_permission_denies() {
        let dir = Arc::new(InMemoryDirectory::with_standard_catalog());
        let admin = user(&dir, "admin", SystemRole::Superadmin);
        let decision = engine(&dir).evaluate(&admin, "students.fly", None).await.unwrap();
        assert_eq!(decision, PolicyDecision::Deny(DenyReason::UnknownPermission));
    }

    #[tokio::test]
    async fn test_unknown_user_and_roleless_user_deny() {
        let dir = Arc::new(InMemoryDirectory::with_standard_catalog());
        dir.insert_user(UserRecord::new("nobody").in_school("school-1"));
        let engine = engine(&dir);

        let missing = engine.evaluate(&UserId::new("ghost"), "students.read", None).await.unwrap();
        assert_eq!(missing, PolicyDecision::Deny(DenyReason::UnknownUser));

        let roleless = engine.evaluate(&UserId::new("nobody"), "students.read", None).await.unwrap();
        assert_eq!(roleless, PolicyDecision::Deny(DenyReason::NoRoles));
    }

    #[tokio::test]
    async fn test_superadmin_bypasses_activation() {
        let dir = Arc::new(InMemoryDirectory::with_standard_catalog());
        let admin = user(&dir, "admin", SystemRole::Superadmin);
        let decision = engine(&dir).evaluate(&admin, "paces.grade", None).await.unwrap();
        assert_eq!(decision, PolicyDecision::Allow(AllowReason::Superadmin));
    }

    #[tokio::test]
    async fn test_global_scope_is_role_gated_only() {
        let dir = Arc::new(InMemoryDirectory::with_standard_catalog());
        let teacher = user(&dir, "teacher", SystemRole::Teacher);
        let engine = engine(&dir);
        dir.reset_calls();

        let decision = engine.evaluate(&teacher, "configuration.read", None).await.unwrap();
        assert_eq!(
            decision,
            PolicyDecision::Allow(AllowReason::RoleEntitlement(SystemRole::Teacher))
        );
        // Only the user context was read.
        assert_eq!(dir.calls(), 1);

        assert!(!engine.check(&teacher, "schools.create", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_school_scope_reasons() {
        let dir = Arc::new(InMemoryDirectory::with_standard_catalog());
        let teacher = user(&dir, "teacher", SystemRole::Teacher);
        let engine = engine(&dir);

        let inactive = engine.evaluate(&teacher, "students.read", None).await.unwrap();
        assert_eq!(inactive, PolicyDecision::Deny(DenyReason::ModuleInactive("students".into())));

        activate(&dir, ModuleKey::Students, &[SystemRole::SchoolAdmin]);
        let ungranted = engine.evaluate(&teacher, "students.read", None).await.unwrap();
        assert_eq!(ungranted, PolicyDecision::Deny(DenyReason::NoGrant("students".into())));

        activate(&dir, ModuleKey::Students, &[SystemRole::Teacher]);
        let allowed = engine.evaluate(&teacher, "students.read", None).await.unwrap();
        assert_eq!(allowed, PolicyDecision::Allow(AllowReason::SchoolGrant(SystemRole::Teacher)));

        let not_listed = engine.evaluate(&teacher, "students.delete", None).await.unwrap();
        assert_eq!(not_listed, PolicyDecision::Deny(DenyReason::NotEntitled));
    }

    #[tokio::test]
    async fn test_user_without_school_denied_school_scope() {
        let dir = Arc::new(InMemoryDirectory::with_standard_catalog());
        dir.insert_user(UserRecord::new("drifter").with_role(standard_role_id(SystemRole::Teacher)));
        let decision = engine(&dir)
            .evaluate(&UserId::new("drifter"), "students.read", None)
            .await
            .unwrap();
        assert_eq!(decision, PolicyDecision::Deny(DenyReason::NoSchool));
    }

    #[tokio::test]
    async fn test_own_scope_student() {
        let dir = Arc::new(InMemoryDirectory::with_standard_catalog());
        dir.insert_user(
            UserRecord::new("pupil")
                .in_school("school-1")
                .with_role(standard_role_id(SystemRole::Student))
                .as_student("student-7"),
        );
        activate(&dir, ModuleKey::Paces, &[SystemRole::Student]);
        let engine = engine(&dir);
        let pupil = UserId::new("pupil");

        let own = engine
            .evaluate(&pupil, "paces.readOwn", Some(&StudentId::new("student-7")))
            .await
            .unwrap();
        assert_eq!(own, PolicyDecision::Allow(AllowReason::OwnRecord));

        let other = engine
            .evaluate(&pupil, "paces.readOwn", Some(&StudentId::new("student-8")))
            .await
            .unwrap();
        assert_eq!(other, PolicyDecision::Deny(DenyReason::NotOwner(StudentId::new("student-8"))));

        assert!(engine.check(&pupil, "paces.readOwn", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_enforce_names_the_permission() {
        let dir = Arc::new(InMemoryDirectory::with_standard_catalog());
        let teacher = user(&dir, "teacher", SystemRole::Teacher);
        let err = engine(&dir)
            .enforce(&teacher, "students.read", None)
            .await
            .unwrap_err();
        assert!(matches!(err, SchoolgateError::PermissionDenied(ref key) if key == "students.read"));
    }

    #[tokio::test]
    async fn test_directory_failure_propagates() {
        let dir = Arc::new(InMemoryDirectory::with_standard_catalog());
        let teacher = user(&dir, "teacher", SystemRole::Teacher);
        dir.set_unavailable(true);
        let engine = engine(&dir);

        assert!(engine.check(&teacher, "students.read", None).await.is_err());
        let err = engine.enforce(&teacher, "students.read", None).await.unwrap_err();
        assert!(matches!(err, SchoolgateError::Directory(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_check_all_and_any() {
        let dir = Arc::new(InMemoryDirectory::with_standard_catalog());
        let teacher = user(&dir, "teacher", SystemRole::Teacher);
        activate(&dir, ModuleKey::Students, &[SystemRole::Teacher]);
        let engine = engine(&dir);

        assert!(engine.check_all(&teacher, &["students.read", "configuration.read"]).await.unwrap());
        assert!(!engine.check_all(&teacher, &["students.read", "students.delete"]).await.unwrap());
        assert!(engine.check_any(&teacher, &["nope.nope", "students.read"]).await.unwrap());
        assert!(!engine.check_any(&teacher, &["students.delete", "schools.create"]).await.unwrap());
        assert!(!engine.check_any(&UserId::new("ghost"), &["students.read"]).await.unwrap());
    }
}
