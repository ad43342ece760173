//! Bulk "what can this user do" resolution.
//!
//! Produces the same answers as asking [`AccessControlEngine::check`] for
//! every permission without an owner id, but with a fixed number of directory
//! calls: the user context, one module batch (served from the module cache
//! where possible), and one activation plus one grant batch issued together.
//!
//! SUPERADMIN is the exception: decisions allow everything, while the profile
//! only lists the platform modules.
//!
//! [`AccessControlEngine::check`]: super::policy::AccessControlEngine::check

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use tracing::debug;

use super::cache::ModuleCache;
use super::catalog::{ModuleKey, PermissionCatalog, PermissionDefinition};
use super::models::{AccessProfile, ModuleId, ModuleSummary, RoleId, SchoolId, Scope, UserId};
use super::roles::SystemRole;
use crate::directory::{Directory, DirectoryResult};
use crate::telemetry::AccessMetrics;

/// Builds [`AccessProfile`]s from the catalog and the directory.
#[derive(Clone)]
pub struct AccessProfileBuilder {
    directory: Arc<dyn Directory>,
    catalog: Arc<PermissionCatalog>,
    modules: Arc<ModuleCache>,
}

impl AccessProfileBuilder {
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

    pub async fn build_profile(&self, user_id: &UserId) -> DirectoryResult<AccessProfile> {
        let Some(ctx) = self.directory.get_user_context(user_id).await? else {
            debug!(user_id = %user_id, "Unknown user, empty profile");
            return Ok(AccessProfile::empty());
        };
        if ctx.roles.is_empty() {
            return Ok(AccessProfile::empty());
        }

        let superadmin = ctx.is_superadmin();

        // Entitled (role, permission) pairs.
        let mut entitled: Vec<(&RoleId, &PermissionDefinition)> = Vec::new();
        for role in &ctx.roles {
            let Some(system) = role.system_role() else {
                continue;
            };
            for key in self.catalog.permissions_for_role(system) {
                let Some(definition) = self.catalog.lookup(key) else {
                    continue;
                };
                if system == SystemRole::Superadmin
                    && !ModuleKey::SUPERADMIN_PROFILE.contains(&definition.module)
                {
                    continue;
                }
                entitled.push((&role.id, definition));
            }
        }

        let module_keys: Vec<&str> = entitled
            .iter()
            .map(|(_, d)| d.module.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let records = self
            .modules
            .get_many(self.directory.as_ref(), &module_keys)
            .await?;

        let (active, granted) = match (&ctx.school_id, superadmin) {
            (Some(school_id), false) => {
                let tenant_ids: Vec<ModuleId> = entitled
                    .iter()
                    .filter(|(_, d)| d.scope != Scope::Global)
                    .filter_map(|(_, d)| records.get(d.module.as_str()))
                    .map(|m| m.id.clone())
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect();
                self.tenant_state(school_id, &tenant_ids, &ctx.role_ids()).await?
            }
            _ => (HashSet::new(), HashSet::new()),
        };

        let mut permissions: BTreeSet<&'static str> = BTreeSet::new();
        let mut actions: BTreeMap<&'static str, BTreeSet<&'static str>> = BTreeMap::new();
        for (role_id, definition) in &entitled {
            let allowed = superadmin
                || definition.scope == Scope::Global
                || records.get(definition.module.as_str()).is_some_and(|m| {
                    active.contains(&m.id) && granted.contains(&((*role_id).clone(), m.id.clone()))
                });
            if allowed {
                permissions.insert(definition.key);
                actions
                    .entry(definition.module.as_str())
                    .or_default()
                    .insert(definition.action());
            }
        }

        let mut modules: Vec<ModuleSummary> = actions
            .keys()
            .filter_map(|key| records.get(*key))
            .map(ModuleSummary::from)
            .collect();
        modules.sort_by(|a, b| a.display_order.cmp(&b.display_order).then_with(|| a.key.cmp(&b.key)));

        let profile = AccessProfile {
            permissions: permissions.into_iter().map(str::to_string).collect(),
            module_actions: actions
                .into_iter()
                .map(|(module, acts)| {
                    (module.to_string(), acts.into_iter().map(str::to_string).collect())
                })
                .collect(),
            modules,
        };

        AccessMetrics::record_profile();
        debug!(
            user_id = %user_id,
            permissions = profile.permissions.len(),
            modules = profile.modules.len(),
            "Built access profile"
        );
        Ok(profile)
    }

    /// Active module ids and `(role, module)` grant pairs of the tenant.
    async fn tenant_state(
        &self,
        school_id: &SchoolId,
        module_ids: &[ModuleId],
        role_ids: &[RoleId],
    ) -> DirectoryResult<(HashSet<ModuleId>, HashSet<(RoleId, ModuleId)>)> {
        if module_ids.is_empty() || role_ids.is_empty() {
            return Ok((HashSet::new(), HashSet::new()));
        }

        let (activations, grants) = futures::try_join!(
            self.directory.list_school_module_activations(school_id, module_ids),
            self.directory.list_role_module_grants(school_id, module_ids, role_ids),
        )?;

        let active = activations
            .into_iter()
            .filter(|a| a.is_active)
            .map(|a| a.module_id)
            .collect();
        let granted = grants
            .into_iter()
            .map(|g| (g.role_id, g.module_id))
            .collect();
        Ok((active, granted))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
