//! The permission catalog: compiled permission definitions, the module
//! enumeration they belong to, and the static role entitlement lists.
//!
//! The catalog is immutable configuration. `PermissionCatalog::standard()`
//! builds the shipped catalog once per process; custom catalogs can be
//! assembled with [`PermissionCatalog::new`], which validates them.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::OnceLock;

use super::models::Scope;
use super::roles::SystemRole;
use crate::error::{Result, SchoolgateError};

static STANDARD: OnceLock<PermissionCatalog> = OnceLock::new();

// ═══════════════════════════════════════════════════════════════════════════════
// Module keys
// ═══════════════════════════════════════════════════════════════════════════════

/// Every licensable feature area known to the catalog.
///
/// Directory module rows link to this enumeration by key; a row whose key is
/// not listed here is an "unrecognized" module with no permissions of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModuleKey {
    #[serde(rename = "users")]
    Users,
    #[serde(rename = "schools")]
    Schools,
    #[serde(rename = "configuration")]
    Configuration,
    #[serde(rename = "students")]
    Students,
    #[serde(rename = "teachers")]
    Teachers,
    #[serde(rename = "school_admin")]
    SchoolAdmin,
    #[serde(rename = "groups")]
    Groups,
    #[serde(rename = "projections")]
    Projections,
    #[serde(rename = "paces")]
    Paces,
    #[serde(rename = "monthlyAssignments")]
    MonthlyAssignments,
    #[serde(rename = "reportCards")]
    ReportCards,
    #[serde(rename = "billing")]
    Billing,
}

impl ModuleKey {
    pub const ALL: [ModuleKey; 12] = [
        Self::Users,
        Self::Schools,
        Self::Configuration,
        Self::Students,
        Self::Teachers,
        Self::SchoolAdmin,
        Self::Groups,
        Self::Projections,
        Self::Paces,
        Self::MonthlyAssignments,
        Self::ReportCards,
        Self::Billing,
    ];

    /// Modules a SUPERADMIN sees in bulk profile views.
    pub const SUPERADMIN_PROFILE: [ModuleKey; 3] =
        [Self::Users, Self::Schools, Self::Configuration];

    /// The key used in permission keys and directory rows.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Schools => "schools",
            Self::Configuration => "configuration",
            Self::Students => "students",
            Self::Teachers => "teachers",
            Self::SchoolAdmin => "school_admin",
            Self::Groups => "groups",
            Self::Projections => "projections",
            Self::Paces => "paces",
            Self::MonthlyAssignments => "monthlyAssignments",
            Self::ReportCards => "reportCards",
            Self::Billing => "billing",
        }
    }

    pub fn parse(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == key)
    }

    /// Default display name used when seeding module rows.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Users => "Users",
            Self::Schools => "Schools",
            Self::Configuration => "Configuration",
            Self::Students => "Students",
            Self::Teachers => "Teachers",
            Self::SchoolAdmin => "School Administration",
            Self::Groups => "Groups",
            Self::Projections => "Projections",
            Self::Paces => "PACEs",
            Self::MonthlyAssignments => "Monthly Assignments",
            Self::ReportCards => "Report Cards",
            Self::Billing => "Billing",
        }
    }

    /// Default description used when seeding module rows.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Users => "Platform user accounts",
            Self::Schools => "School tenants and their settings",
            Self::Configuration => "Platform-wide configuration",
            Self::Students => "Student enrollment and records",
            Self::Teachers => "Teaching staff",
            Self::SchoolAdmin => "School administrator accounts",
            Self::Groups => "Class groups and assignments of teachers",
            Self::Projections => "Yearly curriculum projections per student",
            Self::Paces => "PACE tracking and grading",
            Self::MonthlyAssignments => "Monthly assignments and grading",
            Self::ReportCards => "Report card generation",
            Self::Billing => "Tuition billing and payments",
        }
    }

    /// Default display order used when seeding module rows.
    pub fn display_order(&self) -> i32 {
        let position = Self::ALL.iter().position(|m| m == self).unwrap_or(0);
        (position as i32 + 1) * 10
    }

    /// Roles that receive a grant when this module is enabled for a school.
    pub fn default_grant_roles(&self) -> &'static [SystemRole] {
        use SystemRole::*;
        match self {
            Self::Students
            | Self::Projections
            | Self::Paces
            | Self::MonthlyAssignments
            | Self::ReportCards => &[SchoolAdmin, Teacher, Parent, Student],
            Self::Users | Self::Schools | Self::Configuration => &[Superadmin],
            Self::Teachers | Self::Groups => &[SchoolAdmin, Teacher],
            Self::Billing => &[SchoolAdmin, Parent],
            Self::SchoolAdmin => &[SchoolAdmin],
        }
    }
}

impl fmt::Display for ModuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Default grant roles for any directory module key, including ones the
/// catalog does not recognize.
pub fn default_grant_roles(module_key: &str) -> &'static [SystemRole] {
    ModuleKey::parse(module_key)
        .map(|m| m.default_grant_roles())
        .unwrap_or(&[SystemRole::SchoolAdmin])
}

// ═══════════════════════════════════════════════════════════════════════════════
// Permission definitions
// ═══════════════════════════════════════════════════════════════════════════════

/// A compiled permission: key, owning module and scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PermissionDefinition {
    pub key: &'static str,
    pub module: ModuleKey,
    pub scope: Scope,
}

impl PermissionDefinition {
    pub const fn new(key: &'static str, module: ModuleKey, scope: Scope) -> Self {
        Self { key, module, scope }
    }

    /// The action part of the key (`"students.readOwn"` -> `"readOwn"`).
    pub fn action(&self) -> &'static str {
        self.key
            .split_once('.')
            .map(|(_, action)| action)
            .unwrap_or(self.key)
    }
}

macro_rules! perm {
    ($key:literal, $module:ident, $scope:ident) => {
        PermissionDefinition::new($key, ModuleKey::$module, Scope::$scope)
    };
}

const STANDARD_PERMISSIONS: &[PermissionDefinition] = &[
    // Platform (role-gated only)
    perm!("schools.create", Schools, Global),
    perm!("schools.read", Schools, Global),
    perm!("schools.update", Schools, Global),
    perm!("schools.delete", Schools, Global),
    perm!("users.create", Users, Global),
    perm!("users.read", Users, Global),
    perm!("users.update", Users, Global),
    perm!("users.delete", Users, Global),
    perm!("configuration.read", Configuration, Global),
    perm!("configuration.update", Configuration, Global),
    // Students
    perm!("students.create", Students, School),
    perm!("students.read", Students, School),
    perm!("students.update", Students, School),
    perm!("students.delete", Students, School),
    perm!("students.readOwn", Students, Own),
    // Staff
    perm!("teachers.create", Teachers, School),
    perm!("teachers.read", Teachers, School),
    perm!("teachers.update", Teachers, School),
    perm!("teachers.delete", Teachers, School),
    perm!("school_admin.read", SchoolAdmin, School),
    perm!("school_admin.manage", SchoolAdmin, School),
    perm!("groups.create", Groups, School),
    perm!("groups.read", Groups, School),
    perm!("groups.update", Groups, School),
    perm!("groups.delete", Groups, School),
    // Curriculum
    perm!("projections.create", Projections, School),
    perm!("projections.read", Projections, School),
    perm!("projections.update", Projections, School),
    perm!("projections.delete", Projections, School),
    perm!("projections.readOwn", Projections, Own),
    perm!("paces.create", Paces, School),
    perm!("paces.read", Paces, School),
    perm!("paces.update", Paces, School),
    perm!("paces.grade", Paces, School),
    perm!("paces.readOwn", Paces, Own),
    perm!("monthlyAssignments.create", MonthlyAssignments, School),
    perm!("monthlyAssignments.read", MonthlyAssignments, School),
    perm!("monthlyAssignments.update", MonthlyAssignments, School),
    perm!("monthlyAssignments.grade", MonthlyAssignments, School),
    perm!("monthlyAssignments.readOwn", MonthlyAssignments, Own),
    perm!("reportCards.read", ReportCards, School),
    perm!("reportCards.generate", ReportCards, School),
    perm!("reportCards.readOwn", ReportCards, Own),
    // Billing
    perm!("billing.read", Billing, School),
    perm!("billing.manage", Billing, School),
    perm!("billing.readOwn", Billing, Own),
];

const SCHOOL_ADMIN_PERMISSIONS: &[&str] = &[
    "configuration.read",
    "students.create",
    "students.read",
    "students.update",
    "students.delete",
    "teachers.create",
    "teachers.read",
    "teachers.update",
    "teachers.delete",
    "school_admin.read",
    "school_admin.manage",
    "groups.create",
    "groups.read",
    "groups.update",
    "groups.delete",
    "projections.create",
    "projections.read",
    "projections.update",
    "projections.delete",
    "paces.create",
    "paces.read",
    "paces.update",
    "paces.grade",
    "monthlyAssignments.create",
    "monthlyAssignments.read",
    "monthlyAssignments.update",
    "monthlyAssignments.grade",
    "reportCards.read",
    "reportCards.generate",
    "billing.read",
    "billing.manage",
];

const TEACHER_PERMISSIONS: &[&str] = &[
    "configuration.read",
    "students.read",
    "teachers.read",
    "groups.read",
    "projections.create",
    "projections.read",
    "projections.update",
    "paces.read",
    "paces.update",
    "paces.grade",
    "monthlyAssignments.create",
    "monthlyAssignments.read",
    "monthlyAssignments.update",
    "monthlyAssignments.grade",
    "reportCards.read",
    "reportCards.generate",
];

const PARENT_PERMISSIONS: &[&str] = &[
    "students.readOwn",
    "projections.readOwn",
    "paces.readOwn",
    "monthlyAssignments.readOwn",
    "reportCards.readOwn",
    "billing.readOwn",
];

const STUDENT_PERMISSIONS: &[&str] = &[
    "students.readOwn",
    "projections.readOwn",
    "paces.readOwn",
    "monthlyAssignments.readOwn",
    "reportCards.readOwn",
];

// ═══════════════════════════════════════════════════════════════════════════════
// Catalog
// ═══════════════════════════════════════════════════════════════════════════════

/// Registry of permission definitions and role entitlements.
#[derive(Debug, Clone)]
pub struct PermissionCatalog {
    definitions: Vec<PermissionDefinition>,
    index: HashMap<&'static str, usize>,
    role_permissions: HashMap<SystemRole, Vec<&'static str>>,
    role_sets: HashMap<SystemRole, HashSet<&'static str>>,
}

impl PermissionCatalog {
    /// Assemble and validate a catalog.
    ///
    /// SUPERADMIN is always entitled to the full catalog; any list given for
    /// it is ignored.
    pub fn new(
        definitions: &[PermissionDefinition],
        role_permissions: &[(SystemRole, &[&'static str])],
    ) -> Result<Self> {
        let catalog = Self::from_parts(definitions, role_permissions);
        catalog.validate()?;
        Ok(catalog)
    }

    /// The shipped catalog, built once per process.
    pub fn standard() -> &'static PermissionCatalog {
        STANDARD.get_or_init(|| {
            Self::from_parts(
                STANDARD_PERMISSIONS,
                &[
                    (SystemRole::SchoolAdmin, SCHOOL_ADMIN_PERMISSIONS),
                    (SystemRole::Teacher, TEACHER_PERMISSIONS),
                    (SystemRole::Parent, PARENT_PERMISSIONS),
                    (SystemRole::Student, STUDENT_PERMISSIONS),
                ],
            )
        })
    }

    fn from_parts(
        definitions: &[PermissionDefinition],
        role_permissions: &[(SystemRole, &[&'static str])],
    ) -> Self {
        let mut index = HashMap::with_capacity(definitions.len());
        for (position, definition) in definitions.iter().enumerate() {
            index.entry(definition.key).or_insert(position);
        }

        let mut lists: HashMap<SystemRole, Vec<&'static str>> = SystemRole::all()
            .into_iter()
            .map(|role| (role, Vec::new()))
            .collect();
        for (role, keys) in role_permissions {
            if *role != SystemRole::Superadmin {
                lists.insert(*role, keys.to_vec());
            }
        }
        lists.insert(
            SystemRole::Superadmin,
            definitions.iter().map(|d| d.key).collect(),
        );

        let role_sets = lists
            .iter()
            .map(|(role, keys)| (*role, keys.iter().copied().collect()))
            .collect();

        Self {
            definitions: definitions.to_vec(),
            index,
            role_permissions: lists,
            role_sets,
        }
    }

    /// Check keys are unique, well formed, and every role entry names a
    /// catalog permission.
    pub fn validate(&self) -> Result<()> {
        if self.index.len() != self.definitions.len() {
            let mut seen = HashSet::new();
            let duplicate = self
                .definitions
                .iter()
                .find(|d| !seen.insert(d.key))
                .map(|d| d.key)
                .unwrap_or_default();
            return Err(SchoolgateError::InvalidCatalog(format!(
                "duplicate permission key {duplicate}"
            )));
        }

        for definition in &self.definitions {
            match definition.key.split_once('.') {
                Some((module, action)) if module == definition.module.as_str() && !action.is_empty() => {}
                _ => {
                    return Err(SchoolgateError::InvalidCatalog(format!(
                        "permission key {} does not match module {}",
                        definition.key, definition.module
                    )))
                }
            }
        }

        for (role, keys) in &self.role_permissions {
            if let Some(unknown) = keys.iter().find(|k| !self.index.contains_key(*k)) {
                return Err(SchoolgateError::InvalidCatalog(format!(
                    "role {role} lists unknown permission {unknown}"
                )));
            }
        }

        Ok(())
    }

    /// Resolve a permission key.
    pub fn lookup(&self, key: &str) -> Option<&PermissionDefinition> {
        self.index.get(key).map(|&i| &self.definitions[i])
    }

    /// The static permission list of a role, in declaration order.
    pub fn permissions_for_role(&self, role: SystemRole) -> &[&'static str] {
        self.role_permissions
            .get(&role)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether a role's static list contains the key.
    pub fn role_has_permission(&self, role: SystemRole, key: &str) -> bool {
        self.role_sets
            .get(&role)
            .is_some_and(|set| set.contains(key))
    }

    /// All definitions, in declaration order.
    pub fn definitions(&self) -> &[PermissionDefinition] {
        &self.definitions
    }

    /// Definitions belonging to one module.
    pub fn definitions_for_module(
        &self,
        module: ModuleKey,
    ) -> impl Iterator<Item = &PermissionDefinition> {
        self.definitions.iter().filter(move |d| d.module == module)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
