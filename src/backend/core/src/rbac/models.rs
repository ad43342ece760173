//! RBAC data models: identifiers, permission scope, directory records, the
//! per-request user context and the bulk access profile.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use super::roles::SystemRole;

// ═══════════════════════════════════════════════════════════════════════════════
// Identifiers
// ═══════════════════════════════════════════════════════════════════════════════

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(
    /// Strongly-typed user identifier.
    UserId
);
string_id!(
    /// Strongly-typed role row identifier.
    RoleId
);
string_id!(
    /// Strongly-typed school (tenant) identifier.
    SchoolId
);
string_id!(
    /// Strongly-typed module row identifier.
    ModuleId
);
string_id!(
    /// Identifier of a student record, used for ownership checks.
    StudentId
);

// ═══════════════════════════════════════════════════════════════════════════════
// Scope
// ═══════════════════════════════════════════════════════════════════════════════

/// Which checks a permission requires beyond role entitlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Cross-tenant operation; gated by role only.
    Global,
    /// Requires the module to be active for the tenant and granted to the role.
    School,
    /// Like `School`, plus an ownership check when a resource owner is given.
    Own,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::School => "school",
            Self::Own => "own",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Directory records
// ═══════════════════════════════════════════════════════════════════════════════

/// A role row. Roles are tenant-independent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRecord {
    pub id: RoleId,
    pub name: String,
}

impl RoleRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: RoleId::new(id),
            name: name.into(),
        }
    }

    /// The system role this row represents, if its name is a known one.
    pub fn system_role(&self) -> Option<SystemRole> {
        SystemRole::from_name(&self.name)
    }
}

/// A module row. Metadata (name, description, order) may change at runtime;
/// the key is the stable link to the compiled catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRecord {
    pub id: ModuleId,
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub display_order: i32,
}

impl ModuleRecord {
    pub fn new(id: impl Into<String>, key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ModuleId::new(id),
            key: key.into(),
            name: name.into(),
            description: String::new(),
            display_order: 0,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_display_order(mut self, order: i32) -> Self {
        self.display_order = order;
        self
    }
}

/// Whether a module is turned on for a school.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchoolModuleActivation {
    pub school_id: SchoolId,
    pub module_id: ModuleId,
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
}

/// Existence record authorizing a role to use a module in a school.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleModuleGrant {
    pub role_id: RoleId,
    pub school_id: SchoolId,
    pub module_id: ModuleId,
    pub granted_at: DateTime<Utc>,
}

/// Optional narrowing for `Directory::list_modules`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleFilter {
    /// Only modules whose key is in this list.
    pub keys: Option<Vec<String>>,
}

impl ModuleFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: Some(keys.into_iter().map(Into::into).collect()),
        }
    }

    pub fn matches(&self, module: &ModuleRecord) -> bool {
        self.keys
            .as_ref()
            .map_or(true, |keys| keys.iter().any(|k| k == &module.key))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// User context
// ═══════════════════════════════════════════════════════════════════════════════

/// Everything a decision needs to know about the caller. Rebuilt from the
/// directory on every call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserContext {
    pub user_id: UserId,
    /// The user's tenant. Platform operators may have none.
    pub school_id: Option<SchoolId>,
    pub roles: Vec<RoleRecord>,
    /// Students a parent is linked to.
    pub linked_student_ids: HashSet<StudentId>,
    /// The student record of a student user.
    pub own_student_id: Option<StudentId>,
}

impl UserContext {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            ..Default::default()
        }
    }

    pub fn with_school(mut self, school_id: SchoolId) -> Self {
        self.school_id = Some(school_id);
        self
    }

    pub fn with_role(mut self, role: RoleRecord) -> Self {
        self.roles.push(role);
        self
    }

    pub fn with_linked_student(mut self, student_id: StudentId) -> Self {
        self.linked_student_ids.insert(student_id);
        self
    }

    pub fn with_own_student(mut self, student_id: StudentId) -> Self {
        self.own_student_id = Some(student_id);
        self
    }

    pub fn is_superadmin(&self) -> bool {
        self.roles
            .iter()
            .any(|r| r.system_role() == Some(SystemRole::Superadmin))
    }

    pub fn role_ids(&self) -> Vec<RoleId> {
        self.roles.iter().map(|r| r.id.clone()).collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Access profile
// ═══════════════════════════════════════════════════════════════════════════════

/// Display metadata of a module that appears in a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleSummary {
    pub id: ModuleId,
    pub key: String,
    pub name: String,
    pub description: String,
    pub display_order: i32,
}

impl From<&ModuleRecord> for ModuleSummary {
    fn from(record: &ModuleRecord) -> Self {
        Self {
            id: record.id.clone(),
            key: record.key.clone(),
            name: record.name.clone(),
            description: record.description.clone(),
            display_order: record.display_order,
        }
    }
}

/// "Everything this user can do", computed once per query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessProfile {
    /// Granted permission keys, sorted.
    pub permissions: Vec<String>,
    /// Module key to sorted, deduplicated action names.
    pub module_actions: BTreeMap<String, Vec<String>>,
    /// Modules with at least one action, sorted by display order.
    pub modules: Vec<ModuleSummary>,
}

impl AccessProfile {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }

    pub fn has_permission(&self, key: &str) -> bool {
        self.permissions.binary_search_by(|p| p.as_str().cmp(key)).is_ok()
    }

    pub fn actions_for(&self, module_key: &str) -> &[String] {
        self.module_actions
            .get(module_key)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
