//! System roles.
//!
//! Schoolgate ships with five built-in roles. Role rows live in the directory
//! and are matched to these by name:
//!
//! | Role          | Description                                              |
//! |---------------|----------------------------------------------------------|
//! | SUPERADMIN    | Platform operator; every permission in every school      |
//! | SCHOOL_ADMIN  | Manages one school: staff, students, curriculum, billing |
//! | TEACHER       | Runs classes: projections, PACEs, monthly assignments    |
//! | PARENT        | Reads records of linked students                         |
//! | STUDENT       | Reads their own records                                  |

use serde::{Deserialize, Serialize};
use std::fmt;

/// Built-in roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemRole {
    Superadmin,
    SchoolAdmin,
    Teacher,
    Parent,
    Student,
}

impl SystemRole {
    /// The role name as stored in the directory.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Superadmin => "SUPERADMIN",
            Self::SchoolAdmin => "SCHOOL_ADMIN",
            Self::Teacher => "TEACHER",
            Self::Parent => "PARENT",
            Self::Student => "STUDENT",
        }
    }

    /// Get the human-readable name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Superadmin => "Super Admin",
            Self::SchoolAdmin => "School Admin",
            Self::Teacher => "Teacher",
            Self::Parent => "Parent",
            Self::Student => "Student",
        }
    }

    /// Resolve a directory role name. Unknown names carry no entitlement.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::all().into_iter().find(|r| r.name() == name)
    }

    /// Return all system roles.
    pub fn all() -> [SystemRole; 5] {
        [
            Self::Superadmin,
            Self::SchoolAdmin,
            Self::Teacher,
            Self::Parent,
            Self::Student,
        ]
    }
}

impl fmt::Display for SystemRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
