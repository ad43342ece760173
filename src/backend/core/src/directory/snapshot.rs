//! Serializable directory snapshots.
//!
//! A snapshot is the full content of an [`InMemoryDirectory`](super::InMemoryDirectory)
//! as plain records. Files ending in `.toml` are read and written as TOML,
//! everything else as JSON.

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::DirectoryResult;
use crate::rbac::models::{
    ModuleRecord, RoleId, RoleModuleGrant, RoleRecord, SchoolId, SchoolModuleActivation,
    StudentId, UserId,
};

/// A user row as stored by the in-memory directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school_id: Option<SchoolId>,
    #[serde(default)]
    pub role_ids: Vec<RoleId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub linked_student_ids: Vec<StudentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_id: Option<StudentId>,
}

impl UserRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: UserId::new(id),
            school_id: None,
            role_ids: Vec::new(),
            linked_student_ids: Vec::new(),
            student_id: None,
        }
    }

    pub fn in_school(mut self, school_id: impl Into<String>) -> Self {
        self.school_id = Some(SchoolId::new(school_id));
        self
    }

    pub fn with_role(mut self, role_id: RoleId) -> Self {
        self.role_ids.push(role_id);
        self
    }

    pub fn with_linked_student(mut self, student_id: impl Into<String>) -> Self {
        self.linked_student_ids.push(StudentId::new(student_id));
        self
    }

    pub fn as_student(mut self, student_id: impl Into<String>) -> Self {
        self.student_id = Some(StudentId::new(student_id));
        self
    }
}

/// Full directory content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectorySnapshot {
    #[serde(default)]
    pub roles: Vec<RoleRecord>,
    #[serde(default)]
    pub modules: Vec<ModuleRecord>,
    #[serde(default)]
    pub users: Vec<UserRecord>,
    #[serde(default)]
    pub activations: Vec<SchoolModuleActivation>,
    #[serde(default)]
    pub grants: Vec<RoleModuleGrant>,
}

impl DirectorySnapshot {
    /// Load a snapshot file.
    pub fn load(path: impl AsRef<Path>) -> DirectoryResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        if is_toml(path) {
            Ok(toml::from_str(&content)?)
        } else {
            Ok(serde_json::from_str(&content)?)
        }
    }

    /// Write the snapshot, replacing the file.
    pub fn save(&self, path: impl AsRef<Path>) -> DirectoryResult<()> {
        let path = path.as_ref();
        let content = if is_toml(path) {
            toml::to_string_pretty(self)?
        } else {
            serde_json::to_string_pretty(self)?
        };
        std::fs::write(path, content)?;
        Ok(())
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::memory::{standard_module_id, standard_role_id};
    use crate::directory::InMemoryDirectory;
    use crate::rbac::catalog::ModuleKey;
    use crate::rbac::roles::SystemRole;

    fn seeded() -> DirectorySnapshot {
        let dir = InMemoryDirectory::with_standard_catalog();
        let school = SchoolId::new("school-1");
        let students = standard_module_id(ModuleKey::Students);
        dir.insert_user(
            UserRecord::new("teacher-1")
                .in_school("school-1")
                .with_role(standard_role_id(SystemRole::Teacher)),
        );
        dir.set_activation(&school, &students, true);
        dir.grant(&standard_role_id(SystemRole::Teacher), &school, &students);
        dir.to_snapshot()
    }

    #[test]
    fn test_json_file_round_trip() {
        let snapshot = seeded();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("directory.json");

        snapshot.save(&path).unwrap();
        assert_eq!(DirectorySnapshot::load(&path).unwrap(), snapshot);
    }

    #[test]
    fn test_toml_file_round_trip() {
        let snapshot = seeded();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("directory.toml");

        snapshot.save(&path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("[[modules]]"));
        assert_eq!(DirectorySnapshot::load(&path).unwrap(), snapshot);
    }

    #[test]
    fn test_missing_sections_default_to_empty() {
        let snapshot: DirectorySnapshot =
            serde_json::from_str(r#"{"users": [{"id": "u1"}]}"#).unwrap();
        assert_eq!(snapshot.users.len(), 1);
        assert!(snapshot.users[0].role_ids.is_empty());
        assert!(snapshot.modules.is_empty());
    }

    #[test]
    fn test_malformed_file_is_a_snapshot_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = DirectorySnapshot::load(&path).unwrap_err();
        assert!(matches!(err, crate::directory::DirectoryError::Snapshot(_)));
    }
}
