//! The directory contract: read/write access to users, roles, modules,
//! activations and grants.
//!
//! The access layer never talks to storage directly. Everything it needs goes
//! through [`Directory`], whose implementations own persistence, atomic upserts
//! on `(school, module)` and any retry policy. "Not found" is `Ok(None)`;
//! `Err` is reserved for the backend itself failing.

pub mod memory;
pub mod snapshot;

pub use memory::InMemoryDirectory;
pub use snapshot::{DirectorySnapshot, UserRecord};

use async_trait::async_trait;
use thiserror::Error;

use crate::rbac::models::{
    ModuleFilter, ModuleId, ModuleRecord, RoleId, RoleModuleGrant, RoleRecord, SchoolId,
    SchoolModuleActivation, UserContext, UserId,
};

/// A specialized Result type for directory calls.
pub type DirectoryResult<T> = std::result::Result<T, DirectoryError>;

/// Failures of the directory backend. Propagated unmodified by the access
/// layer.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Directory unavailable: {0}")]
    Unavailable(String),

    #[error("Directory backend error: {message}")]
    Backend {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },

    #[error("Directory snapshot error: {0}")]
    Snapshot(String),
}

impl DirectoryError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

impl From<std::io::Error> for DirectoryError {
    fn from(error: std::io::Error) -> Self {
        Self::Snapshot(error.to_string())
    }
}

impl From<serde_json::Error> for DirectoryError {
    fn from(error: serde_json::Error) -> Self {
        Self::Snapshot(error.to_string())
    }
}

impl From<toml::de::Error> for DirectoryError {
    fn from(error: toml::de::Error) -> Self {
        Self::Snapshot(error.to_string())
    }
}

impl From<toml::ser::Error> for DirectoryError {
    fn from(error: toml::ser::Error) -> Self {
        Self::Snapshot(error.to_string())
    }
}

/// Data-access contract consumed by the access layer.
#[async_trait]
pub trait Directory: Send + Sync {
    /// The user's tenant, role rows and student links.
    async fn get_user_context(&self, user_id: &UserId) -> DirectoryResult<Option<UserContext>>;

    async fn get_module_by_key(&self, key: &str) -> DirectoryResult<Option<ModuleRecord>>;

    async fn get_module_by_id(&self, id: &ModuleId) -> DirectoryResult<Option<ModuleRecord>>;

    async fn list_modules(&self, filter: &ModuleFilter) -> DirectoryResult<Vec<ModuleRecord>>;

    async fn get_school_module_activation(
        &self,
        school_id: &SchoolId,
        module_id: &ModuleId,
    ) -> DirectoryResult<Option<SchoolModuleActivation>>;

    /// Activation rows of `school_id` for the given modules. Modules without a
    /// row are simply absent from the result.
    async fn list_school_module_activations(
        &self,
        school_id: &SchoolId,
        module_ids: &[ModuleId],
    ) -> DirectoryResult<Vec<SchoolModuleActivation>>;

    /// Grant rows in `school_id` for any of `module_ids` held by any of
    /// `role_ids`.
    async fn list_role_module_grants(
        &self,
        school_id: &SchoolId,
        module_ids: &[ModuleId],
        role_ids: &[RoleId],
    ) -> DirectoryResult<Vec<RoleModuleGrant>>;

    /// Insert or update the activation row atomically.
    async fn upsert_school_module_activation(
        &self,
        school_id: &SchoolId,
        module_id: &ModuleId,
        is_active: bool,
    ) -> DirectoryResult<()>;

    /// Insert the grant row if it does not exist.
    async fn upsert_role_module_grant(
        &self,
        role_id: &RoleId,
        school_id: &SchoolId,
        module_id: &ModuleId,
    ) -> DirectoryResult<()>;

    /// Roles are tenant-independent rows looked up by name.
    async fn find_system_role_by_name(&self, name: &str) -> DirectoryResult<Option<RoleRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorCode, SchoolgateError};
    use std::error::Error as _;

    #[test]
    fn test_backend_error_without_source() {
        let err = DirectoryError::backend("replica lag");
        assert_eq!(err.to_string(), "Directory backend error: replica lag");
        assert!(err.source().is_none());
    }

    #[test]
    fn test_backend_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "socket closed");
        let err = DirectoryError::with_source("grant query failed", io);
        assert_eq!(err.source().map(|s| s.to_string()).as_deref(), Some("socket closed"));

        let err: SchoolgateError = err.into();
        assert_eq!(err.code(), ErrorCode::DirectoryError);
        assert!(!err.is_retryable());
    }
}
