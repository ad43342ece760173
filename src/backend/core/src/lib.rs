#![allow(clippy::result_large_err)]
//! # Schoolgate Core
//!
//! Multi-tenant access decisions for a school platform.
//!
//! ## Architecture
//!
//! - **Catalog**: permission definitions with Global / School / Own scope and
//!   static role entitlement lists
//! - **Dependency Graph**: which modules must be active before another can be
//!   enabled
//! - **Directory**: async data-access contract, plus an in-memory
//!   implementation with JSON/TOML snapshots
//! - **Access Control Engine**: `check` / `enforce` decisions reconciling role
//!   entitlement, tenant activation, grants and record ownership
//! - **Profiles**: bulk "what can this user do" in a fixed number of
//!   directory calls
//! - **Lifecycle**: per-school module enable/disable with dependency ordering
//! - **Telemetry**: structured logging and decision metrics

pub mod config;
pub mod directory;
pub mod error;
pub mod gatekeeper;
pub mod rbac;
pub mod telemetry;

pub use error::{ErrorCode, ErrorSeverity, Result, SchoolgateError};
pub use gatekeeper::Gatekeeper;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{CacheConfig, Config, LifecycleConfig};
    pub use crate::directory::{
        Directory, DirectoryError, DirectoryResult, DirectorySnapshot, InMemoryDirectory,
        UserRecord,
    };
    pub use crate::error::{ErrorCode, ErrorSeverity, Result, SchoolgateError};
    pub use crate::gatekeeper::Gatekeeper;
    pub use crate::rbac::{
        AccessControlEngine, AccessProfile, AccessProfileBuilder, AllowReason, DenyReason,
        ModuleCache, ModuleDependencyGraph, ModuleFilter, ModuleId, ModuleKey,
        ModuleLifecycleManager, ModuleRecord, ModuleSummary, PermissionCatalog,
        PermissionDefinition, PolicyDecision, RoleId, RoleRecord, SchoolId, Scope, StudentId,
        SystemRole, UserContext, UserId,
    };
    pub use crate::telemetry::{init_logging, LogFormat, LoggingConfig};
}
