//! Role-based access control for a multi-tenant school platform.
//!
//! This module provides:
//! - **Catalog**: compiled permission definitions and role entitlement lists
//! - **Graph**: module dependency graph, validated acyclic
//! - **Policy Engine**: scope-aware `check` / `enforce` decisions
//! - **Profiles**: bulk "what can this user do" resolution
//! - **Lifecycle**: per-school module enable/disable with dependency ordering
//!
//! # Usage
//!
//! ```rust,ignore
//! use schoolgate_core::rbac::{AccessControlEngine, ModuleCache, PermissionCatalog};
//!
//! let engine = AccessControlEngine::new(directory, catalog, cache);
//! if engine.check(&user_id, "students.read", None).await? {
//!     // ...
//! }
//! ```

pub mod cache;
pub mod catalog;
pub mod graph;
pub mod lifecycle;
pub mod models;
pub mod policy;
pub mod profile;
pub mod roles;

pub use cache::{CacheStats, ModuleCache};
pub use catalog::{ModuleKey, PermissionCatalog, PermissionDefinition};
pub use graph::ModuleDependencyGraph;
pub use lifecycle::{LifecycleOperation, ModuleLifecycleManager};
pub use models::{
    AccessProfile, ModuleFilter, ModuleId, ModuleRecord, ModuleSummary, RoleId, RoleModuleGrant,
    RoleRecord, SchoolId, SchoolModuleActivation, Scope, StudentId, UserContext, UserId,
};
pub use policy::{AccessControlEngine, AllowReason, DenyReason, PolicyDecision};
pub use profile::AccessProfileBuilder;
pub use roles::SystemRole;
