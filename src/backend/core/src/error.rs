//! Error handling for Schoolgate Core.
//!
//! This module provides:
//! - A single error enum for every named failure the access layer surfaces
//! - Stable machine-readable error codes with categories
//! - Severity-aware logging with tracing integration
//! - Metrics integration for error tracking
//!
//! Decisions never fail for "unknown" inputs: an unknown permission, user or
//! module is a denial, not an error. Errors are reserved for `enforce`,
//! module lifecycle rule violations, startup validation and directory
//! failures.

use metrics::counter;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{error, warn};

use crate::directory::DirectoryError;

// ═══════════════════════════════════════════════════════════════════════════════
// Result Type Alias
// ═══════════════════════════════════════════════════════════════════════════════

/// A specialized Result type for Schoolgate operations.
pub type Result<T> = std::result::Result<T, SchoolgateError>;

// ═══════════════════════════════════════════════════════════════════════════════
// Error Codes
// ═══════════════════════════════════════════════════════════════════════════════

/// Machine-readable error codes.
///
/// These codes are stable and can be used by callers for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Authorization (1000-1099)
    PermissionDenied,

    // Module lifecycle (1100-1199)
    ModuleNotFound,
    DependencyNotFound,
    DependencyNotEnabled,
    DependentModuleEnabled,

    // Catalog (1200-1299)
    DependencyCycle,
    InvalidCatalog,

    // Directory (2000-2099)
    DirectoryUnavailable,
    DirectoryError,
    SnapshotError,

    // Configuration (5000-5099)
    ConfigurationError,
}

impl ErrorCode {
    /// Get the numeric code for this error.
    pub const fn numeric_code(&self) -> u32 {
        match self {
            Self::PermissionDenied => 1000,

            Self::ModuleNotFound => 1100,
            Self::DependencyNotFound => 1101,
            Self::DependencyNotEnabled => 1102,
            Self::DependentModuleEnabled => 1103,

            Self::DependencyCycle => 1200,
            Self::InvalidCatalog => 1201,

            Self::DirectoryUnavailable => 2000,
            Self::DirectoryError => 2001,
            Self::SnapshotError => 2002,

            Self::ConfigurationError => 5000,
        }
    }

    /// Check if this error is retryable.
    ///
    /// The access layer itself never retries; this is a hint for callers.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::DirectoryUnavailable)
    }

    /// Get the error category for grouping.
    pub const fn category(&self) -> &'static str {
        match self.numeric_code() {
            1000..=1099 => "authorization",
            1100..=1199 => "module_lifecycle",
            1200..=1299 => "catalog",
            2000..=2099 => "directory",
            5000..=5099 => "configuration",
            _ => "unknown",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Severity
// ═══════════════════════════════════════════════════════════════════════════════

/// Severity level for errors (affects logging).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    /// Caller errors (denials, business-rule violations)
    Low,
    /// Operational issues (transient directory outages)
    Medium,
    /// System errors (backend failures, bad snapshots)
    High,
    /// Startup-blocking errors (invalid catalog or configuration)
    Critical,
}

impl ErrorSeverity {
    /// Get severity based on error code.
    pub const fn from_code(code: &ErrorCode) -> Self {
        match code {
            ErrorCode::PermissionDenied
            | ErrorCode::ModuleNotFound
            | ErrorCode::DependencyNotFound
            | ErrorCode::DependencyNotEnabled
            | ErrorCode::DependentModuleEnabled => Self::Low,

            ErrorCode::DirectoryUnavailable => Self::Medium,

            ErrorCode::DirectoryError | ErrorCode::SnapshotError => Self::High,

            ErrorCode::DependencyCycle
            | ErrorCode::InvalidCatalog
            | ErrorCode::ConfigurationError => Self::Critical,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Main Error Type
// ═══════════════════════════════════════════════════════════════════════════════

/// The main error type for Schoolgate Core.
///
/// Lifecycle violations carry the key of the offending module so the caller
/// can resolve them (enable the dependency, or disable the dependent first).
#[derive(Debug, Error)]
pub enum SchoolgateError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    #[error("Dependency not found: {0}")]
    DependencyNotFound(String),

    #[error("Dependency not enabled: {0}")]
    DependencyNotEnabled(String),

    #[error("Dependent module enabled: {0}")]
    DependentModuleEnabled(String),

    #[error("Module dependency cycle involving: {0}")]
    DependencyCycle(String),

    #[error("Invalid permission catalog: {0}")]
    InvalidCatalog(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

impl SchoolgateError {
    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::PermissionDenied(_) => ErrorCode::PermissionDenied,
            Self::ModuleNotFound(_) => ErrorCode::ModuleNotFound,
            Self::DependencyNotFound(_) => ErrorCode::DependencyNotFound,
            Self::DependencyNotEnabled(_) => ErrorCode::DependencyNotEnabled,
            Self::DependentModuleEnabled(_) => ErrorCode::DependentModuleEnabled,
            Self::DependencyCycle(_) => ErrorCode::DependencyCycle,
            Self::InvalidCatalog(_) => ErrorCode::InvalidCatalog,
            Self::Configuration(_) => ErrorCode::ConfigurationError,
            Self::Directory(DirectoryError::Unavailable(_)) => ErrorCode::DirectoryUnavailable,
            Self::Directory(DirectoryError::Snapshot(_)) => ErrorCode::SnapshotError,
            Self::Directory(_) => ErrorCode::DirectoryError,
        }
    }

    /// The module or permission key this error names, if any.
    pub fn subject(&self) -> Option<&str> {
        match self {
            Self::PermissionDenied(key)
            | Self::ModuleNotFound(key)
            | Self::DependencyNotFound(key)
            | Self::DependencyNotEnabled(key)
            | Self::DependentModuleEnabled(key)
            | Self::DependencyCycle(key) => Some(key),
            _ => None,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        self.code().is_retryable()
    }

    /// Get the error severity.
    pub fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::from_code(&self.code())
    }

    /// Log this error with appropriate severity.
    pub fn log(&self) {
        let code = self.code();
        let category = code.category();

        match self.severity() {
            ErrorSeverity::Critical | ErrorSeverity::High => {
                error!(
                    error_code = %code,
                    category = category,
                    numeric_code = code.numeric_code(),
                    error = %self,
                    "Access layer error"
                );
            }
            ErrorSeverity::Medium => {
                warn!(
                    error_code = %code,
                    category = category,
                    error = %self,
                    "Transient access layer error"
                );
            }
            ErrorSeverity::Low => {
                tracing::debug!(
                    error_code = %code,
                    category = category,
                    subject = ?self.subject(),
                    "Request rejected"
                );
            }
        }
    }

    /// Record error metrics.
    pub fn record_metrics(&self) {
        let code = self.code();
        counter!(
            crate::telemetry::metrics::ERRORS_TOTAL,
            "code" => code.to_string(),
            "category" => code.category().to_string(),
            "severity" => format!("{:?}", self.severity()),
        )
        .increment(1);
    }
}

impl From<config::ConfigError> for SchoolgateError {
    fn from(error: config::ConfigError) -> Self {
        Self::Configuration(error.to_string())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
