//! Counters for access decisions, profile builds, lifecycle calls, cache
//! lookups and errors.
//!
//! Recording goes through the `metrics` facade; with no recorder installed
//! every call is a no-op, so embedding applications choose the exporter.

use metrics::{counter, describe_counter};
use std::sync::Once;

pub const ACCESS_CHECKS_TOTAL: &str = "schoolgate_access_checks_total";
pub const PROFILES_BUILT_TOTAL: &str = "schoolgate_profiles_built_total";
pub const MODULE_LIFECYCLE_TOTAL: &str = "schoolgate_module_lifecycle_total";
pub const MODULE_CACHE_LOOKUPS_TOTAL: &str = "schoolgate_module_cache_lookups_total";
pub const ERRORS_TOTAL: &str = "schoolgate_errors_total";

static DESCRIBED: Once = Once::new();

/// Register metric descriptions with the installed recorder. Idempotent.
pub fn describe_metrics() {
    DESCRIBED.call_once(|| {
        describe_counter!(ACCESS_CHECKS_TOTAL, "Permission checks by scope and outcome");
        describe_counter!(PROFILES_BUILT_TOTAL, "Access profiles built");
        describe_counter!(
            MODULE_LIFECYCLE_TOTAL,
            "Module enable/disable calls by operation and outcome"
        );
        describe_counter!(MODULE_CACHE_LOOKUPS_TOTAL, "Module cache lookups by result");
        describe_counter!(ERRORS_TOTAL, "Errors by code");
    });
}

/// Access decision counters.
pub struct AccessMetrics;

impl AccessMetrics {
    /// `scope` is `"unknown"` when the key is not in the catalog.
    pub fn record_check(scope: &'static str, allowed: bool) {
        counter!(
            ACCESS_CHECKS_TOTAL,
            "scope" => scope,
            "outcome" => if allowed { "allow" } else { "deny" },
        )
        .increment(1);
    }

    pub fn record_profile() {
        counter!(PROFILES_BUILT_TOTAL).increment(1);
    }
}

/// Lifecycle counters.
pub struct LifecycleMetrics;

impl LifecycleMetrics {
    pub fn record(operation: &'static str, outcome: &'static str) {
        counter!(
            MODULE_LIFECYCLE_TOTAL,
            "operation" => operation,
            "outcome" => outcome,
        )
        .increment(1);
    }
}

/// Cache lookup counters.
pub struct CacheMetrics;

impl CacheMetrics {
    pub fn record_hit() {
        counter!(MODULE_CACHE_LOOKUPS_TOTAL, "result" => "hit").increment(1);
    }

    pub fn record_miss() {
        counter!(MODULE_CACHE_LOOKUPS_TOTAL, "result" => "miss").increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        describe_metrics();
        describe_metrics();
        AccessMetrics::record_check("school", true);
        AccessMetrics::record_profile();
        LifecycleMetrics::record("enable", "ok");
        CacheMetrics::record_hit();
        CacheMetrics::record_miss();
    }
}
