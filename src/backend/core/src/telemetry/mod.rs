//! Telemetry: structured logging and decision metrics.

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use metrics::{
    describe_metrics, AccessMetrics, CacheMetrics, LifecycleMetrics,
};
