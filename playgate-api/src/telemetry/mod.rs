//! playgate Telemetry - Observability Infrastructure
//!
//! Structured logging through `tracing` and Prometheus metrics for the
//! service. Both work without any external collector.

pub mod metrics;
pub mod middleware;
pub mod tracer;

pub use metrics::{encode_metrics, metrics, PlaygateMetrics, METRICS};
pub use middleware::observability_middleware;
pub use tracer::{init_tracing, LogFormat, TelemetryConfig};
