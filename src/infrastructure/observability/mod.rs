//! Observability for the optimization engine.
//!
//! Metrics are kept in a private Prometheus registry and rendered in text format
//! on demand; nothing here listens for incoming requests.

pub mod metrics;

pub use metrics::OptimizerMetrics;
