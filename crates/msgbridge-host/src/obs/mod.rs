//! Lightweight in-process metrics.
//!
//! Dispatch outcomes and latencies are kept as atomics and rendered in the
//! Prometheus text format on demand; exporting them is left to the embedder.

pub mod metrics;

pub use metrics::ProtocolMetrics;
