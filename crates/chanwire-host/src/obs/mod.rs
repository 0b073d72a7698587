//! Lightweight in-process metrics (dependency-free).
//!
//! Counters are stored as atomics keyed by sorted label sets and rendered in
//! Prometheus text exposition format on demand.

pub mod metrics;

pub use metrics::{CounterVec, HostMetrics};
