//! chanwire host library entry.
//!
//! This crate plugs the core protocol into a runtime: strict YAML config,
//! a per-channel hub, the main-thread queue for synchronous message types,
//! transports, and counters. It is intended to be consumed by the binary
//! (`main.rs`) and by integration tests.

pub mod config;
pub mod demo;
pub mod dispatch;
pub mod hub;
pub mod obs;
pub mod transport;
