//! Dispatch module exports.
//!
//! Asynchronous message types are dispatched on the receiving task; every
//! other type is queued here and handled when the host drains the queue on
//! its main thread.

pub mod main_thread;

pub use main_thread::{main_thread_queue, MainThread, MainThreadHandle};
