//! Minimal counter registry for the host.
//!
//! Labels are flattened into sorted key vectors so the same label set always
//! maps to one series regardless of argument order.

use dashmap::DashMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

/// Helper to escape label values.
fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn label_key(labels: &[(&str, &str)]) -> Vec<(String, String)> {
    let mut key: Vec<(String, String)> = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    key.sort();
    key
}

#[derive(Default)]
pub struct CounterVec {
    map: DashMap<Vec<(String, String)>, AtomicU64>,
}

impl CounterVec {
    /// Increment by 1.
    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.add(labels, 1);
    }

    /// Increment by an arbitrary value.
    pub fn add(&self, labels: &[(&str, &str)], v: u64) {
        let counter = self
            .map
            .entry(label_key(labels))
            .or_insert_with(|| AtomicU64::new(0));
        counter.fetch_add(v, Ordering::Relaxed);
    }

    /// Current value of one series (0 if never touched).
    pub fn get(&self, labels: &[(&str, &str)]) -> u64 {
        self.map
            .get(&label_key(labels))
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Render in Prometheus text exposition format.
    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {} counter", name);
        let mut rows: Vec<(String, u64)> = self
            .map
            .iter()
            .map(|r| {
                let label_str = r
                    .key()
                    .iter()
                    .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
                    .collect::<Vec<_>>()
                    .join(",");
                (label_str, r.value().load(Ordering::Relaxed))
            })
            .collect();
        rows.sort();
        for (label_str, val) in rows {
            let _ = writeln!(out, "{}{{{}}} {}", name, label_str, val);
        }
    }
}

#[derive(Default)]
pub struct HostMetrics {
    /// Inbound packets accepted for decode, by channel.
    pub packets_in: CounterVec,
    /// Packets handed to the transport, by channel.
    pub packets_out: CounterVec,
    /// Dropped packets, by channel and error code.
    pub packets_rejected: CounterVec,
    /// Handler invocations, by channel and mode (`async` / `main`).
    pub dispatched: CounterVec,
}

impl HostMetrics {
    pub fn reject(&self, channel: &str, reason: &str) {
        self.packets_rejected
            .inc(&[("channel", channel), ("reason", reason)]);
    }

    /// Render all registered metrics.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.packets_in.render("chanwire_packets_in_total", &mut out);
        self.packets_out.render("chanwire_packets_out_total", &mut out);
        self.packets_rejected
            .render("chanwire_packets_rejected_total", &mut out);
        self.dispatched.render("chanwire_dispatched_total", &mut out);
        out
    }
}
