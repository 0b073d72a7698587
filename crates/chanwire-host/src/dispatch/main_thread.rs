//! Main-thread queue for synchronous message types.
//!
//! The hub schedules decoded jobs without waiting; the host drains them on
//! whichever task it treats as its main thread.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use chanwire_core::error::{ChanwireError, Result};
use chanwire_core::{ChannelContext, Message, Recipient};

use crate::obs::HostMetrics;

/// A decoded message waiting for its handler.
struct Job {
    ctx: Arc<ChannelContext>,
    msg: Box<dyn Message>,
    recipient: Recipient,
}

/// Producer side, held by the hub.
#[derive(Clone)]
pub struct MainThreadHandle {
    tx: mpsc::Sender<Job>,
}

impl MainThreadHandle {
    pub fn schedule(
        &self,
        ctx: Arc<ChannelContext>,
        msg: Box<dyn Message>,
        recipient: Recipient,
    ) -> Result<()> {
        self.tx
            .try_send(Job {
                ctx,
                msg,
                recipient,
            })
            .map_err(|e| match e {
                TrySendError::Full(_) => ChanwireError::Internal("main thread queue full".into()),
                TrySendError::Closed(_) => {
                    ChanwireError::Internal("main thread queue closed".into())
                }
            })
    }
}

/// Consumer side, owned by whoever runs the host's main loop.
pub struct MainThread {
    rx: mpsc::Receiver<Job>,
    metrics: Arc<HostMetrics>,
}

pub fn main_thread_queue(capacity: usize, metrics: Arc<HostMetrics>) -> (MainThreadHandle, MainThread) {
    let (tx, rx) = mpsc::channel(capacity);
    (MainThreadHandle { tx }, MainThread { rx, metrics })
}

impl MainThread {
    fn run_job(&self, job: Job) {
        let Job {
            ctx,
            msg,
            recipient,
        } = job;
        let channel = ctx.name();
        match ctx.dispatch(msg, &recipient) {
            Ok(()) => self
                .metrics
                .dispatched
                .inc(&[("channel", channel), ("mode", "main")]),
            Err(e) => {
                tracing::warn!(channel = %channel, error = %e, "main thread handler failed");
                self.metrics.reject(channel, e.code().as_str());
            }
        }
    }

    /// Run every job queued so far. Returns how many ran.
    pub fn run_pending(&mut self) -> usize {
        let mut n = 0;
        while let Ok(job) = self.rx.try_recv() {
            self.run_job(job);
            n += 1;
        }
        n
    }

    /// Wait for one job and run it. `false` once every handle is dropped.
    pub async fn run_next(&mut self) -> bool {
        match self.rx.recv().await {
            Some(job) => {
                self.run_job(job);
                true
            }
            None => false,
        }
    }

    /// Run jobs until every handle is dropped.
    pub async fn run(mut self) {
        while self.run_next().await {}
    }
}
