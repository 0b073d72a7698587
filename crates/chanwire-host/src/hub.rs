//! Shared host state: one `ChannelContext` per configured channel.
//!
//! The hub is the transport-boundary entry point: it enforces per-channel
//! size limits before decode, resolves the recipient for this endpoint's
//! side, and routes decoded messages to their handler either immediately
//! (asynchronous types) or through the main-thread queue.

use std::collections::HashMap;
use std::sync::Arc;

use chanwire_core::error::{ChanwireError, Result};
use chanwire_core::{ChannelContext, OutboundPacket, PacketSink, Recipient, Side};

use crate::config::HostConfig;
use crate::dispatch::{main_thread_queue, MainThread, MainThreadHandle};
use crate::obs::HostMetrics;
use crate::transport::InboundPacket;

/// Metric label for packets naming a channel this hub does not serve.
pub const UNKNOWN_CHANNEL_LABEL: &str = "<unknown>";

#[derive(Clone)]
pub struct ChannelHub {
    inner: Arc<HubInner>,
    metrics: Arc<HostMetrics>,
    main: MainThreadHandle,
}

struct HubInner {
    cfg: HostConfig,
    side: Side,
    channels: HashMap<String, HubChannel>,
}

struct HubChannel {
    ctx: Arc<ChannelContext>,
    max_packet_bytes: usize,
}

impl ChannelHub {
    /// Build the hub and the main-thread queue it feeds.
    /// Returns Result so main can handle errors gracefully (no panic).
    pub fn new(cfg: HostConfig) -> Result<(Self, MainThread)> {
        let mut channels = HashMap::new();
        for ch in &cfg.channels {
            let ctx = ChannelContext::for_channel(&ch.name)?;
            channels.insert(
                ch.name.clone(),
                HubChannel {
                    ctx,
                    max_packet_bytes: ch.limits.max_packet_bytes,
                },
            );
        }

        let metrics = Arc::new(HostMetrics::default());
        let (main, main_thread) =
            main_thread_queue(cfg.endpoint.queue_capacity, Arc::clone(&metrics));
        let side = Side::from(cfg.endpoint.side);
        tracing::info!(side = %side, channels = channels.len(), "channel hub ready");

        let hub = Self {
            inner: Arc::new(HubInner {
                cfg,
                side,
                channels,
            }),
            metrics,
            main,
        };
        Ok((hub, main_thread))
    }

    pub fn cfg(&self) -> &HostConfig {
        &self.inner.cfg
    }

    /// Side this endpoint receives on.
    pub fn side(&self) -> Side {
        self.inner.side
    }

    pub fn channel(&self, name: &str) -> Option<Arc<ChannelContext>> {
        self.inner.channels.get(name).map(|c| Arc::clone(&c.ctx))
    }

    pub fn channels(&self) -> Vec<Arc<ChannelContext>> {
        self.inner
            .channels
            .values()
            .map(|c| Arc::clone(&c.ctx))
            .collect()
    }

    pub fn metrics(&self) -> Arc<HostMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Attach `sink` to every channel, counting what goes out.
    pub fn attach_sink(&self, sink: Arc<dyn PacketSink>) {
        for ch in self.inner.channels.values() {
            ch.ctx.attach_sink(Arc::new(CountingSink {
                inner: Arc::clone(&sink),
                metrics: Arc::clone(&self.metrics),
            }));
        }
    }

    /// Decode and route one inbound packet.
    ///
    /// Errors are scoped to this packet: they are logged and counted here and
    /// returned for the caller's information only. Counters are labelled with
    /// configured channel names only; anything else shares one series.
    pub fn handle_inbound(&self, packet: InboundPacket) -> Result<()> {
        let channel = Arc::clone(&packet.channel);
        let res = self.route(packet);
        if let Err(e) = &res {
            tracing::debug!(channel = %channel, error = %e, "inbound packet dropped");
            self.metrics.reject(self.channel_label(&channel), e.code().as_str());
        }
        res
    }

    fn channel_label(&self, name: &str) -> &str {
        self.inner
            .channels
            .get_key_value(name)
            .map(|(k, _)| k.as_str())
            .unwrap_or(UNKNOWN_CHANNEL_LABEL)
    }

    fn route(&self, packet: InboundPacket) -> Result<()> {
        let name: &str = &packet.channel;
        let ch = self.inner.channels.get(name).ok_or_else(|| {
            ChanwireError::InvalidChannel(format!("no context for channel {name}"))
        })?;

        let len = packet.payload.len();
        if len > ch.max_packet_bytes {
            tracing::warn!(channel = name, len, max = ch.max_packet_bytes, "oversize packet");
            return Err(ChanwireError::Malformed(format!(
                "packet of {len} bytes exceeds {}",
                ch.max_packet_bytes
            )));
        }
        self.metrics.packets_in.inc(&[("channel", name)]);

        let recipient = match self.inner.side {
            Side::Client => Recipient::Client,
            Side::Server => Recipient::Server(packet.from.clone().ok_or_else(|| {
                ChanwireError::Malformed("server-side packet without sender".into())
            })?),
        };

        let msg = ch.ctx.decode(recipient.side(), packet.payload.clone())?;
        let asynchronous = ch
            .ctx
            .describe(&*msg)
            .map(|d| d.asynchronous)
            .unwrap_or(false);

        if asynchronous {
            ch.ctx.dispatch(msg, &recipient)?;
            self.metrics
                .dispatched
                .inc(&[("channel", name), ("mode", "async")]);
            Ok(())
        } else {
            self.main.schedule(Arc::clone(&ch.ctx), msg, recipient)
        }
    }
}

struct CountingSink {
    inner: Arc<dyn PacketSink>,
    metrics: Arc<HostMetrics>,
}

impl PacketSink for CountingSink {
    fn send(&self, packet: OutboundPacket) -> Result<()> {
        let channel = Arc::clone(&packet.channel);
        self.inner.send(packet)?;
        self.metrics.packets_out.inc(&[("channel", &*channel)]);
        Ok(())
    }
}
