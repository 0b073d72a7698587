use tracing::Instrument;

use crate::hub::ChannelHub;

use super::Transport;

/// Pump `transport` into `hub` until the transport closes.
///
/// A bad packet never ends the loop; the hub has already logged and counted it.
pub async fn run_endpoint<T: Transport>(hub: ChannelHub, mut transport: T) {
    let span = tracing::info_span!("endpoint", side = %hub.side());
    async move {
        tracing::info!("endpoint started");
        let mut handled = 0u64;
        let mut dropped = 0u64;
        while let Some(packet) = transport.recv().await {
            match hub.handle_inbound(packet) {
                Ok(()) => handled += 1,
                Err(_) => dropped += 1,
            }
        }
        tracing::info!(handled, dropped, "transport closed");
    }
    .instrument(span)
    .await
}
