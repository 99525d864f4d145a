use std::sync::Arc;

use dehub_core::{Mode, Session};
use dehub_ssh::ChannelStream;
use fast_socks5::server::{Config, Socks5Socket};
use tokio_util::compat::{FuturesAsyncReadCompatExt, TokioAsyncReadCompatExt};
use tracing::warn;

/// One `forward-socks5` channel carries many concurrent SOCKS5 sessions
/// (spec §4.5.4): layer an inner mux on the channel bytes and hand every
/// accepted stream to its own SOCKS5 handshake + relay.
pub async fn handle(channel: ChannelStream) {
    let inner = Session::new(channel.compat(), Mode::Server);
    let config = Arc::new(Config::default());

    loop {
        let Some(stream) = inner.accept().await else {
            return;
        };

        let config = config.clone();
        tokio::spawn(async move {
            let socket = Socks5Socket::new(stream.compat(), config);
            if let Err(error) = socket.upgrade_to_socks5().await {
                warn!(%error, "socks5 session failed");
            }
        });
    }
}
