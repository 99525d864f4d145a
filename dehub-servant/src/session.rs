use std::sync::Arc;

use dehub_core::{MuxStream, Mode, Session};
use dehub_ssh::{PrivateKey, TrustedKeys};
use tokio_util::compat::FuturesAsyncReadCompatExt;

use crate::Dispatcher;

/// One accepted outer-mux stream is a fresh master session (spec §4.5.2):
/// layer a second, inner multiplexer on it, take the inner mux's one stream
/// as the SSH transport, and run the SSH server handshake.
///
/// The inner mux exists so that sub-channels opened later (SOCKS5 fan-in,
/// NFS connections) can themselves layer further muxes without contending
/// with the outer mux's own stream bookkeeping.
pub async fn serve_master(
    outer_stream: MuxStream,
    host_key: PrivateKey,
    trusted: TrustedKeys,
    dispatcher: Arc<Dispatcher>,
) -> anyhow::Result<()> {
    let inner = Session::new(outer_stream, Mode::Server);

    let Some(transport) = inner.accept().await else {
        anyhow::bail!("inner mux closed before the SSH transport stream arrived");
    };

    dehub_ssh::serve(transport.compat(), host_key, trusted, dispatcher).await?;
    Ok(())
}
