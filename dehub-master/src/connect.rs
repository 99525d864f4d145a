use std::sync::Arc;

use dehub_common::{ClientRole, HubHeader, ServantId};
use dehub_core::{Mode, Session};
use dehub_ssh::{HostKeyPredicate, PrivateKey, SshSession};
use dehub_wire::read_msg;
use tokio::net::TcpStream;
use tokio_util::compat::{FuturesAsyncReadCompatExt, TokioAsyncReadCompatExt};
use tracing::info;

/// A connected master: the outer mux (kept alive for the lifetime of the
/// connection, spec §4.6.6's "outer mux failures are fatal to all
/// sub-channels") and the SSH client session every sub-channel opens on.
pub struct Master {
    outer: Session,
    pub ssh: SshSession,
}

impl Master {
    /// True once the outer multiplexer has shut down; a caller should stop
    /// issuing new sub-channel operations and reconnect (spec §4.6.6).
    pub fn is_closed(&self) -> bool {
        self.outer.is_closed()
    }

    pub async fn closed(&self) {
        self.outer.closed().await
    }
}

/// Dials the hub, registers as a master for `id`, and runs the SSH client
/// handshake (spec §4.6.1). A non-empty rendezvous ack is a fatal,
/// non-retriable error for this attempt (the caller decides whether/when to
/// retry).
pub async fn connect(
    hub_addr: &str,
    id: ServantId,
    private_key: Arc<PrivateKey>,
    verify_host_key: HostKeyPredicate,
) -> anyhow::Result<Master> {
    let mut stream = TcpStream::connect(hub_addr).await?;

    dehub_wire::write_msg(
        &mut stream,
        &HubHeader {
            role: ClientRole::Master,
            id,
        },
    )
    .await;

    let ack: String = read_msg(&mut stream).await?;
    if !ack.is_empty() {
        anyhow::bail!("hub rejected master connection: {ack}");
    }

    let outer = Session::new(stream.compat(), Mode::Client);
    let transport = outer
        .open()
        .await
        .map_err(|error| anyhow::anyhow!("failed to open master transport stream: {error}"))?;

    let ssh = dehub_ssh::connect(transport.compat(), private_key, verify_host_key).await?;
    info!("master connected to servant");

    Ok(Master { outer, ssh })
}
