//! The servant role (spec §4.5): registers with a hub, then serves one SSH
//! session per accepted master stream, dispatching sub-channels to exec,
//! SOCKS5 egress, or NFS share-dir handlers.

mod dispatch;
mod exec;
mod session;
mod sharedir;
mod socks5;

use std::sync::Arc;
use std::time::Duration;

use dehub_common::{ClientRole, HubHeader, ServantId};
use dehub_core::{Mode, Session};
use dehub_ssh::{PrivateKey, TrustedKeys};
use dehub_wire::read_msg;
use tokio::net::TcpStream;
use tokio_util::compat::TokioAsyncReadCompatExt;
use tracing::{error, info, warn};

pub use dispatch::Dispatcher;

/// Everything a servant process needs to register with a hub and serve
/// incoming masters.
pub struct ServantConfig {
    pub id: ServantId,
    pub hub_addr: String,
    pub host_key: PrivateKey,
    pub trusted: TrustedKeys,
    /// Backoff between registration attempts, spec §4.5.1's `RETRY` (default
    /// `5s`).
    pub retry: Duration,
}

/// Runs the servant forever: dial the hub, register, serve, and on any
/// disconnect wait `config.retry` and reconnect. Returns only if the hub
/// address cannot be resolved at all (a configuration error, not a
/// transient one).
pub async fn run(config: ServantConfig) -> anyhow::Result<()> {
    loop {
        if let Err(error) = register_and_serve(&config).await {
            warn!(%error, "servant session ended");
        }
        tokio::time::sleep(config.retry).await;
    }
}

async fn register_and_serve(config: &ServantConfig) -> anyhow::Result<()> {
    let mut stream = TcpStream::connect(&config.hub_addr).await?;

    dehub_wire::write_msg(
        &mut stream,
        &HubHeader {
            role: ClientRole::Servant,
            id: config.id.clone(),
        },
    )
    .await;

    let ack: String = read_msg(&mut stream).await?;
    if !ack.is_empty() {
        anyhow::bail!("hub rejected registration: {ack}");
    }

    info!(id = %config.id, hub = %config.hub_addr, "registered with hub");

    let outer = Session::new(stream.compat(), Mode::Server);
    let dispatcher = Arc::new(Dispatcher);

    loop {
        let Some(master_stream) = outer.accept().await else {
            info!("hub connection closed");
            return Ok(());
        };

        let host_key = config.host_key.clone();
        let trusted = config.trusted.clone();
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            if let Err(error) = session::serve_master(master_stream, host_key, trusted, dispatcher).await {
                error!(%error, "master session failed");
            }
        });
    }
}
