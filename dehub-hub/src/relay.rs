use std::sync::Arc;

use dehub_common::ServantId;
use dehub_core::MuxError;
use dehub_wire::read_msg;
use tokio::net::TcpStream;
use tracing::{info, warn};
use tokio_util::compat::FuturesAsyncReadCompatExt;

use crate::state::HubState;

/// Per-connection entry point for the intra-hub relay listener (spec
/// §4.4.5): another hub (or this one, serving its own master) forwarding a
/// master's connection toward the servant that registered here.
pub async fn handle(mut stream: TcpStream, state: Arc<HubState>) {
    let id: ServantId = match read_msg(&mut stream).await {
        Ok(id) => id,
        Err(error) => {
            warn!(%error, "failed to read servant id on relay listener");
            dehub_wire::write_msg(&mut stream, &format!("failed to read servant name: {error}")).await;
            return;
        }
    };

    let Some(session) = state.sessions.get(&id).map(|entry| entry.clone()) else {
        if let Err(error) = state.directory.delete_location(id.as_str()).await {
            warn!(%error, %id, "failed to delete stale directory entry");
        }
        dehub_wire::write_msg(&mut stream, &format!("servant not found: {id}")).await;
        return;
    };

    info!(%id, "relay connected");

    let mut tunnel = match session.open().await {
        Ok(tunnel) => tunnel,
        Err(MuxError::Shutdown) => {
            // Spec §4.4.6: relay acks success with an empty body; the master
            // observes a clean EOF rather than hanging on a missing ack.
            dehub_wire::write_msg(&mut stream, &"".to_owned()).await;
            return;
        }
        Err(error) => {
            dehub_wire::write_msg(&mut stream, &format!("failed to open stream: {error}")).await;
            return;
        }
    };

    dehub_wire::write_msg(&mut stream, &"".to_owned()).await;

    let mut tunnel = tunnel.compat();
    let _ = tokio::io::copy_bidirectional(&mut stream, &mut tunnel).await;
}
