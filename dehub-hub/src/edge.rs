use std::sync::Arc;
use std::time::Duration;

use dehub_common::{ClientRole, HubHeader, ServantId, HEARTBEAT};
use dehub_core::{Mode, Session};
use dehub_wire::read_msg;
use tokio::net::TcpStream;
use tokio_util::compat::TokioAsyncReadCompatExt;
use tracing::{error, info, warn};

use crate::state::HubState;

/// Per-connection entry point for the edge listener (spec §4.4.2).
pub async fn handle(mut stream: TcpStream, state: Arc<HubState>) {
    let Some(relay_addr) = state.relay_addr() else {
        dehub_wire::write_msg(&mut stream, &"relay server failed to start".to_owned()).await;
        return;
    };

    let header: HubHeader = match read_msg(&mut stream).await {
        Ok(header) => header,
        Err(error) => {
            warn!(%error, "failed to read hub header");
            dehub_wire::write_msg(&mut stream, &format!("failed to read header: {error}")).await;
            return;
        }
    };

    match header.role {
        ClientRole::Servant => handle_servant(stream, header.id, relay_addr, state).await,
        ClientRole::Master => handle_master(stream, header.id, state).await,
    }
}

/// Servant path (spec §4.5.3): attach a multiplexer in the **client** role
/// (the servant runs the mux server), register the session, heartbeat-
/// refresh the directory, and block until the control connection drops.
async fn handle_servant(mut stream: TcpStream, id: ServantId, relay_addr: String, state: Arc<HubState>) {
    dehub_wire::write_msg(&mut stream, &"".to_owned()).await;

    let session = Arc::new(Session::new(stream.compat(), Mode::Client));
    state.sessions.insert(id.clone(), session.clone());

    if let Err(error) = state.directory.store_location(id.as_str(), &relay_addr).await {
        warn!(%error, %id, "failed to store servant location");
        state.sessions.remove(&id);
        return;
    }
    info!(%id, "servant connected hub");

    let heartbeat = tokio::spawn(heartbeat_loop(state.clone(), id.clone(), session.clone(), relay_addr));

    session.closed().await;
    heartbeat.abort();

    info!(%id, "servant disconnected from hub");
    state.sessions.remove(&id);
    if let Err(error) = state.directory.delete_location(id.as_str()).await {
        error!(%error, %id, "failed to delete servant location");
    }
}

async fn heartbeat_loop(state: Arc<HubState>, id: ServantId, session: Arc<Session>, relay_addr: String) {
    while !session.is_closed() {
        tokio::time::sleep(HEARTBEAT).await;
        if session.is_closed() {
            break;
        }
        if let Err(error) = state.directory.store_location(id.as_str(), &relay_addr).await {
            warn!(%error, %id, "heartbeat failed to refresh location");
        }
    }
}

/// Master path (spec §4.4.4): look up the servant's hub-of-record, dial its
/// relay listener, forward the handshake, then splice bytes opaquely.
async fn handle_master(mut stream: TcpStream, id: ServantId, state: Arc<HubState>) {
    let (addr, full_id) = match state.directory.load_location(id.as_str()).await {
        Ok(found) => found,
        Err(error) => {
            dehub_wire::write_msg(&mut stream, &format!("failed to get servant location: {error}")).await;
            return;
        }
    };

    let mut relay = match TcpStream::connect(&addr).await {
        Ok(relay) => relay,
        Err(error) => {
            dehub_wire::write_msg(&mut stream, &format!("failed to dial relay: {error}")).await;
            return;
        }
    };

    dehub_wire::write_msg(&mut relay, &full_id).await;
    let ack: String = match read_msg(&mut relay).await {
        Ok(ack) => ack,
        Err(error) => {
            dehub_wire::write_msg(&mut stream, &format!("failed to read relay ack: {error}")).await;
            return;
        }
    };
    if !ack.is_empty() {
        dehub_wire::write_msg(&mut stream, &ack).await;
        return;
    }

    dehub_wire::write_msg(&mut stream, &"".to_owned()).await;
    info!(id = %full_id, "master connected to hub");

    let _ = tokio::io::copy_bidirectional(&mut stream, &mut relay).await;
    info!(id = %full_id, "master disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use dehub_common::DIAL_TIMEOUT;

    #[test]
    fn heartbeat_is_slower_than_dial_timeout() {
        // Sanity check on the constants this module relies on: a servant
        // whose heartbeat is starved for one interval must not be mistaken
        // for a connection that never dialed.
        assert!(HEARTBEAT > Duration::from_secs(0));
        assert!(DIAL_TIMEOUT < HEARTBEAT);
    }
}
