//! The hub: stateless rendezvous and relay node (spec §4.4). Accepts
//! servants and masters on the edge listener and relays spliced connections
//! on a second, intra-cluster relay listener.

mod edge;
mod relay;
mod state;

use std::sync::Arc;

use dehub_directory::Directory;
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info};

pub use state::{local_ip, relay_public_addr, HubState};

/// Owns the shared [`HubState`] and the two listeners described in spec
/// §4.4.1. Dropping a `Hub` does not close already-accepted connections;
/// each connection task holds its own `Arc<HubState>`.
pub struct Hub {
    state: Arc<HubState>,
}

impl Hub {
    pub fn new(directory: Arc<dyn Directory>) -> Self {
        Self {
            state: HubState::new(directory),
        }
    }

    /// Binds the relay listener and records the hub's advertised address.
    /// Must complete before `serve_edge` will accept any client (spec
    /// §4.4.1: "Until the relay listener is bound, `Handle` rejects every
    /// incoming client").
    pub async fn start_relay(
        &self,
        bind_addr: &str,
        advertise_host: Option<&str>,
    ) -> std::io::Result<String> {
        let listener = TcpListener::bind(bind_addr).await?;
        let public_addr = state::relay_public_addr(listener.local_addr()?, advertise_host)?;
        self.state.set_relay_addr(public_addr.clone());
        info!(addr = %public_addr, "relay server started");

        let state = self.state.clone();
        tokio::spawn(async move {
            accept_loop(listener, state, |stream, state| {
                tokio::spawn(relay::handle(stream, state));
            })
            .await;
        });

        Ok(public_addr)
    }

    /// Runs the edge listener until it errors or is cancelled. Intended to
    /// be awaited directly (it's the "main loop" of a hub process).
    pub async fn serve_edge(&self, bind_addr: &str) -> std::io::Result<()> {
        let listener = TcpListener::bind(bind_addr).await?;
        let state = self.state.clone();
        accept_loop(listener, state, |stream, state| {
            tokio::spawn(edge::handle(stream, state));
        })
        .await;
        Ok(())
    }

    pub fn state(&self) -> Arc<HubState> {
        self.state.clone()
    }
}

async fn accept_loop(
    listener: TcpListener,
    state: Arc<HubState>,
    spawn: impl Fn(TcpStream, Arc<HubState>),
) {
    loop {
        match listener.accept().await {
            Ok((stream, _)) => spawn(stream, state.clone()),
            Err(error) => {
                error!(%error, "failed to accept connection");
                return;
            }
        }
    }
}
