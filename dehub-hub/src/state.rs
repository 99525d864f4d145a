use std::net::{IpAddr, SocketAddr, UdpSocket};
use std::sync::Arc;
use std::sync::RwLock;

use dashmap::DashMap;
use dehub_common::ServantId;
use dehub_core::Session;
use dehub_directory::Directory;

/// Shared hub state: the in-memory `SessionTable` (spec §3) and a handle to
/// the pluggable [`Directory`]. One instance per hub process, cloned (via
/// `Arc`) into every edge/relay connection task.
pub struct HubState {
    pub sessions: DashMap<ServantId, Arc<Session>>,
    pub directory: Arc<dyn Directory>,
    relay_addr: RwLock<Option<String>>,
}

impl HubState {
    pub fn new(directory: Arc<dyn Directory>) -> Arc<Self> {
        Arc::new(Self {
            sessions: DashMap::new(),
            directory,
            relay_addr: RwLock::new(None),
        })
    }

    /// The public `host:port` the hub advertises in the directory. `None`
    /// until the relay listener has bound (spec §4.4.1: "Until the relay
    /// listener is bound, `Handle` rejects every incoming client").
    pub fn relay_addr(&self) -> Option<String> {
        self.relay_addr.read().expect("lock poisoned").clone()
    }

    pub fn set_relay_addr(&self, addr: String) {
        *self.relay_addr.write().expect("lock poisoned") = Some(addr);
    }
}

/// Best-effort local outbound-interface IP, the Rust analogue of the
/// original's `myip.GetInterfaceIP()` collaborator: connect a UDP socket
/// (no packet is actually sent) and read back which local address the OS
/// routing table picked for it.
pub fn local_ip() -> std::io::Result<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.connect("8.8.8.8:80")?;
    Ok(socket.local_addr()?.ip())
}

pub fn relay_public_addr(bound: SocketAddr, advertise_host: Option<&str>) -> std::io::Result<String> {
    let host = match advertise_host {
        Some(host) => host.to_owned(),
        None => local_ip()?.to_string(),
    };
    Ok(format!("{host}:{}", bound.port()))
}
