//! Types and constants shared by every role in the fabric (hub, servant,
//! master) plus the rendezvous wire format.

mod error;
mod ids;
mod meta;
mod time;
mod wire;

pub use error::FabricError;
pub use ids::ServantId;
pub use meta::{ExecMeta, MountDirMeta, WinSize};
pub use time::{DIAL_TIMEOUT, HANDSHAKE_TIMEOUT, HEARTBEAT, TTL};
pub use wire::{ClientRole, Command, HubHeader, RESIZE_REQUEST};
