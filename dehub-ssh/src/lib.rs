//! SSH handshake and sub-channel plumbing shared by the servant (SSH server
//! role, spec §4.5.2) and master (SSH client role, spec §4.6.1), layered on
//! `russh`.

mod channel;
mod client;
mod fingerprint;
mod keys;
mod server;

pub use channel::SubChannelRequest;
pub use client::{connect, ClientChannelStream, HostKeyPredicate, SshSession};
pub use fingerprint::{fingerprint, TrustedKeys};
pub use keys::{generate_host_key, load_or_generate_host_key};
pub use server::{serve, ChannelStream, ResizeStream, SubChannelHandler};

pub use russh::keys::{PrivateKey, PublicKey};
pub use russh::Channel as SshChannel;
pub use russh::client::Msg as ClientMsg;

#[derive(thiserror::Error, Debug)]
pub enum SshError {
    #[error("ssh: handshake failed: {0}")]
    Handshake(#[from] russh::Error),
    #[error("unable to authenticate")]
    AuthenticationFailed,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
