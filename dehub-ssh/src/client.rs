use std::sync::Arc;

use russh::client::{Config, Handle, Handler};
use russh::keys::{PrivateKey, PublicKey};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::SshError;

/// Caller-supplied predicate deciding whether a servant's advertised host
/// key is trusted (spec §4.6.1: "caller decides trust"). Evaluated once per
/// connection attempt; no persistence of its own.
pub type HostKeyPredicate = Arc<dyn Fn(&PublicKey) -> bool + Send + Sync>;

/// Opaque handle to a live master-side SSH client session, returned by
/// [`connect`]. Callers open sub-channels with `SshSession::channel_open_session`
/// and drive them with the `russh::Channel` methods (`exec`, `window_change`,
/// `into_stream`, ...).
pub type SshSession = Handle<ClientHandler>;

/// A sub-channel opened by the master, wrapped as a plain tokio
/// AsyncRead/AsyncWrite (spec §4.6.3-5: attach an inner multiplexer or
/// splice bytes directly, same as the servant's `ChannelStream`).
pub type ClientChannelStream = russh::ChannelStream<russh::client::Msg>;

struct ClientHandler {
    verify_host_key: HostKeyPredicate,
}

impl Handler for ClientHandler {
    type Error = SshError;

    async fn check_server_key(&mut self, server_public_key: &PublicKey) -> Result<bool, Self::Error> {
        Ok((self.verify_host_key)(server_public_key))
    }
}

/// Runs the master-side SSH client handshake over an already-opened
/// multiplexer stream (spec §4.6.1), authenticating with `private_key` and
/// pinning the servant's host key through `verify_host_key`.
pub async fn connect<S>(
    stream: S,
    private_key: Arc<PrivateKey>,
    verify_host_key: HostKeyPredicate,
) -> Result<SshSession, SshError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let config = Arc::new(Config::default());
    let handler = ClientHandler { verify_host_key };

    let mut handle = russh::client::connect_stream(config, stream, handler).await?;

    let authenticated = handle
        .authenticate_publickey("user", private_key)
        .await
        .map_err(SshError::Handshake)?;

    if !authenticated {
        return Err(SshError::AuthenticationFailed);
    }

    Ok(handle)
}
