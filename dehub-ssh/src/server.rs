use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dehub_common::WinSize;
use russh::keys::PrivateKey;
use russh::server::{Auth, Config, Handler, Msg, Session};
use russh::{Channel, ChannelId};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use crate::channel::SubChannelRequest;
use crate::fingerprint::TrustedKeys;
use crate::SshError;

/// A channel stream handed to the caller's dispatcher once a sub-channel's
/// command has been decided. `russh::Channel::into_stream` yields the
/// concrete tokio-AsyncRead/AsyncWrite type; callers splice it with a PTY,
/// layer an inner multiplexer, or feed it to a protocol server as the spec
/// requires per sub-channel kind.
pub type ChannelStream = russh::ChannelStream<Msg>;

/// Delivers terminal-resize notifications for one exec sub-channel. `russh`
/// has no generic "send an arbitrary named channel request" primitive; the
/// wire carrier for a resize is the standard SSH `window-change` channel
/// request (`Handler::window_change_request`), which this type surfaces to
/// the caller as the `WinSize` values the spec's `"resize"` request conveys.
pub struct ResizeStream(mpsc::UnboundedReceiver<WinSize>);

impl ResizeStream {
    pub async fn recv(&mut self) -> Option<WinSize> {
        self.0.recv().await
    }
}

/// Reacts to a sub-channel once it has been authorized and its command
/// decided. Implemented once per role by the crate that owns the actual
/// exec/socks5/share-dir behavior (`dehub-servant`); `dehub-ssh` only knows
/// how to get the handshake and channel open/request plumbing right.
#[async_trait]
pub trait SubChannelHandler: Send + Sync + 'static {
    async fn handle(&self, request: SubChannelRequest, channel: ChannelStream, resize: ResizeStream);
}

struct ServerHandler {
    trusted: TrustedKeys,
    dispatcher: Arc<dyn SubChannelHandler>,
    pending: Arc<Mutex<HashMap<ChannelId, Channel<Msg>>>>,
    resize_tx: Arc<Mutex<HashMap<ChannelId, mpsc::UnboundedSender<WinSize>>>>,
}

impl Handler for ServerHandler {
    type Error = anyhow::Error;

    async fn auth_publickey_offered(
        &mut self,
        _user: &str,
        key: &russh::keys::PublicKey,
    ) -> Result<Auth, Self::Error> {
        self.check(key)
    }

    async fn auth_publickey(
        &mut self,
        _user: &str,
        key: &russh::keys::PublicKey,
    ) -> Result<Auth, Self::Error> {
        self.check(key)
    }

    async fn channel_open_session(
        &mut self,
        channel: Channel<Msg>,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        self.pending.lock().await.insert(channel.id(), channel);
        Ok(true)
    }

    async fn exec_request(
        &mut self,
        channel: ChannelId,
        data: &[u8],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        let request: SubChannelRequest = match serde_json::from_slice(data) {
            Ok(request) => request,
            Err(error) => {
                warn!(%error, "rejecting sub-channel with unparseable request");
                session.channel_failure(channel)?;
                return Ok(());
            }
        };

        let Some(chan) = self.pending.lock().await.remove(&channel) else {
            session.channel_failure(channel)?;
            return Ok(());
        };

        session.channel_success(channel)?;
        debug!(command = request.command.as_str(), "sub-channel opened");

        let (tx, rx) = mpsc::unbounded_channel();
        self.resize_tx.lock().await.insert(channel, tx);

        let dispatcher = self.dispatcher.clone();
        tokio::spawn(async move {
            dispatcher
                .handle(request, chan.into_stream(), ResizeStream(rx))
                .await;
        });

        Ok(())
    }

    async fn window_change_request(
        &mut self,
        channel: ChannelId,
        col_width: u32,
        row_height: u32,
        pix_width: u32,
        pix_height: u32,
        _session: &mut Session,
    ) -> Result<(), Self::Error> {
        if let Some(tx) = self.resize_tx.lock().await.get(&channel) {
            let _ = tx.send(WinSize {
                rows: row_height as u16,
                cols: col_width as u16,
                xpix: pix_width as u16,
                ypix: pix_height as u16,
            });
        }
        Ok(())
    }

    async fn channel_close(
        &mut self,
        channel: ChannelId,
        _session: &mut Session,
    ) -> Result<(), Self::Error> {
        self.resize_tx.lock().await.remove(&channel);
        Ok(())
    }
}

impl ServerHandler {
    fn check(&self, key: &russh::keys::PublicKey) -> Result<Auth, anyhow::Error> {
        if self.trusted.is_empty() || self.trusted.contains(key) {
            Ok(Auth::Accept)
        } else {
            Ok(Auth::Reject {
                proceed_with_methods: None,
                partial_success: false,
            })
        }
    }
}

/// Runs one servant-side SSH server handshake to completion over `stream`
/// (one inner-mux stream, spec §4.5.2), dispatching each authorized
/// sub-channel to `dispatcher`. Returns once the SSH session ends.
pub async fn serve<S>(
    stream: S,
    host_key: PrivateKey,
    trusted: TrustedKeys,
    dispatcher: Arc<dyn SubChannelHandler>,
) -> Result<(), SshError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let config = Arc::new(Config {
        keys: vec![host_key],
        ..Default::default()
    });

    let handler = ServerHandler {
        trusted,
        dispatcher,
        pending: Arc::new(Mutex::new(HashMap::new())),
        resize_tx: Arc::new(Mutex::new(HashMap::new())),
    };

    let session = russh::server::run_stream(config, stream, handler).await?;
    session.await?;
    Ok(())
}
