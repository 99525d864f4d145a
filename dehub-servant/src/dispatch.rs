use async_trait::async_trait;
use dehub_common::Command;
use dehub_ssh::{ChannelStream, ResizeStream, SubChannelHandler, SubChannelRequest};
use tracing::warn;

use crate::{exec, sharedir, socks5};

/// Routes an authorized sub-channel to its typed handler (spec §4.5.2-5).
pub struct Dispatcher;

#[async_trait]
impl SubChannelHandler for Dispatcher {
    async fn handle(&self, request: SubChannelRequest, channel: ChannelStream, resize: ResizeStream) {
        match request.command {
            Command::Exec => exec::handle(request.meta, channel, resize).await,
            Command::ForwardSocks5 => socks5::handle(channel).await,
            Command::ShareDir => sharedir::handle(request.meta, channel).await,
        }
    }
}

pub(crate) fn log_meta_error(what: &str, error: impl std::fmt::Display) {
    warn!(%error, "failed to parse {what} metadata");
}
