use dehub_common::Command;
use dehub_core::{Mode, Session};
use dehub_ssh::{SshSession, SubChannelRequest};
use russh::ChannelMsg;
use tokio::net::TcpListener;
use tokio_util::compat::{FuturesAsyncReadCompatExt, TokioAsyncReadCompatExt};
use tracing::{error, info};

/// Opens a `"forward-socks5"` sub-channel and attaches an inner multiplexer
/// to it, then loops on `listener`: each accepted local connection opens a
/// new stream on the tunnel and is spliced with it (spec §4.6.3). Returns
/// once `listener` stops accepting or the tunnel shuts down.
pub async fn forward_socks5(ssh: &mut SshSession, listener: TcpListener) -> anyhow::Result<()> {
    let request = SubChannelRequest::new(Command::ForwardSocks5, ())?;
    let mut channel = ssh.channel_open_session().await?;
    channel.exec(true, request.encode()).await?;

    loop {
        match channel.wait().await {
            Some(ChannelMsg::Success) => break,
            Some(ChannelMsg::Failure) => anyhow::bail!("servant rejected forward-socks5 sub-channel"),
            Some(_) => continue,
            None => anyhow::bail!("channel closed before forward-socks5 was acknowledged"),
        }
    }

    let tunnel = Session::new(channel.into_stream().compat(), Mode::Client);

    loop {
        let (local, _) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(error) => {
                error!(%error, "failed to accept socks5 connection");
                return Err(error.into());
            }
        };
        info!("new socks5 connection");

        let stream = match tunnel.open().await {
            Ok(stream) => stream,
            Err(_) => return Ok(()),
        };

        tokio::spawn(async move {
            let mut local = local;
            let mut stream = stream.compat();
            let _ = tokio::io::copy_bidirectional(&mut local, &mut stream).await;
        });
    }
}
