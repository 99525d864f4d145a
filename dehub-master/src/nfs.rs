use std::sync::Arc;

use dehub_common::{Command, MountDirMeta};
use dehub_core::{Mode, Session};
use dehub_ssh::{SshSession, SubChannelRequest};
use russh::ChannelMsg;
use tokio::net::TcpListener;
use tokio_util::compat::{FuturesAsyncReadCompatExt, TokioAsyncReadCompatExt};
use tracing::error;

/// Opens a `"share-dir"` sub-channel for `remote_dir` and attaches an inner
/// multiplexer to it, then runs a local NFS front-end: each connection
/// accepted on `listener` opens a new stream on the tunnel and is spliced
/// with it (spec §4.6.5). Blocks until the tunnel shuts down.
pub async fn serve_nfs(
    ssh: &mut SshSession,
    remote_dir: &str,
    listener: TcpListener,
    cache_limit: i64,
) -> anyhow::Result<()> {
    let meta = MountDirMeta {
        path: remote_dir.to_owned(),
        cache_limit,
    };
    let request = SubChannelRequest::new(Command::ShareDir, meta)?;
    let mut channel = ssh.channel_open_session().await?;
    channel.exec(true, request.encode()).await?;

    loop {
        match channel.wait().await {
            Some(ChannelMsg::Success) => break,
            Some(ChannelMsg::Failure) => anyhow::bail!("servant rejected share-dir sub-channel"),
            Some(_) => continue,
            None => anyhow::bail!("channel closed before share-dir was acknowledged"),
        }
    }

    let tunnel = Arc::new(Session::new(channel.into_stream().compat(), Mode::Client));

    tokio::spawn({
        let tunnel = tunnel.clone();
        async move {
            loop {
                let (local, _) = match listener.accept().await {
                    Ok(accepted) => accepted,
                    Err(error) => {
                        error!(%error, "failed to accept nfs connection");
                        return;
                    }
                };

                let stream = match tunnel.open().await {
                    Ok(stream) => stream,
                    Err(_) => return,
                };

                tokio::spawn(async move {
                    let mut local = local;
                    let mut stream = stream.compat();
                    let _ = tokio::io::copy_bidirectional(&mut local, &mut stream).await;
                });
            }
        }
    });

    tunnel.closed().await;
    Ok(())
}
