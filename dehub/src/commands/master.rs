use std::sync::Arc;

use anyhow::Result;
use dehub_master::{connect, exec, forward_socks5, serve_http_proxy, serve_nfs};
use dehub_ssh::{HostKeyPredicate, PrivateKey, PublicKey, TrustedKeys};
use tokio::net::TcpListener;
use tracing::warn;

use crate::cli::{MasterArgs, MasterOperation};
use crate::config::FileConfig;

pub async fn run(args: MasterArgs, _config: FileConfig) -> Result<()> {
    let private_key = Arc::new(load_private_key(&args.connect.private_key).await?);
    let verify_host_key = load_host_key_predicate(args.connect.trusted_keys.as_deref()).await?;

    let mut master = connect(
        &args.connect.hub,
        args.connect.servant_id(),
        private_key,
        verify_host_key,
    )
    .await?;

    run_operation(&mut master.ssh, args.operation).await
}

async fn run_operation(
    ssh: &mut dehub_ssh::SshSession,
    operation: MasterOperation,
) -> Result<()> {
    match operation {
        MasterOperation::Exec { cmd, args } => exec(ssh, &cmd, &args).await,
        MasterOperation::Socks5 { listen } => {
            let listener = TcpListener::bind(&listen).await?;
            forward_socks5(ssh, listener).await
        }
        MasterOperation::HttpProxy { listen } => {
            let listener = TcpListener::bind(&listen).await?;
            serve_http_proxy(ssh, listener).await
        }
        MasterOperation::Nfs {
            remote_dir,
            listen,
            cache_limit,
        } => {
            let listener = TcpListener::bind(&listen).await?;
            serve_nfs(ssh, &remote_dir, listener, cache_limit).await
        }
    }
}

async fn load_private_key(path: &std::path::Path) -> Result<PrivateKey> {
    let data = tokio::fs::read_to_string(path).await?;
    Ok(PrivateKey::from_openssh(&data)?)
}

async fn load_host_key_predicate(path: Option<&std::path::Path>) -> Result<HostKeyPredicate> {
    let Some(path) = path else {
        warn!("no --trusted-keys given; accepting any servant's host key");
        return Ok(Arc::new(|_: &PublicKey| true));
    };
    let blob = tokio::fs::read_to_string(path).await?;
    let trusted = TrustedKeys::from_authorized_keys(&blob)?;
    Ok(Arc::new(move |key: &PublicKey| trusted.contains(key)))
}

