use anyhow::Result;
use dehub_servant::{run, ServantConfig};
use dehub_ssh::{load_or_generate_host_key, TrustedKeys};
use tracing::warn;

use crate::cli::ServantArgs;
use crate::config::FileConfig;

pub async fn run_command(args: ServantArgs, _config: FileConfig) -> Result<()> {
    let host_key = load_or_generate_host_key(&args.host_key).await?;
    let trusted = load_trusted_keys(args.trusted_keys.as_deref()).await?;

    let config = ServantConfig {
        id: args.servant_id(),
        hub_addr: args.hub,
        host_key,
        trusted,
        retry: args.retry,
    };

    run(config).await
}

async fn load_trusted_keys(path: Option<&std::path::Path>) -> Result<TrustedKeys> {
    let Some(path) = path else {
        warn!("no --trusted-keys given; accepting any master's key");
        return Ok(TrustedKeys::new());
    };
    let blob = tokio::fs::read_to_string(path).await?;
    Ok(TrustedKeys::from_authorized_keys(&blob)?)
}
