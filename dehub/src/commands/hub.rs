use std::sync::Arc;

use anyhow::Result;
use dehub_directory::{Directory, MemoryDirectory, MongoDirectory};
use dehub_hub::Hub;
use tracing::info;

use crate::cli::HubArgs;
use crate::config::FileConfig;

pub async fn run(args: HubArgs, _config: FileConfig) -> Result<()> {
    let directory = build_directory(&args).await?;
    let hub = Hub::new(directory);

    hub.start_relay(&args.relay_bind, args.relay_advertise_host.as_deref())
        .await?;
    info!(bind = %args.bind, "serving edge listener");

    notify_systemd_ready();
    hub.serve_edge(&args.bind).await?;
    Ok(())
}

/// Tells systemd the hub is ready and keeps petting its watchdog, same as
/// the original CLI's `run` command. A no-op off Linux or outside a unit
/// with `Type=notify`.
#[cfg(target_os = "linux")]
fn notify_systemd_ready() {
    use sd_notify::NotifyState;
    use std::time::Duration;

    if !matches!(sd_notify::booted(), Ok(true)) {
        return;
    }
    tokio::spawn(async {
        if let Err(error) = async {
            sd_notify::notify(false, &[NotifyState::Ready])?;
            loop {
                sd_notify::notify(false, &[NotifyState::Watchdog])?;
                tokio::time::sleep(Duration::from_secs(15)).await;
            }
            #[allow(unreachable_code)]
            Ok::<(), anyhow::Error>(())
        }
        .await
        {
            tracing::error!(%error, "failed to communicate with systemd");
        }
    });
}

#[cfg(not(target_os = "linux"))]
fn notify_systemd_ready() {}

async fn build_directory(args: &HubArgs) -> Result<Arc<dyn Directory>> {
    let Some(uri) = &args.mongo_uri else {
        info!("using in-memory directory");
        return Ok(Arc::new(MemoryDirectory::new()));
    };

    let db_name = args
        .mongo_db
        .as_deref()
        .expect("clap requires mongo_db alongside mongo_uri");

    let client = mongodb::Client::with_uri_str(uri).await?;
    let database = client.database(db_name);
    let directory = MongoDirectory::new(&database, &args.mongo_collection);
    directory.ensure_indexes().await?;
    info!(db = db_name, "using mongo directory");
    Ok(Arc::new(directory))
}
