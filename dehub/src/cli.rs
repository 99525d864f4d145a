use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use dehub_common::ServantId;

#[derive(Parser)]
#[command(name = "dehub", version, about = "Reverse-tunnel network fabric")]
pub struct Cli {
    /// Path to a YAML config file supplying defaults for any flag below.
    #[arg(long, global = true, env = "DEHUB_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log output format.
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormat>,

    /// Increase log verbosity (repeatable: -d, -dd).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub debug: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a hub: stateless rendezvous and relay node (spec §4.4).
    Hub(HubArgs),
    /// Run a servant: registers with a hub and serves exec/socks5/share-dir
    /// sub-channels (spec §4.5).
    Servant(ServantArgs),
    /// Run a master operation against a servant (spec §4.6).
    Master(MasterArgs),
}

#[derive(Parser)]
pub struct HubArgs {
    /// Address the edge listener binds to (servants and masters connect here).
    #[arg(long, default_value = "0.0.0.0:9000")]
    pub bind: String,

    /// Address the relay listener binds to (inter-hub traffic).
    #[arg(long, default_value = "0.0.0.0:9001")]
    pub relay_bind: String,

    /// Host (or host:port) advertised to other hubs in place of the relay
    /// listener's bound address, for deployments behind NAT/a load balancer.
    #[arg(long)]
    pub relay_advertise_host: Option<String>,

    /// Mongo connection string for a cluster-shared directory. Omit to use
    /// the in-memory directory (spec §9's "legitimate single-node default").
    #[arg(long, requires = "mongo_db")]
    pub mongo_uri: Option<String>,

    /// Mongo database name, required when `--mongo-uri` is set.
    #[arg(long)]
    pub mongo_db: Option<String>,

    /// Mongo collection holding servant locations.
    #[arg(long, default_value = "dehub_locations")]
    pub mongo_collection: String,
}

#[derive(Parser)]
pub struct ServantArgs {
    /// Hub edge address to register with.
    #[arg(long)]
    pub hub: String,

    /// This servant's id; masters dial it by (possibly abbreviated) id.
    #[arg(long)]
    pub id: String,

    /// Path to this servant's SSH host private key (generated on first run
    /// if missing).
    #[arg(long, default_value = "dehub_host_key")]
    pub host_key: PathBuf,

    /// Authorized-keys-format file of master public keys allowed to connect.
    /// Omit to accept any master's key (a logged, insecure default).
    #[arg(long)]
    pub trusted_keys: Option<PathBuf>,

    /// Delay between hub reconnection attempts.
    #[arg(long, default_value = "5s", value_parser = parse_duration)]
    pub retry: std::time::Duration,
}

#[derive(Parser)]
pub struct MasterArgs {
    #[command(flatten)]
    pub connect: MasterConnectArgs,

    #[command(subcommand)]
    pub operation: MasterOperation,
}

#[derive(Parser)]
pub struct MasterConnectArgs {
    /// Hub edge address to dial.
    #[arg(long)]
    pub hub: String,

    /// Target servant's id (may be an unambiguous prefix).
    #[arg(long)]
    pub id: String,

    /// Path to this master's SSH client private key.
    #[arg(long)]
    pub private_key: PathBuf,

    /// Authorized-keys-format file of servant host keys this master trusts.
    /// Omit to accept any servant's host key (a logged, insecure default —
    /// spec §4.6.1 leaves trust policy to the caller).
    #[arg(long)]
    pub trusted_keys: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum MasterOperation {
    /// Run a command under a PTY on the servant (spec §4.6.2).
    Exec {
        cmd: String,
        args: Vec<String>,
    },
    /// Run a local SOCKS5 listener tunneled through the servant (spec §4.6.3).
    Socks5 {
        #[arg(long, default_value = "127.0.0.1:1080")]
        listen: String,
    },
    /// Run a local HTTP proxy tunneled through the servant (spec §4.6.4).
    HttpProxy {
        #[arg(long, default_value = "127.0.0.1:8080")]
        listen: String,
    },
    /// Mount the servant's `remote_dir` over NFS on `listen` (spec §4.6.5).
    Nfs {
        remote_dir: String,
        #[arg(long, default_value = "127.0.0.1:2049")]
        listen: String,
        #[arg(long, default_value_t = 2048)]
        cache_limit: i64,
    },
}

impl ServantArgs {
    pub fn servant_id(&self) -> ServantId {
        ServantId::new(self.id.clone())
    }
}

impl MasterConnectArgs {
    pub fn servant_id(&self) -> ServantId {
        ServantId::new(self.id.clone())
    }
}

fn parse_duration(raw: &str) -> Result<std::time::Duration, String> {
    let raw = raw.trim();
    let (digits, unit) = raw.split_at(raw.find(|c: char| !c.is_ascii_digit()).unwrap_or(raw.len()));
    let value: u64 = digits.parse().map_err(|_| format!("invalid duration: {raw}"))?;
    match unit {
        "" | "s" => Ok(std::time::Duration::from_secs(value)),
        "ms" => Ok(std::time::Duration::from_millis(value)),
        "m" => Ok(std::time::Duration::from_secs(value * 60)),
        other => Err(format!("unknown duration unit {other:?} (expected s, ms, or m)")),
    }
}
