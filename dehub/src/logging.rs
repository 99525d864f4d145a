use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, LogFormat};

/// Initializes the global tracing subscriber. `RUST_LOG` always wins; absent
/// that, `--debug` picks a default filter the way the teacher's CLI scales
/// verbosity off a repeated flag.
pub fn init_logging(cli: &Cli) {
    if std::env::var("RUST_LOG").is_err() {
        let default = match cli.debug {
            0 => "dehub=info",
            1 => "dehub=debug",
            2 => "dehub=debug,russh=debug",
            _ => "debug",
        };
        std::env::set_var("RUST_LOG", default);
    }

    let env_filter = EnvFilter::from_default_env();
    let registry = tracing_subscriber::registry().with(env_filter);

    match cli.log_format.unwrap_or(LogFormat::Text) {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}
