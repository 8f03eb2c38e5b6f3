use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use vds2465_core::{ServerConfig, VdsServer};

#[derive(Parser, Debug)]
#[command(about = "VdS 2465 alarm-transmission protocol server")]
struct Cli {
    /// Path to the server's TOML configuration file.
    #[arg(short, long, default_value = "vds2465.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config_str = match std::fs::read_to_string(&cli.config) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(path = %cli.config.display(), error = %e, "failed to read config");
            std::process::exit(1);
        }
    };
    let config = match ServerConfig::from_toml_str(&config_str) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    let sink: Arc<dyn vds2465_core::EventSink> = Arc::new(|event: vds2465_core::VdsEvent| {
        tracing::info!(?event, "vds event");
    });

    let mut server = VdsServer::new(config, sink);
    if let Err(e) = server.serve_forever().await {
        tracing::error!(error = %e, "server loop exited with error");
        std::process::exit(1);
    }
}
