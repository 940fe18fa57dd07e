mod colors;
mod config;
mod error;
mod http;
mod log;
mod metrics;
mod server;
mod upload;


use std::path::PathBuf;

use clap::Parser;

/// Single-shot HTTP upload receiver with CORS support.
#[derive(Parser, Debug)]
#[command(name = "dropzone", version, about)]
struct Cli {
    /// Path to the TOML config file (generated with defaults if missing)
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Override server.listen_addr
    #[arg(long)]
    listen: Option<String>,

    /// Override upload.storage_dir
    #[arg(long)]
    storage_dir: Option<PathBuf>,

    /// Override upload.security_code
    #[arg(long)]
    secret: Option<String>,
}

fn main() {
    let cli = Cli::parse();
    metrics::init();
    log::init();

    let overrides = config::Overrides {
        listen_addr: cli.listen,
        storage_dir: cli.storage_dir,
        security_code: cli.secret,
    };
    let c = config::load_config(&cli.config, overrides);
    log::configure(c.server.logging, &c.server.log_level);
    tracing::info!("Storing uploads in {}", c.upload.storage_dir.display());

    let svc = upload::UploadService::new(&c.server, c.upload.clone());
    let srv = server::Server::new(c.server, svc);
    server::install_shutdown_handler(srv.shutdown_handle());
    if let Err(e) = srv.run() {
        tracing::error!("Server failed: {e}");
        std::process::exit(1);
    }
}
