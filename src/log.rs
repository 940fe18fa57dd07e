// Logging setup on top of tracing-subscriber, with a reloadable level
use std::sync::OnceLock;

use http::StatusCode;
use tracing_subscriber::{fmt, layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry};

static FILTER: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

/// Install the subscriber at `info` so config loading is already visible.
pub fn init() {
    let (filter, handle) = reload::Layer::new(filter_for("info"));
    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .try_init();
    if installed.is_ok() {
        let _ = FILTER.set(handle);
    }
}

/// Apply the configured level once the config file has been read.
/// RUST_LOG still takes precedence.
pub fn configure(enabled: bool, level: &str) {
    let Some(h) = FILTER.get() else { return };
    let f = if enabled { filter_for(level) } else { EnvFilter::new("off") };
    if let Err(e) = h.reload(f) {
        eprintln!("failed to apply log level: {e}");
    }
}

fn filter_for(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("dropzone={}", normalize_level(level))))
}

pub fn normalize_level(level: &str) -> &'static str {
    match level.to_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "info" => "info",
        "warn" | "warning" => "warn",
        "error" => "error",
        _ => "info",
    }
}

pub fn request(method: &str, file: Option<&str>, ip: &str) {
    tracing::info!(method, file = file.unwrap_or("-"), peer = ip, "request");
}

pub fn response(status: StatusCode, ms: u64) {
    let code = status.as_u16();
    if status.is_success() {
        tracing::info!(status = code, ms, "response");
    } else if status.is_server_error() {
        tracing::error!(status = code, ms, "response");
    } else {
        tracing::warn!(status = code, ms, "response");
    }
}
