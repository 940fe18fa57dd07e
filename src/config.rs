// Configuration loading, validation, and default generation
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::upload::NotifyKind;

pub const DEFAULT_CONFIG_PATH: &str = "dropzone.toml";

#[derive(Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: Srv,
    pub upload: UploadCfg,
}

#[derive(Deserialize, Clone)]
#[serde(default)]
pub struct Srv {
    pub listen_addr: String,
    pub buffer_size: usize,
    pub max_header_size: usize,
    /// Seconds a read may block; 0 waits forever.
    pub client_timeout: u64,
    pub max_connections: usize,
    pub worker_threads: usize,
    pub shutdown_timeout: u64,
    pub log_level: String,
    pub logging: bool,
}

#[derive(Deserialize, Clone)]
#[serde(default)]
pub struct UploadCfg {
    pub storage_dir: PathBuf,
    pub security_code: String,
    pub max_body_size: usize,
    /// Refuse to save bodies shorter than their Content-Length.
    pub reject_truncated: bool,
    pub notify: NotifyKind,
}

impl Default for Srv {
    fn default() -> Self {
        Srv {
            listen_addr: "0.0.0.0:5005".to_string(),
            buffer_size: 4096,
            max_header_size: 65_536,
            client_timeout: 30,
            max_connections: 1024,
            worker_threads: 0,
            shutdown_timeout: 15,
            log_level: "info".to_string(),
            logging: true,
        }
    }
}

impl Default for UploadCfg {
    fn default() -> Self {
        UploadCfg {
            storage_dir: PathBuf::from("uploads"),
            security_code: "secret-pass".to_string(),
            max_body_size: 256 * 1024 * 1024,
            reject_truncated: false,
            notify: NotifyKind::Console,
        }
    }
}

impl Srv {
    pub fn validate(&mut self) -> bool {
        let mut valid = true;

        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            tracing::error!("listen_addr '{}' is not a valid address (expected ip:port)", self.listen_addr);
            valid = false;
        }
        if self.buffer_size < 512 {
            tracing::warn!("buffer_size too small ({}), using 512", self.buffer_size);
            self.buffer_size = 512;
        }
        if self.max_header_size == 0 {
            self.max_header_size = 65_536;
        }
        if self.max_header_size < self.buffer_size {
            tracing::warn!(
                "max_header_size ({}) < buffer_size ({}), heads larger than one read will be rejected",
                self.max_header_size, self.buffer_size
            );
        }
        if self.client_timeout == 0 {
            tracing::warn!("client_timeout is 0, stalled clients will hold a worker indefinitely");
        }
        if self.max_connections == 0 {
            self.max_connections = 1024;
        }
        if self.shutdown_timeout == 0 {
            self.shutdown_timeout = 15;
        }
        valid
    }
}

impl UploadCfg {
    pub fn validate(&mut self) -> bool {
        let mut valid = true;

        if self.security_code.is_empty() {
            tracing::error!("security_code is empty, every upload would be rejected");
            valid = false;
        }
        if self.max_body_size == 0 {
            self.max_body_size = 256 * 1024 * 1024;
        }
        if self.storage_dir.as_os_str().is_empty() {
            tracing::error!("storage_dir is empty");
            valid = false;
        } else if self.storage_dir.exists() && !self.storage_dir.is_dir() {
            tracing::error!("storage_dir '{}' is not a directory", self.storage_dir.display());
            valid = false;
        }
        valid
    }
}

/// Values given on the command line win over the file.
#[derive(Default)]
pub struct Overrides {
    pub listen_addr: Option<String>,
    pub storage_dir: Option<PathBuf>,
    pub security_code: Option<String>,
}

impl Config {
    pub fn apply(&mut self, o: Overrides) {
        if let Some(a) = o.listen_addr { self.server.listen_addr = a; }
        if let Some(d) = o.storage_dir { self.upload.storage_dir = d; }
        if let Some(s) = o.security_code { self.upload.security_code = s; }
    }

    /// Validate both sections, replacing fatal fields with safe defaults.
    pub fn sanitize(&mut self) {
        let srv_ok = self.server.validate();
        let up_ok = self.upload.validate();
        if srv_ok && up_ok {
            return;
        }
        tracing::error!("Fatal configuration errors, falling back to safe defaults for invalid fields");
        let d = Config::default();
        if self.server.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            tracing::warn!("listen_addr invalid, using {}", d.server.listen_addr);
            self.server.listen_addr = d.server.listen_addr;
        }
        if self.upload.security_code.is_empty() {
            tracing::warn!("security_code empty, using the built-in default");
            self.upload.security_code = d.upload.security_code;
        }
        if self.upload.storage_dir.as_os_str().is_empty()
            || (self.upload.storage_dir.exists() && !self.upload.storage_dir.is_dir())
        {
            tracing::warn!("storage_dir invalid, using {}", d.upload.storage_dir.display());
            self.upload.storage_dir = d.upload.storage_dir;
        }
    }
}

fn atomic_write(path: &Path, content: &str) -> std::io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    fs::write(&tmp, content)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

pub fn load_config(p: &Path, overrides: Overrides) -> Config {
    let mut cfg = match fs::read_to_string(p) {
        Ok(txt) => match toml::from_str(&txt) {
            Ok(c) => {
                tracing::info!("Loaded {}", p.display());
                c
            }
            Err(e) => {
                tracing::error!("Parse error {}: {e}", p.display());
                tracing::warn!("Using defaults");
                Config::default()
            }
        },
        Err(_) => {
            let cfg = Config::default();
            if atomic_write(p, &generate_config(&cfg)).is_ok() {
                tracing::info!("Generated {}", p.display());
            } else {
                tracing::warn!("No config at '{}', using defaults", p.display());
            }
            cfg
        }
    };
    cfg.apply(overrides);
    cfg.sanitize();
    ensure_storage_dir(&cfg.upload.storage_dir);
    cfg
}

fn ensure_storage_dir(dir: &Path) {
    if dir.is_dir() {
        return;
    }
    match fs::create_dir_all(dir) {
        Ok(()) => tracing::info!("Created storage directory {}", dir.display()),
        Err(e) => tracing::error!("Cannot create storage directory {}: {e}", dir.display()),
    }
}

pub fn generate_config(cfg: &Config) -> String {
    let mut doc = toml::Table::new();
    let mut srv = toml::Table::new();
    srv.insert("listen_addr".into(), toml::Value::String(cfg.server.listen_addr.clone()));
    srv.insert("buffer_size".into(), toml::Value::Integer(cfg.server.buffer_size as i64));
    srv.insert("max_header_size".into(), toml::Value::Integer(cfg.server.max_header_size as i64));
    srv.insert("client_timeout".into(), toml::Value::Integer(cfg.server.client_timeout as i64));
    srv.insert("max_connections".into(), toml::Value::Integer(cfg.server.max_connections as i64));
    srv.insert("worker_threads".into(), toml::Value::Integer(cfg.server.worker_threads as i64));
    srv.insert("shutdown_timeout".into(), toml::Value::Integer(cfg.server.shutdown_timeout as i64));
    srv.insert("log_level".into(), toml::Value::String(cfg.server.log_level.clone()));
    srv.insert("logging".into(), toml::Value::Boolean(cfg.server.logging));
    doc.insert("server".into(), toml::Value::Table(srv));

    let mut up = toml::Table::new();
    up.insert("storage_dir".into(), toml::Value::String(cfg.upload.storage_dir.display().to_string()));
    up.insert("security_code".into(), toml::Value::String(cfg.upload.security_code.clone()));
    up.insert("max_body_size".into(), toml::Value::Integer(cfg.upload.max_body_size as i64));
    up.insert("reject_truncated".into(), toml::Value::Boolean(cfg.upload.reject_truncated));
    let notify = match cfg.upload.notify {
        NotifyKind::Console => "console",
        NotifyKind::Log => "log",
    };
    up.insert("notify".into(), toml::Value::String(notify.to_string()));
    doc.insert("upload".into(), toml::Value::Table(up));

    match toml::to_string_pretty(&doc) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Config serialization failed: {e}");
            String::new()
        }
    }
}
