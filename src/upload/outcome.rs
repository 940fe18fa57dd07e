// Operator-facing upload outcome and the sinks that display it
use std::io::{self, Write};
use std::path::PathBuf;

use serde::Deserialize;

use crate::colors::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub file_name: Option<String>,
    pub target_dir: PathBuf,
    pub success: bool,
    pub reason: Option<String>,
    pub bytes_written: usize,
    pub declared_length: i64,
}

impl UploadOutcome {
    pub fn new(file_name: Option<String>, target_dir: PathBuf, declared_length: i64) -> Self {
        UploadOutcome {
            file_name,
            target_dir,
            success: false,
            reason: None,
            bytes_written: 0,
            declared_length,
        }
    }

    pub fn display_name(&self) -> &str {
        match self.file_name.as_deref() {
            Some(n) if !n.is_empty() => n,
            _ => "Unknown",
        }
    }

    /// Body arrived shorter than the declared Content-Length.
    pub fn truncated(&self) -> bool {
        self.success && (self.bytes_written as i64) < self.declared_length
    }
}

pub trait OutcomeSink: Send + Sync {
    fn report(&self, o: &UploadOutcome);
}

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotifyKind {
    Console,
    Log,
}

pub fn sink_for(kind: NotifyKind) -> Box<dyn OutcomeSink> {
    match kind {
        NotifyKind::Console => Box::new(ConsoleSink),
        NotifyKind::Log => Box::new(LogSink),
    }
}

/// Prints the notification block an operator watching the terminal expects.
pub struct ConsoleSink;

impl ConsoleSink {
    pub fn render(o: &UploadOutcome) -> String {
        let (col, verdict) = if o.success { (GREEN, "YES") } else { (RED, "NO") };
        let mut s = format!(
            "Incoming file: {BOLD}{}{RESET}\nSUCCESS: {col}{verdict}{RESET}\nPATH TO BE SAVED: \"{}\"\n",
            o.display_name(),
            o.target_dir.display()
        );
        if let Some(r) = &o.reason {
            s.push_str(&format!("Reason: {YELLOW}{r}{RESET}\n"));
        }
        if o.truncated() {
            s.push_str(&format!(
                "{YELLOW}Body truncated: {} of {} bytes{RESET}\n",
                o.bytes_written, o.declared_length
            ));
        }
        s.push_str(SEPARATOR);
        s
    }
}

impl OutcomeSink for ConsoleSink {
    fn report(&self, o: &UploadOutcome) {
        let _ = writeln!(io::stdout(), "{}", Self::render(o));
        let _ = io::stdout().flush();
    }
}

pub struct LogSink;

impl OutcomeSink for LogSink {
    fn report(&self, o: &UploadOutcome) {
        let dir = o.target_dir.display().to_string();
        if o.success {
            tracing::info!(
                file = o.display_name(),
                dir = %dir,
                bytes = o.bytes_written,
                truncated = o.truncated(),
                "upload saved"
            );
        } else {
            tracing::warn!(
                file = o.display_name(),
                dir = %dir,
                reason = o.reason.as_deref().unwrap_or("unknown"),
                "upload rejected"
            );
        }
    }
}
