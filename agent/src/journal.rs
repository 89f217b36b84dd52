use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{error, info, warn};

/// Append-only agent event log: one `[timestamp] [LEVEL] [pcId] message`
/// line per event, flushed per line. Opened once at startup; the agent never
/// rotates or truncates it. Every entry is mirrored to tracing so the
/// console stays in step with the file.
pub struct Journal {
    pc_id: String,
    file: Mutex<File>,
}

impl Journal {
    pub fn open(path: &Path, pc_id: &str) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;

        Ok(Self {
            pc_id: pc_id.to_string(),
            file: Mutex::new(file),
        })
    }

    pub fn info(&self, msg: &str) {
        info!(pc_id = %self.pc_id, "{}", msg);
        self.append("INFO", msg);
    }

    pub fn warn(&self, msg: &str) {
        warn!(pc_id = %self.pc_id, "{}", msg);
        self.append("WARN", msg);
    }

    pub fn error(&self, msg: &str) {
        error!(pc_id = %self.pc_id, "{}", msg);
        self.append("ERROR", msg);
    }

    fn append(&self, level: &str, msg: &str) {
        let line = format_line(&self.pc_id, level, msg);
        // A failed write must never take the agent down with it
        if let Ok(mut file) = self.file.lock() {
            let _ = file.write_all(line.as_bytes());
            let _ = file.flush();
        }
    }
}

fn format_line(pc_id: &str, level: &str, msg: &str) -> String {
    let ts = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "-".to_string());
    format!("[{}] [{}] [{}] {}\n", ts, level, pc_id, msg)
}
