//! ============================================================================
//! Audit Log - Durable Protocol Event Trail
//! ============================================================================
//! Appends one timestamped line per protocol event so a failed handshake can
//! be reconstructed after the fact. Write-only from the running process;
//! token identifiers are recorded, secrets are redacted.
//! ============================================================================

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};
use tracing::warn;

use crate::types::{AuthError, AuthResult};

/// Append-only audit log, `<ISO-8601 timestamp> - <message>` per line
pub struct AuditLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl AuditLog {
    /// Open (or create) the log file in append mode.
    pub fn open(path: impl AsRef<Path>) -> AuthResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                AuthError::Configuration(format!(
                    "cannot open audit log {}: {e}",
                    path.display()
                ))
            })?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Append one event line. A write failure is reported on the tracing
    /// side but never interrupts the flow being audited.
    pub fn record(&self, message: impl AsRef<str>) {
        let stamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let line = format!("{} - {}\n", stamp, message.as_ref());

        let mut file = match self.file.lock() {
            Ok(file) => file,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = file.write_all(line.as_bytes()) {
            warn!("audit log write failed ({}): {}", self.path.display(), e);
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Shorten a secret to a recognizable prefix for logging.
pub fn redact(secret: &str) -> String {
    if secret.len() <= 4 {
        "****".to_string()
    } else {
        format!("{}****", &secret[..4])
    }
}
