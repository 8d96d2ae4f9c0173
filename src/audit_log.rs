use std::env;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use affected_pkgs_core::{LockfileError, LockfileErrorKind, LockfileFormat};
use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::types::ScanReport;

pub struct AuditLogger {
    file: Mutex<File>,
}

#[derive(Debug, Serialize)]
pub struct AuditRecord {
    timestamp: String,
    context: String,
    file_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<LockfileFormat>,
    content_sha256: Option<String>,
    affected_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    scanned_count: Option<usize>,
    found: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<AuditError>,
}

#[derive(Debug, Serialize)]
struct AuditError {
    kind: LockfileErrorKind,
    message: String,
}

/// Inputs for one scan audit record.
pub struct ScanDecision<'a> {
    pub context: &'a str,
    pub file_name: &'a str,
    /// Raw lockfile text, when it was read.
    pub content: Option<&'a str>,
    pub affected_count: usize,
    pub outcome: Result<&'a ScanReport, &'a LockfileError>,
}

impl AuditLogger {
    pub fn new() -> anyhow::Result<Self> {
        let log_path = audit_log_path();
        if let Some(parent) = log_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    pub fn log(&self, record: AuditRecord) -> anyhow::Result<()> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| anyhow::anyhow!("audit log mutex poisoned"))?;
        let json = serde_json::to_string(&record)?;
        file.write_all(json.as_bytes())?;
        file.write_all(b"\n")?;
        file.flush()?;
        Ok(())
    }
}

impl AuditRecord {
    pub fn scan_decision(input: ScanDecision<'_>) -> Self {
        let (format, scanned_count, found, error) = match input.outcome {
            Ok(report) => (
                Some(report.format),
                Some(report.scanned_count),
                report
                    .found
                    .iter()
                    .map(|pkg| format!("{}@{}", pkg.name, pkg.version))
                    .collect(),
                None,
            ),
            Err(err) => (
                None,
                None,
                Vec::new(),
                Some(AuditError {
                    kind: err.kind(),
                    message: err.to_string(),
                }),
            ),
        };

        Self {
            timestamp: Utc::now().to_rfc3339(),
            context: input.context.to_string(),
            file_name: input.file_name.to_string(),
            format,
            content_sha256: input.content.map(content_sha256),
            affected_count: input.affected_count,
            scanned_count,
            found,
            error,
        }
    }
}

fn content_sha256(content: &str) -> String {
    format!("{:x}", Sha256::digest(content.as_bytes()))
}

fn audit_log_path() -> PathBuf {
    if let Some(explicit) = env::var_os("AFFECTED_PKGS_AUDIT_LOG_PATH") {
        return PathBuf::from(explicit);
    }

    let home = env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .or_else(|| env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    home.join(".local")
        .join("share")
        .join("affected-pkgs")
        .join("audit.log")
}

#[cfg(test)]
#[path = "tests/audit_log.rs"]
mod tests;
