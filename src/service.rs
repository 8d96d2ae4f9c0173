//! Shared application service for lockfile scans.

use std::path::Path;
use std::sync::Arc;

use affected_pkgs_core::{AffectedNameSet, LockfileError, match_affected};
use anyhow::Context;

use crate::audit_log::{AuditLogger, AuditRecord, ScanDecision};
use crate::config::AffectedPkgsConfig;
use crate::lockfiles::{LockfileCatalog, register_default_catalog};
use crate::types::ScanReport;

const AUDIT_LOG_FAILURE_CONTEXT: &str = "failed to append audit log record";

/// Core runtime service for lockfile scans.
#[derive(Clone)]
pub struct ScanService {
    catalog: LockfileCatalog,
    config: Arc<AffectedPkgsConfig>,
    audit_logger: Option<Arc<AuditLogger>>,
}

impl ScanService {
    /// Creates a service using the default config and on-disk audit log.
    ///
    /// # Errors
    ///
    /// Returns an error if config or audit logger initialization fails.
    pub fn new() -> anyhow::Result<Self> {
        let config = AffectedPkgsConfig::load()?;
        let audit_logger = if config.audit.enabled {
            Some(AuditLogger::new().context("failed to open audit log")?)
        } else {
            None
        };
        Ok(Self::with_parts(config, audit_logger))
    }

    #[cfg(test)]
    /// Creates a service for tests without an audit log.
    pub fn with_config(config: AffectedPkgsConfig) -> Self {
        Self::with_parts(config, None)
    }

    fn with_parts(config: AffectedPkgsConfig, audit_logger: Option<AuditLogger>) -> Self {
        Self {
            catalog: register_default_catalog(config.parser_options()),
            config: Arc::new(config),
            audit_logger: audit_logger.map(Arc::new),
        }
    }

    /// Scans a lockfile on disk.
    ///
    /// The file name used for format detection is the last component of `path`.
    ///
    /// # Errors
    ///
    /// Returns [`LockfileError`] (wrapped in `anyhow`) for unsupported names,
    /// read failures and parse failures, or a plain error when the affected
    /// list or audit log cannot be used.
    pub fn scan_path(
        &self,
        path: &str,
        extra_names: &AffectedNameSet,
        context: &str,
    ) -> anyhow::Result<ScanReport> {
        let file_name = file_name_of(path);
        let affected = self.affected_names(extra_names)?;

        let content = match self
            .catalog
            .parser_for(&file_name)
            .and_then(|_| read_lockfile(Path::new(path)))
        {
            Ok(content) => content,
            Err(err) => {
                self.log_scan(ScanDecision {
                    context,
                    file_name: &file_name,
                    content: None,
                    affected_count: affected.len(),
                    outcome: Err(&err),
                })?;
                return Err(err.into());
            }
        };

        self.scan_with_names(&file_name, &content, &affected, context)
    }

    /// Scans lockfile text that the caller already read.
    ///
    /// # Errors
    ///
    /// Same as [`ScanService::scan_path`], minus read failures.
    pub fn scan_content(
        &self,
        file_name: &str,
        content: &str,
        extra_names: &AffectedNameSet,
        context: &str,
    ) -> anyhow::Result<ScanReport> {
        let affected = self.affected_names(extra_names)?;
        self.scan_with_names(file_name, content, &affected, context)
    }

    fn scan_with_names(
        &self,
        file_name: &str,
        content: &str,
        affected: &AffectedNameSet,
        context: &str,
    ) -> anyhow::Result<ScanReport> {
        let outcome = self.analyze(file_name, content, affected);
        self.log_scan(ScanDecision {
            context,
            file_name,
            content: Some(content),
            affected_count: affected.len(),
            outcome: outcome.as_ref(),
        })?;

        match outcome {
            Ok(report) => {
                tracing::info!(
                    "scanned {} packages in {file_name}; {} affected",
                    report.scanned_count,
                    report.found.len()
                );
                Ok(report)
            }
            Err(err) => {
                tracing::warn!("scan of {file_name} failed: {err}");
                Err(err.into())
            }
        }
    }

    fn analyze(
        &self,
        file_name: &str,
        content: &str,
        affected: &AffectedNameSet,
    ) -> Result<ScanReport, LockfileError> {
        let parsed = self.catalog.detect_and_parse(file_name, content)?;
        if let Some(diagnostic) = parsed.diagnostic.as_deref() {
            tracing::warn!("{file_name}: {diagnostic}");
        }

        let result = match_affected(&parsed.packages, affected);
        Ok(ScanReport {
            file_name: file_name.to_string(),
            format: parsed.format,
            clean: result.found.is_empty(),
            found: result.found,
            scanned_count: result.scanned_count,
            affected_count: affected.len(),
            diagnostic: parsed.diagnostic,
        })
    }

    fn affected_names(&self, extra_names: &AffectedNameSet) -> anyhow::Result<AffectedNameSet> {
        let mut names = self.config.affected_names()?;
        names.extend(extra_names.iter());
        if names.is_empty() {
            tracing::warn!("affected package list is empty; no package can match");
        }
        Ok(names)
    }

    fn log_scan(&self, decision: ScanDecision<'_>) -> anyhow::Result<()> {
        let Some(audit_logger) = self.audit_logger.as_ref() else {
            return Ok(());
        };
        audit_logger
            .log(AuditRecord::scan_decision(decision))
            .context(AUDIT_LOG_FAILURE_CONTEXT)
    }
}

fn read_lockfile(path: &Path) -> Result<String, LockfileError> {
    std::fs::read_to_string(path).map_err(|source| LockfileError::ReadFailure {
        path: path.display().to_string(),
        source,
    })
}

/// Final path component, or the raw input when it has none.
fn file_name_of(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(path)
        .to_string()
}

#[cfg(test)]
#[path = "tests/service.rs"]
mod tests;
