//! MCP tool handlers and request/response orchestration.

use std::sync::Arc;

use affected_pkgs_core::{AffectedNameSet, LockfileError};
use rmcp::{
    ErrorData as McpError, ServerHandler, handler::server::tool::ToolRouter,
    handler::server::wrapper::Parameters, model::*, tool, tool_handler, tool_router,
};
use schemars::JsonSchema;
use serde::Deserialize;

use crate::service::ScanService;
use crate::types::ScanReport;

/// Parameters for the `scan_lockfile` MCP tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct LockfilePathQuery {
    #[schemars(
        description = "Path to a package-lock.json or yarn.lock file. The format is chosen from the exact file name."
    )]
    /// Path to the lockfile.
    pub path: String,

    #[schemars(
        description = "Extra package names to check, added to the configured affected list."
    )]
    #[serde(default)]
    /// Extra affected package names.
    pub affected: Vec<String>,
}

/// Parameters for the `scan_lockfile_content` MCP tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct LockfileContentQuery {
    #[schemars(description = "Lockfile name: exactly \"package-lock.json\" or \"yarn.lock\".")]
    /// Lockfile name used for format detection.
    pub file_name: String,

    #[schemars(description = "Full text content of the lockfile.")]
    /// Full lockfile text.
    pub content: String,

    #[schemars(
        description = "Extra package names to check, added to the configured affected list."
    )]
    #[serde(default)]
    /// Extra affected package names.
    pub affected: Vec<String>,
}

/// MCP transport adapter for the shared scan service.
#[derive(Clone)]
pub struct AffectedPkgsServer {
    tool_router: ToolRouter<Self>,
    service: Arc<ScanService>,
}

#[tool_router]
impl AffectedPkgsServer {
    /// Creates a server using the default runtime service.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying service fails to initialize.
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self::with_service(ScanService::new()?))
    }

    #[cfg(test)]
    /// Creates a test server using a test-configured runtime service.
    pub fn with_config(config: crate::config::AffectedPkgsConfig) -> Self {
        Self::with_service(ScanService::with_config(config))
    }

    fn with_service(service: ScanService) -> Self {
        Self {
            tool_router: Self::tool_router(),
            service: Arc::new(service),
        }
    }

    #[tool(
        name = "scan_lockfile",
        description = "Scan a package-lock.json or yarn.lock file on disk for packages on the affected list. Returns matched packages with their resolved versions and the number of distinct packages scanned. If `clean` is false, report the matches."
    )]
    async fn scan_lockfile(
        &self,
        Parameters(query): Parameters<LockfilePathQuery>,
    ) -> Result<CallToolResult, McpError> {
        validate_path_query(&query)?;

        let service = Arc::clone(&self.service);
        let report = run_scan(move || {
            let extra = AffectedNameSet::from_iter(&query.affected);
            service.scan_path(&query.path, &extra, "scan_lockfile")
        })
        .await?;

        let json = serde_json::to_string_pretty(&report).map_err(mcp_internal_error)?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(
        name = "scan_lockfile_content",
        description = "Scan lockfile text for packages on the affected list. Pass the exact lockfile name (package-lock.json or yarn.lock) and its full content. Returns matched packages with their resolved versions and the number of distinct packages scanned."
    )]
    async fn scan_lockfile_content(
        &self,
        Parameters(query): Parameters<LockfileContentQuery>,
    ) -> Result<CallToolResult, McpError> {
        validate_content_query(&query)?;

        let service = Arc::clone(&self.service);
        let report = run_scan(move || {
            let extra = AffectedNameSet::from_iter(&query.affected);
            service.scan_content(
                &query.file_name,
                &query.content,
                &extra,
                "scan_lockfile_content",
            )
        })
        .await?;

        let json = serde_json::to_string_pretty(&report).map_err(mcp_internal_error)?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }
}

#[tool_handler]
impl ServerHandler for AffectedPkgsServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Affected package scan: call `scan_lockfile` with a path to package-lock.json or yarn.lock, or `scan_lockfile_content` with the file name and text. Each result lists affected packages found (`found`) and the distinct package count (`scannedCount`). Report every match; `clean=true` means nothing on the affected list is installed.".into(),
            ),
        }
    }
}

/// Runs file reads, parsing and audit writes on the blocking pool.
async fn run_scan<F>(scan: F) -> Result<ScanReport, McpError>
where
    F: FnOnce() -> anyhow::Result<ScanReport> + Send + 'static,
{
    tokio::task::spawn_blocking(scan)
        .await
        .map_err(mcp_internal_error)?
        .map_err(mcp_scan_error)
}

fn mcp_internal_error(error: impl ToString) -> McpError {
    McpError::internal_error(error.to_string(), None)
}

/// Lockfile failures are caller-correctable; everything else is internal.
fn mcp_scan_error(error: anyhow::Error) -> McpError {
    match error.downcast_ref::<LockfileError>() {
        Some(lockfile_error) => McpError::invalid_params(
            lockfile_error.to_string(),
            Some(serde_json::json!({ "kind": lockfile_error.kind() })),
        ),
        None => mcp_internal_error(format!("{error:#}")),
    }
}

fn validate_path_query(query: &LockfilePathQuery) -> Result<(), McpError> {
    if query.path.trim().is_empty() {
        return Err(McpError::invalid_params("path must not be empty", None));
    }
    Ok(())
}

fn validate_content_query(query: &LockfileContentQuery) -> Result<(), McpError> {
    if query.file_name.trim().is_empty() {
        return Err(McpError::invalid_params(
            "file_name must not be empty",
            None,
        ));
    }
    Ok(())
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
