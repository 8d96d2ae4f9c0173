use serde::{Deserialize, Serialize};

use affected_pkgs_core::{AffectedPackage, LockfileFormat};

/// Report returned by the CLI and MCP surfaces for one scanned lockfile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub file_name: String,
    pub format: LockfileFormat,
    /// `true` when no affected package was found.
    pub clean: bool,
    pub found: Vec<AffectedPackage>,
    pub scanned_count: usize,
    /// Number of distinct names the lockfile was checked against.
    pub affected_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}
