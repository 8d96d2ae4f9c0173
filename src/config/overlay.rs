use std::path::PathBuf;

use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct ConfigOverlay {
    pub affected: Option<AffectedOverlay>,
    pub lockfile: Option<LockfileOverlay>,
    pub audit: Option<AuditOverlay>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub(super) struct AffectedOverlay {
    pub packages: Option<Vec<String>>,
    pub lists: Option<Vec<PathBuf>>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub(super) struct LockfileOverlay {
    pub legacy_dependencies: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub(super) struct AuditOverlay {
    pub enabled: Option<bool>,
}
