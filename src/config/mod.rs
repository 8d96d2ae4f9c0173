//! Configuration loading and merge logic for `affected-pkgs`.
//!
//! Global config and project-local config are merged with project values taking precedence.

mod overlay;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use affected_pkgs_core::{AffectedNameSet, ParserOptions};
use anyhow::Context;
use serde::{Deserialize, Serialize};

use self::overlay::ConfigOverlay;

/// Top-level runtime configuration for lockfile scans.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AffectedPkgsConfig {
    /// Watch list the lockfile is checked against.
    pub affected: AffectedConfig,
    /// Parser behavior toggles.
    pub lockfile: LockfileConfig,
    /// Scan audit log settings.
    pub audit: AuditConfig,
}

/// Affected package sources.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AffectedConfig {
    /// Package names listed inline.
    pub packages: Vec<String>,
    /// Files holding one package name per line.
    pub lists: Vec<PathBuf>,
}

/// Parser behavior toggles.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LockfileConfig {
    /// Read lockfileVersion 1 `dependencies` trees when `packages` is absent.
    pub legacy_dependencies: bool,
}

/// Scan audit log settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuditConfig {
    pub enabled: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl AffectedPkgsConfig {
    /// Loads and merges global + project configuration from default paths.
    ///
    /// # Errors
    ///
    /// Returns an error if any discovered config file cannot be read or parsed.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_with_paths(global_config_path(), project_config_path())
    }

    #[cfg(test)]
    fn load_from_path(path: &Path) -> anyhow::Result<Self> {
        Self::load_with_paths(Some(path.to_path_buf()), None)
    }

    fn load_with_paths(global: Option<PathBuf>, project: Option<PathBuf>) -> anyhow::Result<Self> {
        let mut config = Self::default();
        if let Some(path) = global {
            config.merge_from_path(&path)?;
        }
        if let Some(path) = project {
            config.merge_from_path(&path)?;
        }
        Ok(config)
    }

    fn merge_from_path(&mut self, path: &Path) -> anyhow::Result<()> {
        if !path.exists() {
            return Ok(());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file at {}", path.display()))?;
        let overlay: ConfigOverlay = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file at {}", path.display()))?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        self.apply_overlay(overlay, base_dir);
        Ok(())
    }

    fn apply_overlay(&mut self, overlay: ConfigOverlay, base_dir: &Path) {
        if let Some(value) = overlay.affected {
            append_unique(&mut self.affected.packages, value.packages.unwrap_or_default());
            let lists = value
                .lists
                .unwrap_or_default()
                .into_iter()
                .map(|list| resolve_relative(base_dir, list))
                .collect();
            append_unique(&mut self.affected.lists, lists);
        }
        if let Some(value) = overlay.lockfile
            && let Some(legacy) = value.legacy_dependencies
        {
            self.lockfile.legacy_dependencies = legacy;
        }
        if let Some(value) = overlay.audit
            && let Some(enabled) = value.enabled
        {
            self.audit.enabled = enabled;
        }
    }

    /// Parser options derived from the `[lockfile]` table.
    pub fn parser_options(&self) -> ParserOptions {
        ParserOptions {
            legacy_dependencies: self.lockfile.legacy_dependencies,
        }
    }

    /// Collects inline names and every configured list file into one set.
    ///
    /// # Errors
    ///
    /// Returns an error if a list file cannot be read.
    pub fn affected_names(&self) -> anyhow::Result<AffectedNameSet> {
        let mut names = AffectedNameSet::from_iter(&self.affected.packages);
        for list in &self.affected.lists {
            names.extend(read_name_list(list)?.iter());
        }
        Ok(names)
    }
}

/// Reads a file holding one package name per line.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn read_name_list(path: &Path) -> anyhow::Result<AffectedNameSet> {
    let raw = fs::read_to_string(path).with_context(|| {
        format!(
            "failed to read affected package list at {}",
            path.display()
        )
    })?;
    Ok(AffectedNameSet::from_lines(&raw))
}

fn global_config_path() -> Option<PathBuf> {
    if let Some(explicit) = env::var_os("AFFECTED_PKGS_CONFIG_GLOBAL_PATH") {
        return Some(PathBuf::from(explicit));
    }

    let home = env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .map(PathBuf::from)?;

    Some(home.join(".config").join("affected-pkgs").join("config.toml"))
}

fn project_config_path() -> Option<PathBuf> {
    if let Some(explicit) = env::var_os("AFFECTED_PKGS_CONFIG_PROJECT_PATH") {
        return Some(PathBuf::from(explicit));
    }

    let cwd = env::current_dir().ok()?;
    Some(cwd.join(".affected-pkgs.toml"))
}

fn resolve_relative(base_dir: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base_dir.join(path)
    }
}

fn append_unique<T: PartialEq>(target: &mut Vec<T>, values: Vec<T>) {
    for value in values {
        if !target.iter().any(|existing| existing == &value) {
            target.push(value);
        }
    }
}

#[cfg(test)]
#[path = "../tests/config.rs"]
mod tests;
