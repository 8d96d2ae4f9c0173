use indexmap::IndexMap;
use indexmap::map::Entry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;

pub type ParserFactory = fn(&ParserOptions) -> Arc<dyn LockfileParser>;

pub const MISSING_PACKAGES_MESSAGE: &str =
    "Invalid package-lock.json format: 'packages' property is missing.";

/// Lockfile formats recognized by exact file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LockfileFormat {
    PackageLock,
    YarnLock,
}

impl LockfileFormat {
    pub const ALL: [Self; 2] = [Self::PackageLock, Self::YarnLock];

    pub fn file_name(self) -> &'static str {
        match self {
            Self::PackageLock => "package-lock.json",
            Self::YarnLock => "yarn.lock",
        }
    }

    /// Matches the file name exactly; no extension or content sniffing.
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|format| format.file_name() == file_name)
    }
}

/// Insertion-ordered `name -> version` mapping where the first definition of a name wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PackageVersionMap {
    entries: IndexMap<String, String>,
}

impl PackageVersionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `name` at `version` unless the name was already seen.
    ///
    /// Returns `true` when the entry was inserted.
    pub fn insert_first(&mut self, name: impl Into<String>, version: impl Into<String>) -> bool {
        match self.entries.entry(name.into()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(version.into());
                true
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, version)| (name.as_str(), version.as_str()))
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for PackageVersionMap {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (name, version) in iter {
            map.insert_first(name, version);
        }
        map
    }
}

/// Package names a lockfile is checked against.
///
/// Entries are trimmed and blank entries dropped; duplicates collapse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AffectedNameSet {
    names: BTreeSet<String>,
}

impl AffectedNameSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from free-form text holding one package name per line.
    pub fn from_lines(raw: &str) -> Self {
        raw.lines().collect()
    }

    pub fn insert(&mut self, name: &str) -> bool {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return false;
        }
        self.names.insert(trimmed.to_string())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

impl<S: AsRef<str>> FromIterator<S> for AffectedNameSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl<S: AsRef<str>> Extend<S> for AffectedNameSet {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        for name in iter {
            self.insert(name.as_ref());
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffectedPackage {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub found: Vec<AffectedPackage>,
    pub scanned_count: usize,
}

/// Output of a single lockfile parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLockfile {
    pub format: LockfileFormat,
    pub packages: PackageVersionMap,
    /// Non-fatal note about entries the parser could not fully use.
    pub diagnostic: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParserOptions {
    /// Accept lockfileVersion 1 documents that only carry a nested `dependencies` tree.
    pub legacy_dependencies: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockfileErrorKind {
    UnsupportedFormat,
    MalformedInput,
    InvalidSchema,
    EmptyResult,
    ReadFailure,
    Unexpected,
}

impl LockfileErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnsupportedFormat => "unsupported_format",
            Self::MalformedInput => "malformed_input",
            Self::InvalidSchema => "invalid_schema",
            Self::EmptyResult => "empty_result",
            Self::ReadFailure => "read_failure",
            Self::Unexpected => "unexpected",
        }
    }
}

/// Failures surfaced by lockfile analysis. `Display` is the user-facing message.
#[derive(Debug, Error)]
pub enum LockfileError {
    #[error("Unsupported file '{file_name}'. Please select a {expected} file.")]
    UnsupportedFormat { file_name: String, expected: String },
    #[error("Failed to parse file. Please ensure it's a valid JSON file.")]
    MalformedInput { detail: String },
    #[error("{message}")]
    InvalidSchema { message: String },
    #[error("Could not find any packages. Is this a valid yarn.lock file?")]
    EmptyResult,
    #[error("Error reading the file.")]
    ReadFailure {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("An unknown error occurred during analysis.")]
    Unexpected { detail: String },
}

impl LockfileError {
    pub fn kind(&self) -> LockfileErrorKind {
        match self {
            Self::UnsupportedFormat { .. } => LockfileErrorKind::UnsupportedFormat,
            Self::MalformedInput { .. } => LockfileErrorKind::MalformedInput,
            Self::InvalidSchema { .. } => LockfileErrorKind::InvalidSchema,
            Self::EmptyResult => LockfileErrorKind::EmptyResult,
            Self::ReadFailure { .. } => LockfileErrorKind::ReadFailure,
            Self::Unexpected { .. } => LockfileErrorKind::Unexpected,
        }
    }

    pub fn missing_packages() -> Self {
        Self::InvalidSchema {
            message: MISSING_PACKAGES_MESSAGE.to_string(),
        }
    }
}

pub trait LockfileParser: Send + Sync {
    fn format(&self) -> LockfileFormat;
    fn parse(&self, content: &str) -> Result<ParsedLockfile, LockfileError>;
}

#[derive(Clone, Copy)]
pub struct LockfileDefinition {
    pub format: LockfileFormat,
    pub create_parser: ParserFactory,
}

/// Intersects a parsed package map with the affected names.
///
/// Matches keep the map's iteration order; `scanned_count` is the map size
/// whether or not anything matched.
pub fn match_affected(packages: &PackageVersionMap, affected: &AffectedNameSet) -> AnalysisResult {
    let found = packages
        .iter()
        .filter(|(name, _)| affected.contains(name))
        .map(|(name, version)| AffectedPackage {
            name: name.to_string(),
            version: version.to_string(),
        })
        .collect();

    AnalysisResult {
        found,
        scanned_count: packages.len(),
    }
}
