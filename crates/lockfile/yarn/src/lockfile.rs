use affected_pkgs_core::{
    LockfileError, LockfileFormat, LockfileParser, PackageVersionMap, ParsedLockfile,
};

const METADATA_HEADER: &str = "__metadata:";
const VERSION_KEY: &str = "version";

#[derive(Debug, Clone, Default)]
pub struct YarnLockfileParser;

impl YarnLockfileParser {
    pub fn new() -> Self {
        Self
    }
}

impl LockfileParser for YarnLockfileParser {
    fn format(&self) -> LockfileFormat {
        LockfileFormat::YarnLock
    }

    fn parse(&self, content: &str) -> Result<ParsedLockfile, LockfileError> {
        parse_yarn_lock(content)
    }
}

/// Accumulator threaded through the line scan.
#[derive(Debug, Default)]
struct ScanState {
    /// Names declared by the current block header, waiting for its version line.
    pending: Vec<String>,
    packages: PackageVersionMap,
    unresolved_blocks: usize,
}

impl ScanState {
    fn replace_pending(&mut self, names: Vec<String>) {
        if !self.pending.is_empty() {
            self.unresolved_blocks += 1;
        }
        self.pending = names;
    }

    fn resolve_pending(&mut self, version: &str) {
        for name in self.pending.drain(..) {
            self.packages.insert_first(name, version);
        }
    }
}

fn parse_yarn_lock(raw: &str) -> Result<ParsedLockfile, LockfileError> {
    let mut state = raw.lines().fold(ScanState::default(), scan_line);
    state.replace_pending(Vec::new());

    if state.packages.is_empty() {
        return Err(LockfileError::EmptyResult);
    }

    Ok(ParsedLockfile {
        format: LockfileFormat::YarnLock,
        packages: state.packages,
        diagnostic: unresolved_block_diagnostic(state.unresolved_blocks),
    })
}

fn scan_line(mut state: ScanState, line: &str) -> ScanState {
    if line.starts_with(METADATA_HEADER) {
        state.replace_pending(Vec::new());
        return state;
    }

    if !line.is_empty() && !line.starts_with(' ') && !line.starts_with('#') {
        if let Some(header) = line.trim().strip_suffix(':') {
            state.replace_pending(parse_block_header(header));
        }
        return state;
    }

    let trimmed = line.trim();
    if trimmed.starts_with(VERSION_KEY)
        && !state.pending.is_empty()
        && let Some(version) = parse_version_value(trimmed)
    {
        state.resolve_pending(&version);
    }

    state
}

/// Splits `"a@^1.0.0", "a@^1.2.0", b@2` into package names, in order.
fn parse_block_header(header: &str) -> Vec<String> {
    header
        .split(',')
        .map(package_name_from_specifier)
        .filter(|name| !name.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

fn package_name_from_specifier(raw: &str) -> &str {
    let trimmed = raw.trim();
    let unquoted = trimmed.strip_prefix('"').unwrap_or(trimmed);
    let unquoted = unquoted.strip_suffix('"').unwrap_or(unquoted);

    // Index 0 is the scope marker of names like `@babel/core`.
    match unquoted.rfind('@') {
        Some(idx) if idx > 0 => &unquoted[..idx],
        _ => unquoted,
    }
}

/// Handles both `version "1.2.3"` and `version: 1.2.3`.
fn parse_version_value(trimmed_line: &str) -> Option<String> {
    let (_, value) = trimmed_line.split_once(' ')?;
    Some(value.replace('"', "").trim().to_string())
}

fn unresolved_block_diagnostic(count: usize) -> Option<String> {
    match count {
        0 => None,
        1 => Some("1 lockfile block had no version line".to_string()),
        n => Some(format!("{n} lockfile blocks had no version line")),
    }
}
