#![cfg_attr(windows, windows_subsystem = "windows")]
//! MCP client entrypoint for the lockfile scanner.
//!
//! Starts the sibling `affected-pkgs` executable in `serve --mcp` mode so MCP
//! clients can launch the scanner without a console window. Any other
//! arguments go to the scanner unchanged, and its exit status is passed
//! through (2 when `scan --fail-on-match` found affected packages).

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::Context;

#[cfg(windows)]
use std::os::windows::process::CommandExt;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Exit status when the scanner was terminated without one.
const SCANNER_KILLED_EXIT_CODE: i32 = 1;

fn main() -> anyhow::Result<()> {
    let scanner = resolve_scanner_binary();
    let args = scanner_args(std::env::args().skip(1).collect());

    let mut command = Command::new(&scanner);
    command
        .args(&args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());

    #[cfg(windows)]
    {
        command.creation_flags(CREATE_NO_WINDOW);
    }

    let status = command
        .status()
        .with_context(|| launch_failure_message(&scanner))?;
    std::process::exit(status.code().unwrap_or(SCANNER_KILLED_EXIT_CODE));
}

/// No arguments means an MCP client is launching the stdio server.
fn scanner_args(args: Vec<String>) -> Vec<String> {
    if args.is_empty() {
        vec!["serve".to_string(), "--mcp".to_string()]
    } else {
        args
    }
}

/// Prefers the scanner installed next to this launcher, then falls back to `PATH`.
fn resolve_scanner_binary() -> PathBuf {
    let current = std::env::current_exe().unwrap_or_else(|_| PathBuf::from("."));
    let sibling = current.with_file_name(scanner_binary_name());
    if sibling.exists() {
        return sibling;
    }
    PathBuf::from(scanner_binary_name())
}

fn launch_failure_message(scanner: &Path) -> String {
    format!(
        "failed to start the affected-pkgs lockfile scanner at {}; install `{}` next to this launcher or on PATH",
        scanner.display(),
        scanner_binary_name()
    )
}

#[cfg(windows)]
fn scanner_binary_name() -> &'static str {
    "affected-pkgs.exe"
}

#[cfg(not(windows))]
fn scanner_binary_name() -> &'static str {
    "affected-pkgs"
}
