//! CLI entrypoint for serving MCP tools and running lockfile scans.

mod audit_log;
mod config;
mod lockfiles;
mod mcp;
mod service;
mod types;

use std::path::PathBuf;

use affected_pkgs_core::{AffectedNameSet, LockfileDefinition};
use clap::{Parser, Subcommand};
use mcp::AffectedPkgsServer;
use rmcp::ServiceExt;
use service::ScanService;

/// Exit status for a successful scan that found affected packages.
const MATCH_EXIT_CODE: i32 = 2;

#[cfg(windows)]
fn hide_console_window() {
    #[link(name = "kernel32")]
    unsafe extern "system" {
        fn GetConsoleWindow() -> *mut core::ffi::c_void;
    }

    #[link(name = "user32")]
    unsafe extern "system" {
        fn ShowWindow(window: *mut core::ffi::c_void, show_cmd: i32) -> i32;
    }

    const SW_HIDE: i32 = 0;
    unsafe {
        let window = GetConsoleWindow();
        if !window.is_null() {
            let _ = ShowWindow(window, SW_HIDE);
        }
    }
}

#[cfg(not(windows))]
fn hide_console_window() {}

#[derive(Parser)]
#[command(
    name = "affected-pkgs",
    version,
    about = "Find affected npm packages in package-lock.json and yarn.lock files"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the MCP server
    #[cfg_attr(windows, command(hide = true))]
    Serve {
        /// Run as MCP server over stdio
        #[arg(long)]
        mcp: bool,
    },
    /// Scan one lockfile against the affected package list
    Scan {
        /// Path to a package-lock.json or yarn.lock file
        path: String,
        /// Extra affected package name (repeatable)
        #[arg(long = "affected", value_name = "NAME")]
        affected: Vec<String>,
        /// File with one affected package name per line (repeatable)
        #[arg(long = "affected-file", value_name = "FILE")]
        affected_files: Vec<PathBuf>,
        /// Exit with status 2 when any affected package is found
        #[arg(long)]
        fail_on_match: bool,
    },
    /// Print accepted lockfile names
    Formats,
}

/// Returns lockfile definitions wired into this application build.
pub(crate) fn app_lockfile_definitions() -> Vec<LockfileDefinition> {
    vec![
        affected_pkgs_npm::lockfile_definition(),
        affected_pkgs_yarn::lockfile_definition(),
    ]
}

fn init_tracing(max_level: tracing::Level) {
    // stdout carries reports and the MCP transport
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_max_level(max_level)
        .init();
}

fn collect_extra_names(
    names: &[String],
    files: &[PathBuf],
) -> anyhow::Result<AffectedNameSet> {
    let mut extra = AffectedNameSet::from_iter(names);
    for file in files {
        extra.extend(config::read_name_list(file)?.iter());
    }
    Ok(extra)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { mcp } => {
            if !mcp {
                anyhow::bail!("Only --mcp mode is currently supported");
            }

            hide_console_window();
            init_tracing(tracing::Level::INFO);

            tracing::info!("affected-pkgs MCP server starting");

            let server = AffectedPkgsServer::new()?;
            let service = server.serve(rmcp::transport::stdio()).await?;
            service.waiting().await?;
        }
        Commands::Scan {
            path,
            affected,
            affected_files,
            fail_on_match,
        } => {
            init_tracing(tracing::Level::WARN);

            let extra = collect_extra_names(&affected, &affected_files)?;
            let service = ScanService::new()?;
            let report = service.scan_path(&path, &extra, "cli_scan")?;
            let json = serde_json::to_string_pretty(&report)?;
            println!("{json}");

            if fail_on_match && !report.clean {
                std::process::exit(MATCH_EXIT_CODE);
            }
        }
        Commands::Formats => {
            for name in lockfiles::supported_file_names() {
                println!("{name}");
            }
        }
    }

    Ok(())
}
