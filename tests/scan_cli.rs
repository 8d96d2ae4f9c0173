use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

fn unique_temp_dir(label: &str) -> PathBuf {
    let unique = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("affected-pkgs-cli-{label}-{unique}"));
    fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

/// Runs the binary with config and audit paths confined to `work_dir`.
fn run_cli(work_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_affected-pkgs"))
        .args(args)
        .env("AFFECTED_PKGS_CONFIG_GLOBAL_PATH", work_dir.join("global.toml"))
        .env(
            "AFFECTED_PKGS_CONFIG_PROJECT_PATH",
            work_dir.join("project.toml"),
        )
        .env("AFFECTED_PKGS_AUDIT_LOG_PATH", work_dir.join("audit.log"))
        .output()
        .expect("failed to run affected-pkgs")
}

fn stdout_json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("report json on stdout")
}

const YARN_LOCK: &str = r#"# yarn lockfile v1

"@ctrl/tinycolor@^4.1.0":
  version "4.1.1"

lodash@^4.17.0, lodash@^4.17.21:
  version "4.17.21"
"#;

#[test]
fn formats_lists_accepted_file_names() {
    let work_dir = unique_temp_dir("formats");
    let output = run_cli(&work_dir, &["formats"]);

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("utf8 stdout");
    assert_eq!(
        stdout.lines().collect::<Vec<_>>(),
        vec!["package-lock.json", "yarn.lock"]
    );

    let _ = fs::remove_dir_all(work_dir);
}

#[test]
fn scan_prints_report_and_writes_audit_line() {
    let work_dir = unique_temp_dir("scan");
    let lockfile = work_dir.join("yarn.lock");
    fs::write(&lockfile, YARN_LOCK).expect("write yarn.lock");

    let output = run_cli(
        &work_dir,
        &["scan", lockfile.to_str().unwrap(), "--affected", "@ctrl/tinycolor"],
    );

    assert!(output.status.success());
    let report = stdout_json(&output);
    assert_eq!(report["fileName"], "yarn.lock");
    assert_eq!(report["scannedCount"], 2);
    assert_eq!(report["affectedCount"], 1);
    assert_eq!(report["found"][0]["name"], "@ctrl/tinycolor");
    assert_eq!(report["found"][0]["version"], "4.1.1");

    let audit = fs::read_to_string(work_dir.join("audit.log")).expect("audit log");
    assert_eq!(audit.lines().count(), 1);
    let record: serde_json::Value = serde_json::from_str(audit.trim()).unwrap();
    assert_eq!(record["context"], "cli_scan");
    assert_eq!(record["format"], "yarn-lock");

    let _ = fs::remove_dir_all(work_dir);
}

#[test]
fn scan_reads_affected_names_from_config_and_list_files() {
    let work_dir = unique_temp_dir("config");
    fs::write(work_dir.join("names.txt"), "lodash\n").expect("write name list");
    fs::write(
        work_dir.join("project.toml"),
        "[affected]\nlists = [\"names.txt\"]\n\n[audit]\nenabled = false\n",
    )
    .expect("write project config");
    let lockfile = work_dir.join("yarn.lock");
    fs::write(&lockfile, YARN_LOCK).expect("write yarn.lock");

    let output = run_cli(&work_dir, &["scan", lockfile.to_str().unwrap()]);

    assert!(output.status.success());
    let report = stdout_json(&output);
    assert_eq!(report["found"][0]["name"], "lodash");
    assert!(!work_dir.join("audit.log").exists());

    let _ = fs::remove_dir_all(work_dir);
}

#[test]
fn fail_on_match_exits_with_status_two() {
    let work_dir = unique_temp_dir("fail-on-match");
    let lockfile = work_dir.join("yarn.lock");
    fs::write(&lockfile, YARN_LOCK).expect("write yarn.lock");
    let path = lockfile.to_str().unwrap();

    let matched = run_cli(
        &work_dir,
        &["scan", path, "--affected", "lodash", "--fail-on-match"],
    );
    assert_eq!(matched.status.code(), Some(2));
    assert_eq!(stdout_json(&matched)["clean"], false);

    let clean = run_cli(
        &work_dir,
        &["scan", path, "--affected", "left-pad", "--fail-on-match"],
    );
    assert!(clean.status.success());
    assert_eq!(stdout_json(&clean)["clean"], true);

    let _ = fs::remove_dir_all(work_dir);
}

#[test]
fn scan_rejects_unsupported_file_name() {
    let work_dir = unique_temp_dir("unsupported");
    let lockfile = work_dir.join("pnpm-lock.yaml");
    fs::write(&lockfile, "lockfileVersion: '9.0'\n").expect("write pnpm lock");

    let output = run_cli(&work_dir, &["scan", lockfile.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains(
        "Unsupported file 'pnpm-lock.yaml'. Please select a package-lock.json or yarn.lock file."
    ));

    let _ = fs::remove_dir_all(work_dir);
}

#[test]
fn scan_reports_empty_yarn_lock() {
    let work_dir = unique_temp_dir("empty-yarn");
    let lockfile = work_dir.join("yarn.lock");
    fs::write(&lockfile, "# yarn lockfile v1\n").expect("write yarn.lock");

    let output = run_cli(&work_dir, &["scan", lockfile.to_str().unwrap()]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Could not find any packages. Is this a valid yarn.lock file?"));

    let _ = fs::remove_dir_all(work_dir);
}
