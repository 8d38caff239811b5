//! Binary-level tests of the command line surface

use assert_cmd::Command;
use tempfile::TempDir;

fn bin() -> Command {
    Command::cargo_bin("tick-data-downloader").unwrap()
}

#[test]
fn test_help_lists_date_flags() {
    let output = bin().arg("--help").output().unwrap();
    assert!(output.status.success());
    let help = String::from_utf8_lossy(&output.stdout);
    assert!(help.contains("--start"));
    assert!(help.contains("--end"));
    assert!(help.contains("--config"));
}

#[test]
fn test_missing_dates_is_usage_error() {
    bin().assert().failure();
}

#[test]
fn test_missing_config_fails() {
    let temp_dir = TempDir::new().unwrap();
    let output = bin()
        .current_dir(temp_dir.path())
        .args(["--start", "20240101", "--end", "20240105", "--no-progress"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Command failed"));
}

#[test]
fn test_invalid_workers_rejected() {
    bin()
        .args(["--start", "20240101", "--end", "20240105", "--workers", "0"])
        .assert()
        .failure();
}

#[test]
fn test_inverted_range_fails_before_network() {
    let temp_dir = TempDir::new().unwrap();
    let config = temp_dir.path().join("main.toml");
    std::fs::write(
        &config,
        r#"
[request]
url = "http://127.0.0.1:9/kline"
instrument = "US10YR.OTC"

[output]
path = "out.csv"
"#,
    )
    .unwrap();

    let output = bin()
        .current_dir(temp_dir.path())
        .args(["--start", "20240105", "--end", "20240101", "--no-progress"])
        .arg("--config")
        .arg(&config)
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(!temp_dir.path().join("out.csv").exists());
}
