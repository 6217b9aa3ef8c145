use logan_harness::config::load_config;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn logan_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("logan");
    path
}

fn setup_test_env(extra: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let config_dir = tmp.path().join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[backend]
region = "us-phoenix-1"
namespace = "testns"
compartment_id = "ocid1.compartment.oc1..test"
timeout_secs = 5

[query]
default_time_period_minutes = 60
available_sources = ["OCI Audit Logs", "OCI VCN Flow Unified Schema Logs"]

[server]
bind = "127.0.0.1:7399"
{}"#,
        extra
    );

    let config_path = config_dir.join("logan.toml");
    fs::write(&config_path, config_content).unwrap();
    (tmp, config_path)
}

fn run_logan(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = logan_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("LOGAN_COMPARTMENT_ID")
        .env_remove("LOGAN_NAMESPACE")
        .env_remove("LOGAN_REGION")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run logan binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_load_config_from_file() {
    let (_tmp, config_path) = setup_test_env("");
    let cfg = load_config(&config_path).unwrap();
    assert_eq!(cfg.backend.region, "us-phoenix-1");
    assert_eq!(cfg.backend.namespace, "testns");
    assert_eq!(cfg.query.default_time_period_minutes, 60);
    assert_eq!(cfg.query.default_max_rows, 50);
    assert_eq!(cfg.query.available_sources.len(), 2);
    assert_eq!(cfg.server.bind, "127.0.0.1:7399");
}

#[test]
fn test_load_config_rejects_bad_bounds() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("logan.toml");
    fs::write(
        &path,
        r#"[backend]
compartment_id = "c"

[query]
min_time_period_minutes = 10
default_time_period_minutes = 5
"#,
    )
    .unwrap();
    let err = load_config(&path).unwrap_err();
    assert!(err.to_string().contains("default_time_period_minutes"));
}

#[test]
fn test_load_config_missing_file() {
    let tmp = TempDir::new().unwrap();
    let err = load_config(&tmp.path().join("nope.toml")).unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}

#[test]
fn test_load_config_invalid_toml() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("logan.toml");
    fs::write(&path, "[backend\ncompartment_id = ").unwrap();
    let err = load_config(&path).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config file"));
}

#[test]
fn test_validate_prints_normalization() {
    let (_tmp, config_path) = setup_test_env("");
    let (stdout, stderr, success) = run_logan(
        &config_path,
        &["validate", "* | stats count(*)", "--minutes", "60"],
    );
    assert!(success, "validate failed: stdout={}, stderr={}", stdout, stderr);

    let result: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(result["success"], true);
    assert_eq!(
        result["final_query"],
        "* | where Time > dateRelative(1h) | stats count"
    );
    assert_eq!(result["was_modified"], true);
}

#[test]
fn test_validate_preserves_waf_query() {
    let (_tmp, config_path) = setup_test_env("");
    let q = "'Log Source' = 'OCI WAF Logs' | stats count by 'Host IP Address (Client)'";
    let (stdout, _, success) = run_logan(&config_path, &["validate", q]);
    assert!(success);

    let result: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(result["final_query"], q);
    assert_eq!(result["preserved"], true);
    assert_eq!(result["was_modified"], false);
}

#[test]
fn test_validate_rejects_out_of_range_minutes() {
    let (_tmp, config_path) = setup_test_env("");
    let (_, stderr, success) = run_logan(&config_path, &["validate", "*", "--minutes", "50000"]);
    assert!(!success);
    assert!(stderr.contains("time_period_minutes must be between"));
}

#[test]
fn test_validate_works_without_config_file() {
    let tmp = TempDir::new().unwrap();
    let (stdout, _, success) = run_logan(
        &tmp.path().join("missing.toml"),
        &["validate", "* | top 10 Count"],
    );
    assert!(success);
    let result: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(result["final_query"], "* | sort -Count | head 10");
}

#[test]
fn test_catalog_list_and_show() {
    let (_tmp, config_path) = setup_test_env("");

    let (stdout, _, success) = run_logan(&config_path, &["catalog", "list"]);
    assert!(success);
    let families: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(families.as_array().unwrap().len(), 10);

    let (stdout, _, success) = run_logan(&config_path, &["catalog", "show", "port_scanning"]);
    assert!(success);
    let rendered: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(rendered["type"], "port_scanning");
    // Config default of 60 minutes applies.
    assert!(rendered["queries"][0]
        .as_str()
        .unwrap()
        .starts_with("timefilter(1h) | "));
}

#[test]
fn test_catalog_unknown_type_fails() {
    let (_tmp, config_path) = setup_test_env("");
    let (_, stderr, success) = run_logan(&config_path, &["catalog", "show", "nope"]);
    assert!(!success);
    assert!(stderr.contains("Unknown query type"));
}

#[test]
fn test_catalog_build() {
    let (_tmp, config_path) = setup_test_env("");
    let (stdout, stderr, success) = run_logan(
        &config_path,
        &[
            "catalog", "build", "--term", "denied", "--source", "OCI Audit Logs", "--minutes",
            "1440",
        ],
    );
    assert!(success, "build failed: {}", stderr);
    let built: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(
        built["query"],
        r#"timefilter(1d) | * | where contains("Log Entry", "denied") or contains("Message", "denied") | where "Log Source" = "OCI Audit Logs""#
    );
}

#[test]
fn test_search_requires_compartment() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("logan.toml");
    fs::write(&path, "[backend]\nnamespace = \"ns\"\n").unwrap();
    let (_, stderr, success) = run_logan(&path, &["search", "* | head 1"]);
    assert!(!success);
    assert!(stderr.contains("compartment_id"));
}
