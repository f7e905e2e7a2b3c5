//! End-to-end runs of the `revops-report` binary against a fake query tool.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures").join(name)
}

/// Write a config whose query tool is `sh -c <script>`
fn write_config(dir: &Path, script: &str, timeout_seconds: u64) -> PathBuf {
    let path = dir.join("revops.yml");
    let yaml = format!(
        "query:\n  command: sh\n  args: ['-c', {script:?}]\n  timeout_seconds: {timeout_seconds}\n  payload_column: report_json\nreports:\n  output_dir: {out:?}\n",
        script = script,
        timeout_seconds = timeout_seconds,
        out = dir.join("out").display().to_string(),
    );
    std::fs::write(&path, yaml).unwrap();
    path
}

fn write_query(dir: &Path, sql: &str) -> PathBuf {
    write_named_query(dir, "risk.sql", sql)
}

fn write_named_query(dir: &Path, name: &str, sql: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, sql).unwrap();
    path
}

fn files_starting_with(dir: &Path, prefix: &str) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(prefix))
        })
        .collect();
    found.sort();
    found
}

fn run(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_revops-report"))
        .args(args)
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .env_remove("REVOPS_QUERY_COMMAND")
        .env_remove("REVOPS_QUERY_TIMEOUT_SECONDS")
        .env_remove("REVOPS_OUTPUT_DIR")
        .env_remove("REVOPS_REPORT_VERSION")
        .output()
        .expect("failed to launch revops-report")
}

fn risk(dir: &Path, config: &Path, query: &Path, extra: &[&str]) -> Output {
    let config = config.to_str().unwrap();
    let query = query.to_str().unwrap();
    let mut args = vec!["--config", config, "risk", "--query", query];
    args.extend_from_slice(extra);
    run(dir, &args)
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_risk_report_renders_html() {
    let dir = TempDir::new().unwrap();
    let script = format!("cat '{}'", fixture("risk_payload.json").display());
    let config = write_config(dir.path(), &script, 30);
    let query = write_query(dir.path(), "SELECT report_json FROM risk WHERE as_of = '{{as_of_date}}'");

    let output = risk(dir.path(), &config, &query, &["--as-of-date", "2026-02-10"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let path = dir.path().join("out").join("Risk_Report_2026-02-10.html");
    let html = std::fs::read_to_string(&path).unwrap();
    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(html.contains("Revenue Risk Analysis Report"));
    assert!(html.contains("CPA &lt;$200 target &amp; rising"));
    assert!(!html.contains("CPA <$200"));

    let summary = stdout(&output);
    assert!(summary.contains("Risk report generated"));
    assert!(summary.contains("2026-02-10"));
    assert!(summary.contains("90.0%"));
}

#[test]
fn test_risk_report_json_writes_decoded_payload() {
    let dir = TempDir::new().unwrap();
    let script = format!("cat '{}'", fixture("risk_payload.json").display());
    let config = write_config(dir.path(), &script, 30);
    let query = write_query(dir.path(), "SELECT 1");

    let output = risk(dir.path(), &config, &query, &["--format", "json"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let raw = std::fs::read_to_string(dir.path().join("out").join("Risk_Report_2026-02-10.json")).unwrap();
    let payload: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(payload["report_date"], "2026-02-10");
    assert_eq!(payload["grand_total"]["total_qtd_attainment_pct"], 90.0);
}

#[test]
fn test_timeout_exits_with_budget_message() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "sleep 5", 1);
    let query = write_query(dir.path(), "SELECT 1");

    let output = risk(dir.path(), &config, &query, &[]);
    assert_eq!(output.status.code(), Some(1));
    let message = stderr(&output);
    assert!(message.contains("Error: query timed out after 1 seconds"), "stderr: {}", message);
    assert!(!dir.path().join("out").exists());
}

#[test]
fn test_failing_command_reports_stderr() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "echo 'Access Denied' >&2; exit 3", 30);
    let query = write_query(dir.path(), "SELECT 1");

    let output = risk(dir.path(), &config, &query, &[]);
    assert_eq!(output.status.code(), Some(1));
    let message = stderr(&output);
    assert!(message.contains("exit code 3"), "stderr: {}", message);
    assert!(message.contains("Access Denied"), "stderr: {}", message);
}

#[test]
fn test_unresolved_placeholder_never_launches_tool() {
    let dir = TempDir::new().unwrap();
    let marker = dir.path().join("launched");
    let script = format!("touch '{}'", marker.display());
    let config = write_config(dir.path(), &script, 30);
    let query = write_query(dir.path(), "SELECT * FROM t WHERE region = '{{region}}'");

    let output = risk(dir.path(), &config, &query, &[]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("unresolved query placeholders: region"));
    assert!(!marker.exists());

    let output = risk(dir.path(), &config, &query, &["--param", "region=EMEA"]);
    // The fake tool prints nothing, so decoding fails after it ran
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("malformed query response"));
    assert!(marker.exists());
}

#[test]
fn test_missing_tool_is_reported() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("revops.yml");
    std::fs::write(&config, "query:\n  command: revops-no-such-warehouse-cli\n").unwrap();
    let query = write_query(dir.path(), "SELECT 1");

    let output = risk(dir.path(), &config, &query, &[]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("`revops-no-such-warehouse-cli` is not installed or not on PATH"));
}

#[test]
fn test_init_refuses_to_overwrite_without_force() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("revops-report.yml");
    let path_arg = path.to_str().unwrap();

    let output = run(dir.path(), &["init", "--config-file", path_arg]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("timeout_seconds: 300"));
    assert!(written.contains("command: bq"));

    std::fs::write(&path, "query:\n  command: custom\n").unwrap();
    let output = run(dir.path(), &["init", "--config-file", path_arg]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("already exists"));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "query:\n  command: custom\n");

    let output = run(dir.path(), &["init", "--config-file", path_arg, "--force"]);
    assert!(output.status.success());
    assert!(std::fs::read_to_string(&path).unwrap().contains("command: bq"));
}

#[test]
fn test_daily_runs_both_queries_into_dated_bundle() {
    let dir = TempDir::new().unwrap();
    // The fake tool answers the detail query with the detail payload
    let script = format!(
        "if grep -q daily_detail; then cat '{}'; else cat '{}'; fi",
        fixture("daily_detail_payload.json").display(),
        fixture("daily_report_payload.json").display()
    );
    let config = write_config(dir.path(), &script, 30);
    let report_query = write_named_query(dir.path(), "report.sql", "SELECT * FROM daily_report WHERE d = '{{as_of_date}}'");
    let detail_query = write_named_query(dir.path(), "detail.sql", "SELECT * FROM daily_detail WHERE d = '{{as_of_date}}'");

    let output = run(
        dir.path(),
        &[
            "--config",
            config.to_str().unwrap(),
            "daily",
            "--report-query",
            report_query.to_str().unwrap(),
            "--detail-query",
            detail_query.to_str().unwrap(),
            "--as-of-date",
            "2026-02-10",
        ],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let path = dir.path().join("out").join("daily_slack_2026-02-10.json");
    let bundle: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let main = bundle["main_message"].as_str().unwrap();
    assert!(main.starts_with("*Daily Revenue Performance Report*"));
    assert!(main.contains("2026-02-10 | P50 targets | Week starts 2026-02-09"));
    assert!(main.contains("| 8/10 wins"));
    assert_eq!(bundle["query_1_sql"], "SELECT * FROM daily_report WHERE d = '2026-02-10'");
    assert_eq!(bundle["query_2_sql"], "SELECT * FROM daily_detail WHERE d = '2026-02-10'");
    assert!(bundle["detail_payload_json"].as_str().unwrap().contains("INBOUND"));
    assert!(bundle["thread_message"].is_string());

    let summary = stdout(&output);
    assert!(summary.contains("Daily message bundle generated"));
    assert!(summary.contains("daily_slack_2026-02-10.json"));
}

#[test]
fn test_horizons_writes_per_product_text_report() {
    let dir = TempDir::new().unwrap();
    let script = format!("cat '{}'", fixture("horizon_payload.json").display());
    let config = write_config(dir.path(), &script, 30);
    let query = write_named_query(dir.path(), "por_horizons.sql", "SELECT report_json FROM horizons");

    let output = run(
        dir.path(),
        &[
            "--config",
            config.to_str().unwrap(),
            "horizons",
            "--product",
            "POR",
            "--query",
            query.to_str().unwrap(),
        ],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let report = std::fs::read_to_string(dir.path().join("out").join("report_por_risks.txt")).unwrap();
    assert!(report.contains("📊 POR Risk Analysis Report"));
    assert!(report.contains("As of Date: 2026-02-10"));
    assert!(report.contains("\nAMER: No risks identified\n"));
    assert!(report.contains("📌 EMEA - Top 1 Risks by Annual ACV Gap"));
    assert!(report.contains("  • MQL: 40/50 (80%)\n"));
    assert!(!report.contains("GLOBAL NEW LOGO SMB TARGET VALIDATION"));

    let summary = stdout(&output);
    assert!(summary.contains("POR: 1 risks -> "), "stdout: {}", summary);
    assert!(summary.contains("report_por_risks.txt"));
}

#[test]
fn test_funnel_all_writes_timestamped_files() {
    let dir = TempDir::new().unwrap();
    let script = format!("cat '{}'", fixture("tof_payload.json").display());
    let config = write_config(dir.path(), &script, 30);
    let query = write_named_query(dir.path(), "tof.sql", "SELECT report_json FROM tof");

    let output = run(
        dir.path(),
        &[
            "--config",
            config.to_str().unwrap(),
            "funnel",
            "--format",
            "all",
            "--query",
            query.to_str().unwrap(),
        ],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let out = dir.path().join("out");
    let json_files = files_starting_with(&out, "tof_report_");
    let summaries = files_starting_with(&out, "tof_summary_");
    let details = files_starting_with(&out, "tof_detail_");
    assert_eq!((json_files.len(), summaries.len(), details.len()), (1, 1, 1));
    assert!(json_files[0].to_str().unwrap().ends_with(".json"));
    assert!(details[0].to_str().unwrap().ends_with(".txt"));

    // All three files share one `YYYY-MM-DD_HHMMSS` stamp
    let stamp = |path: &Path, prefix: &str| {
        let name = path.file_name().unwrap().to_str().unwrap().to_string();
        name.trim_start_matches(prefix).split('.').next().unwrap().to_string()
    };
    let json_stamp = stamp(&json_files[0], "tof_report_");
    assert_eq!(json_stamp.len(), "2026-02-10_063000".len());
    assert_eq!(json_stamp, stamp(&summaries[0], "tof_summary_"));
    assert_eq!(json_stamp, stamp(&details[0], "tof_detail_"));

    let payload: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&json_files[0]).unwrap()).unwrap();
    assert_eq!(payload["period"]["start"], "2026-02-01");

    let summary = std::fs::read_to_string(&summaries[0]).unwrap();
    assert!(summary.contains("TOP OF FUNNEL PACING REPORT - EXECUTIVE SUMMARY"));
    assert!(summary.contains("Period: 2026-02-01 to 2026-02-10 (10 days)"));
    assert!(stdout(&output).contains("Top-of-funnel report generated"));
}
