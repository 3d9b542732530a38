use std::fs;
use std::path::PathBuf;
use std::process::Command;

use serde_json::Value;
use style_engine::fixtures::{sine_with_clicks, write_wav, SyntheticProfile};

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_style_cli"))
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("style_cli_{}_{}", name, std::process::id()));
    fs::create_dir_all(&dir).expect("create scratch dir");
    dir
}

#[test]
fn demo_techno_emits_decision() {
    let output = cli()
        .args(["demo", "--profile", "techno", "--duration-ms", "3000"])
        .output()
        .expect("failed to run style_cli demo");
    assert!(output.status.success(), "exit {:?}", output.status.code());

    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    let events: Vec<Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("event JSON"))
        .collect();
    let decision = events
        .iter()
        .find(|event| event["event"] == "style_decided")
        .expect("no style decision in demo output");
    let label = decision["style"]["label"].as_str().unwrap_or_default();
    assert!(label.starts_with("techno"), "label {label}");
}

#[test]
fn demo_rejects_unknown_profile() {
    let output = cli()
        .args(["demo", "--profile", "polka"])
        .output()
        .expect("failed to run style_cli demo");
    assert!(!output.status.success());
}

#[test]
fn classify_records_file() {
    let dir = scratch_dir("classify");
    let path = dir.join("records.jsonl");
    let lines: Vec<String> = SyntheticProfile::Techno
        .records(3000.0)
        .iter()
        .map(|record| serde_json::to_string(record).unwrap())
        .collect();
    fs::write(&path, lines.join("\n")).unwrap();

    let output = cli()
        .args(["classify", "--records", path.to_str().unwrap()])
        .output()
        .expect("failed to run style_cli classify");
    assert!(output.status.success(), "exit {:?}", output.status.code());

    let report: Value = serde_json::from_slice(&output.stdout).expect("report JSON");
    assert_eq!(report["final_state"], "generating");
    assert!(report["style"]["label"]
        .as_str()
        .unwrap_or_default()
        .starts_with("techno"));
    assert!(report["event_count"].as_u64().unwrap_or_default() >= 4);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn classify_reports_bad_line() {
    let dir = scratch_dir("bad_records");
    let path = dir.join("records.jsonl");
    fs::write(&path, "{\"timestamp_ms\": 0.0}\nnot json\n").unwrap();

    let output = cli()
        .args(["classify", "--records", path.to_str().unwrap()])
        .output()
        .expect("failed to run style_cli classify");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).expect("stderr UTF-8");
    assert!(stderr.contains("line 2"), "stderr was {stderr}");

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn separate_writes_components() {
    let dir = scratch_dir("separate");
    let wav = dir.join("input.wav");
    write_wav(&wav, &sine_with_clicks(16_000, 1000, 440.0, 250), 16_000).unwrap();
    let out_dir = dir.join("out");

    let output = cli()
        .args([
            "separate",
            "--wav",
            wav.to_str().unwrap(),
            "--out-dir",
            out_dir.to_str().unwrap(),
        ])
        .output()
        .expect("failed to run style_cli separate");
    assert!(output.status.success(), "exit {:?}", output.status.code());

    let report: Value = serde_json::from_slice(&output.stdout).expect("report JSON");
    assert_eq!(report["summary"]["is_fallback"], false);
    for name in ["harmonic.wav", "percussive.wav", "residual.wav"] {
        assert!(out_dir.join(name).exists(), "missing {name}");
    }

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn analyze_reports_state_and_style() {
    let dir = scratch_dir("analyze");
    let wav = dir.join("input.wav");
    write_wav(&wav, &sine_with_clicks(16_000, 2000, 330.0, 500), 16_000).unwrap();

    let output = cli()
        .args(["analyze", "--wav", wav.to_str().unwrap()])
        .output()
        .expect("failed to run style_cli analyze");
    assert!(output.status.success(), "exit {:?}", output.status.code());

    let report: Value = serde_json::from_slice(&output.stdout).expect("report JSON");
    assert_eq!(report["sample_rate"], 16_000);
    assert!(report["final_state"].is_string());
    assert!(report["style"]["label"].is_string());
    assert!(report["hpss"]["separation_quality"].is_number());

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn print_config_outputs_defaults() {
    let output = cli()
        .arg("print-config")
        .output()
        .expect("failed to run style_cli print-config");
    assert!(output.status.success());
    let config: Value = serde_json::from_slice(&output.stdout).expect("config JSON");
    assert_eq!(config["hpss"]["window_size"], 2048);
    assert_eq!(config["aggregation"]["max_window_ms"], 4000.0);
}
