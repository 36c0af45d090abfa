use std::fs;
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::TempDir;

fn liquidbg(config_dir: &TempDir, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_liquidbg"))
        .env("LIQUIDBG_CONFIG_DIR", config_dir.path())
        .env("RUST_LOG", "warn")
        .args(args)
        .output()
        .expect("failed to run liquidbg")
}

#[test]
fn presets_list_includes_bundled_and_scene_presets() {
    let root = TempDir::new().unwrap();
    fs::write(
        root.path().join("scene.toml"),
        "version = 1\n\n[presets.Dusk]\ncolor1 = \"#1b1b3a\"\nshape = \"edge\"\n",
    )
    .unwrap();

    let output = liquidbg(&root, &["presets", "list"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for name in ["Prism", "Lava", "Plasma", "Pulse", "Vortex", "Mist", "Dusk"] {
        assert!(stdout.contains(name), "missing {name} in:\n{stdout}");
    }
}

#[test]
fn presets_show_prints_uniform_map() {
    let root = TempDir::new().unwrap();
    let output = liquidbg(&root, &["presets", "show", "lava"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("u_swirlIterations"));
    assert!(stdout.contains("shape = \"edge\""));
}

#[test]
fn simulate_reports_half_a_second() {
    let root = TempDir::new().unwrap();
    let output = liquidbg(
        &root,
        &[
            "simulate",
            "--speed",
            "1",
            "--seed",
            "0",
            "--duration",
            "500ms",
            "--interval",
            "16ms",
            "--json",
        ],
    );
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let report: Value = serde_json::from_slice(&output.stdout).expect("report is JSON");
    let accumulator = report["accumulator_ms"].as_f64().unwrap();
    assert!((accumulator - 500.0).abs() < 1e-6);
    let time = report["time_uniform"].as_f64().unwrap();
    assert!((time - 0.5).abs() < 1e-4);
    assert_eq!(report["max_pending_frames"], 1);
    assert_eq!(report["shader"], "warp");
}

#[test]
fn unknown_preset_fails() {
    let root = TempDir::new().unwrap();
    let output = liquidbg(&root, &["simulate", "--preset", "Sunset"]);
    assert!(!output.status.success());
}

#[test]
fn invalid_scene_file_is_reported() {
    let root = TempDir::new().unwrap();
    fs::write(root.path().join("scene.toml"), "version = 2\n").unwrap();
    let output = liquidbg(&root, &["presets", "list"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unsupported config version"), "stderr: {stderr}");
}
