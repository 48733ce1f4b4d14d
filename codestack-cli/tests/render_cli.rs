use std::fs;

use assert_cmd::Command;
use tempfile::tempdir;

fn codestack(home: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("codestack").unwrap();
    cmd.env("HOME", home)
        .env("XDG_DATA_HOME", home.join("data"))
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env("RUST_LOG", "warn");
    cmd
}

#[test]
fn render_prints_highlighted_frames() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("lib.rs");
    let content = (1..=10)
        .map(|n| format!("let v{n} = \"<{n}>\";"))
        .collect::<Vec<_>>()
        .join("\n");
    fs::write(&source, content).unwrap();

    let output = codestack(dir.path())
        .arg("render")
        .arg("--frame")
        .arg(format!("{}:4", source.display()))
        .arg("--frame")
        .arg(format!("{}:2-3", source.display()))
        .output()
        .unwrap();

    assert!(output.status.success(), "{:?}", output);
    let html = String::from_utf8(output.stdout).unwrap();
    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(html.contains("id=\"frame-0\""));
    assert!(html.contains("id=\"frame-1\""));
    assert!(html.contains("lib.rs:4"));
    assert!(html.contains("lib.rs:2"));
    assert!(html.contains("data-line=\"3\" tabindex=\"0\">let v4 = &quot;&lt;4&gt;&quot;;"));
    assert_eq!(html.matches("line-content highlighted").count(), 3);
}

#[test]
fn render_writes_to_out_file() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("main.rs");
    fs::write(&source, "fn main() {}\n").unwrap();
    let out = dir.path().join("view.html");

    codestack(dir.path())
        .arg("render")
        .arg("--frame")
        .arg(format!("{}:1", source.display()))
        .arg("--out")
        .arg(&out)
        .assert()
        .success();

    let html = fs::read_to_string(&out).unwrap();
    assert!(html.contains("main.rs:1"));
}

#[test]
fn render_fails_for_missing_source() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("absent.rs");

    codestack(dir.path())
        .arg("render")
        .arg("--frame")
        .arg(format!("{}:1", missing.display()))
        .assert()
        .failure();
}

#[test]
fn render_rejects_malformed_frame_argument() {
    let dir = tempdir().unwrap();
    codestack(dir.path())
        .args(["render", "--frame", "no-line-number"])
        .assert()
        .failure();
}
