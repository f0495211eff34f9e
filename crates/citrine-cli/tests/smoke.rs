use std::process::Command;

use pretty_assertions::assert_eq;

fn citrine() -> Command {
    Command::new(env!("CARGO_BIN_EXE_citrine"))
}

#[test]
fn runs_rounds_on_a_written_image() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("game.ctr");

    let output = citrine()
        .arg(&image)
        .args(["--write-image", "0x0004000000ABCD00", "--rounds", "3", "--json"])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "stderr:\n{}",
        String::from_utf8_lossy(&output.stderr)
    );

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["program_id"], "0004000000ABCD00");
    assert_eq!(summary["cores"], 2);
    assert_eq!(summary["rounds"].as_array().map(Vec::len), Some(3));
    assert_eq!(summary["rounds"][0]["kind"], "synchronized");
    assert_eq!(summary["rounds"][0]["slice"], 20_000);
    assert_eq!(summary["global_ticks"], 60_000);
    assert_eq!(summary["shutdown_requested"], false);
}

#[test]
fn new_hardware_flag_builds_four_cores() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("game.ctr");

    let output = citrine()
        .arg(&image)
        .args(["--write-image", "42", "--rounds", "1", "--new-3ds"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("on 4 cores"), "stdout:\n{stdout}");
    assert!(stdout.contains("round 0: synchronized slice=20000"), "stdout:\n{stdout}");
}

#[test]
fn unrecognised_files_fail_to_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, "not a program").unwrap();

    let output = citrine().arg(&path).output().unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no loader accepts the file"), "stderr:\n{stderr}");
}
