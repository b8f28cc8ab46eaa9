use std::process::Command;

#[test]
fn cli_compiles_without_warnings() {
    let status = Command::new(env!("CARGO"))
        .current_dir(env!("CARGO_MANIFEST_DIR"))
        .args(["check", "--quiet", "--bin", "shapeshifter"])
        .status()
        .expect("failed to invoke cargo check for the shapeshifter CLI binary");

    assert!(status.success(), "cargo check --bin shapeshifter should succeed");
}

#[test]
fn bundled_scenario_runs_to_completion_report() {
    let output = Command::new(env!("CARGO"))
        .current_dir(env!("CARGO_MANIFEST_DIR"))
        .args([
            "run",
            "--quiet",
            "--bin",
            "shapeshifter",
            "--",
            "--scenario",
            "scenarios/ring.toml",
            "--max-steps",
            "200",
            "--json",
        ])
        .output()
        .expect("failed to invoke cargo run for the shapeshifter CLI binary");

    assert!(output.status.success(), "shapeshifter exited with {}", output.status);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"advances\""), "missing report in {stdout}");
}
