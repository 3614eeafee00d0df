use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

// Build a minimal valid TOML config for sim mode
fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[pins]
# pins are unused in sim backend but must parse
enc_a = 17
enc_b = 27
enc_index = 22
motor_enable = 23
motor_reverse = 24

[controller]
kp = 80.0
# integral off keeps short sim moves free of windup
ki = 0.0
kd = 2.0
period_s = 0.01
max_accel = 9.0
max_speed = 36.0
min_speed = 1.5

[calibration]
sweep_deg = 10.0
max_retries = 3

[runner]
loop_period_ms = 1
timeout_ms = 20000
"#;
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["goto", "1.0"], 0, "goto complete", "stdout")]
#[case(&["move", "-0.5"], 0, "move complete", "stdout")]
#[case(&["goto", "720"], 3, "What happened: target = 720", "stderr")]
#[case(&["goto", "90", "--timeout-ms", "1"], 4, "did not finish within 1 ms", "stderr")]
#[case(&["goto"], 2, "required", "stderr")]
#[case(&["get", "kp", "minspd"], 0, "kp", "stdout")]
#[case(&["get", "bogus"], 1, "Unknown setting 'bogus'", "stderr")]
#[case(&["status"], 0, "realpos", "stdout")]
#[case(&["self-check"], 0, "OK (sim backend)", "stdout")]
#[case(&["--set", "kd=500", "status"], 3, "kd = 500", "stderr")]
#[case(&["--set", "speed=1", "status"], 1, "read-only", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let mut cmd = Command::cargo_bin("rotator_cli").unwrap();

    // Always include a valid config to avoid relying on default path
    cmd.arg("--config").arg(&cfg);
    cmd.env_remove("ROTATOR_SIM_FAIL");
    cmd.env_remove("ROTATOR_SIM_START_DEG");

    for a in args {
        cmd.arg(a);
    }

    let assert = cmd.assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[rstest]
fn get_prints_configured_gains() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let mut cmd = Command::cargo_bin("rotator_cli").unwrap();
    cmd.arg("--config")
        .arg(&cfg)
        .arg("--set")
        .arg("maxspd=20")
        .arg("--set")
        .arg("kp+=20")
        .arg("get")
        .arg("maxspd")
        .arg("kp")
        .arg("offset");
    cmd.assert()
        .success()
        .stdout(predicate::str::is_match(r"maxspd\s+rw 20").unwrap())
        .stdout(predicate::str::is_match(r"kp\s+rw 100").unwrap())
        .stdout(predicate::str::is_match(r"offset\s+ro 0").unwrap());
}

#[rstest]
fn calibrate_parks_on_the_index() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    // Index sits 3 deg ahead of the power-up position.
    let mut cmd = Command::cargo_bin("rotator_cli").unwrap();
    cmd.env("ROTATOR_SIM_START_DEG", "-3")
        .env_remove("ROTATOR_SIM_FAIL")
        .arg("--config")
        .arg(&cfg)
        .arg("calibrate");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("zero reference established"));
}

#[rstest]
fn cli_reports_bad_transfer_header() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    // Write a bad-header CSV
    let bad_csv = dir.path().join("transfer.csv");
    let mut f = fs::File::create(&bad_csv).unwrap();
    writeln!(f, "command,speed").unwrap();
    writeln!(f, "5.0,4.3").unwrap();
    writeln!(f, "-5.0,-4.6").unwrap();

    let mut cmd = Command::cargo_bin("rotator_cli").unwrap();
    cmd.arg("--config")
        .arg(&cfg)
        .arg("--transfer")
        .arg(&bad_csv)
        .arg("self-check");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Invalid headers"));
}

#[rstest]
fn transfer_csv_replaces_configured_lines() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    // measured = 2 * command + 1 (forward), 3 * command - 1 (reverse)
    let csv = dir.path().join("transfer.csv");
    let mut f = fs::File::create(&csv).unwrap();
    writeln!(f, "command,measured").unwrap();
    for c in [2.0f32, 4.0, 6.0, 8.0] {
        writeln!(f, "{c},{}", 2.0 * c + 1.0).unwrap();
        writeln!(f, "{},{}", -c, -3.0 * c - 1.0).unwrap();
    }

    let mut cmd = Command::cargo_bin("rotator_cli").unwrap();
    cmd.arg("--config")
        .arg(&cfg)
        .arg("--transfer")
        .arg(&csv)
        .arg("get")
        .arg("xfer+m")
        .arg("xfer-m");
    cmd.assert()
        .success()
        .stdout(predicate::str::is_match(r"xfer\+m\s+rw 2").unwrap())
        .stdout(predicate::str::is_match(r"xfer-m\s+rw 3").unwrap());
}

#[rstest]
fn line_fault_bubbles_to_cli() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let mut cmd = Command::cargo_bin("rotator_cli").unwrap();
    cmd.env("ROTATOR_SIM_FAIL", "lines")
        .arg("--config")
        .arg(&cfg)
        .arg("self-check");
    cmd.assert()
        .code(1)
        .stderr(predicate::str::contains("What happened: Hardware error"));
}

#[rstest]
fn invalid_config_is_explained() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "[controller]\nkp = 5000.0\n").unwrap();

    let mut cmd = Command::cargo_bin("rotator_cli").unwrap();
    cmd.arg("--config").arg(&path).arg("status");
    cmd.assert()
        .code(1)
        .stderr(predicate::str::contains("controller.kp must be in"));
}

#[rstest]
fn missing_explicit_config_fails() {
    let dir = tempdir().unwrap();
    let mut cmd = Command::cargo_bin("rotator_cli").unwrap();
    cmd.arg("--config")
        .arg(dir.path().join("nope.toml"))
        .arg("status");
    cmd.assert()
        .code(1)
        .stderr(predicate::str::contains("could not be loaded"));
}
