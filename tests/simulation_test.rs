use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};

const EVENTS: &str = "\
[new_junction]
id = j1

[new_junction]
id = j2
type = mc

[new_road]
id = r1
src = j1
dest = j2
max_speed = 30
length = 60
type = dirt

[new_vehicle]
id = v1
max_speed = 30
itinerary = j1,j2
type = bike
";

/// Fresh scratch directory for one test
fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "road_traffic_sim_{}_{}",
        name,
        std::process::id()
    ));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).expect("Failed to create scratch directory");
    dir
}

fn run_cli(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_road_traffic_sim"))
        .args(args)
        .env("RUST_LOG", "warn,road_traffic_sim=info")
        .env_remove("TRAFFIC_INPUT")
        .env_remove("TRAFFIC_OUTPUT")
        .env_remove("TRAFFIC_TICKS")
        .env_remove("TRAFFIC_DELAY_MS")
        .output()
        .expect("Failed to execute simulation")
}

/// Test that a batch run writes reports and logs the final statistics
#[test]
fn test_batch_run_writes_reports() {
    let dir = scratch_dir("batch");
    let input = dir.join("events.ini");
    fs::write(&input, EVENTS).unwrap();

    let output = run_cli(&["-i", input.to_str().unwrap(), "-t", "3"]);
    assert!(
        output.status.success(),
        "Simulation failed. stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.matches("[vehicle_report]").count(), 3);
    assert_eq!(stdout.matches("[junction_report]").count(), 6);
    assert!(stdout.contains("type = bike"));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("SIMULATION COMPLETE"),
        "Simulation did not complete properly. stderr: {}",
        stderr
    );
    assert!(stderr.contains("Total vehicles: 1"), "stderr: {}", stderr);
    assert!(stderr.contains("Total roads: 1"), "stderr: {}", stderr);
}

/// Test that reports go to the output file and the summary is printed
#[test]
fn test_output_file_and_summary() {
    let dir = scratch_dir("summary");
    let input = dir.join("events.ini");
    let report = dir.join("events.out");
    fs::write(&input, EVENTS).unwrap();

    let output = run_cli(&[
        "--input",
        input.to_str().unwrap(),
        "--output",
        report.to_str().unwrap(),
        "--ticks",
        "2",
        "--summary",
    ]);
    assert!(output.status.success(), "Simulation failed to run");

    let written = fs::read_to_string(&report).unwrap();
    assert!(written.contains("[road_report]"));
    assert!(written.contains("time = 2"));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("=== Traffic Simulation Summary ==="));
    assert!(stdout.contains("ID=r1 Source=j1 Target=j2"));
    assert!(!stdout.contains("[vehicle_report]"));
}

#[test]
fn test_templates_listed() {
    let output = run_cli(&["--templates"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("; New RR Junction"));
    assert!(stdout.contains("min_time_slice = "));
    assert_eq!(stdout.matches("[new_vehicle]").count(), 3);
}

#[test]
fn test_missing_input_fails() {
    let output = run_cli(&[]);
    assert!(!output.status.success());

    let output = run_cli(&["-i", "/definitely/not/here.ini"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to open"), "stderr: {}", stderr);
}

#[test]
fn test_invalid_events_fail() {
    let dir = scratch_dir("invalid");
    let input = dir.join("bad.ini");
    fs::write(&input, "[new_junction]\nid = j-1\n").unwrap();

    let output = run_cli(&["-i", input.to_str().unwrap()]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("is not a valid id"), "stderr: {}", stderr);
    assert!(stderr.contains("Failed to load events"), "stderr: {}", stderr);
    assert!(!stderr.contains("Simulation aborted"), "stderr: {}", stderr);
}

/// Regression mode compares each output with its expected file
#[test]
fn test_check_mode() {
    let dir = scratch_dir("check");
    let input = dir.join("basic.ini");
    fs::write(&input, EVENTS).unwrap();

    // First produce the expected output with a normal run
    let eout = dir.join("basic.ini.eout");
    let output = run_cli(&[
        "-i",
        input.to_str().unwrap(),
        "-o",
        eout.to_str().unwrap(),
        "-t",
        "10",
    ]);
    assert!(output.status.success());

    let output = run_cli(&["--check", dir.to_str().unwrap()]);
    assert!(
        output.status.success(),
        "Check failed. stdout: {}",
        String::from_utf8_lossy(&output.stdout)
    );
    assert!(String::from_utf8_lossy(&output.stdout).contains("basic.ini: OK"));
    assert!(dir.join("basic.ini.out").exists());

    // A changed expectation is reported
    let tampered = fs::read_to_string(&eout)
        .unwrap()
        .replacen("time = 1", "time = 99", 1);
    fs::write(&eout, tampered).unwrap();
    let output = run_cli(&["--check", dir.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("output differs"));
}
