use assert_cmd::Command;
use predicates::str::contains;

#[test]
fn runs_without_arguments() {
    let mut cmd = Command::cargo_bin("braid").unwrap();
    cmd.assert().success();
}

#[test]
fn runs_hello_world() {
    let mut cmd = Command::cargo_bin("braid").unwrap();
    cmd.arg("run").arg("tests/files/hw.asm");

    cmd.assert()
        .success()
        .stdout(contains("Hello, world!"))
        .stdout(contains("Halted"));
}

#[test]
fn checks_valid_file() {
    let mut cmd = Command::cargo_bin("braid").unwrap();
    cmd.arg("check").arg("tests/files/hw.asm");

    cmd.assert().success().stdout(contains("Success"));
}

#[test]
fn check_reports_undefined_label() {
    let mut cmd = Command::cargo_bin("braid").unwrap();
    cmd.arg("check").arg("tests/files/undefined.asm");

    cmd.assert().failure().stderr(contains("undefined label"));
}

#[test]
fn run_stops_at_cycle_limit() {
    let mut cmd = Command::cargo_bin("braid").unwrap();
    cmd.arg("run")
        .arg("tests/files/spin.asm")
        .arg("--limit")
        .arg("100");

    cmd.assert().success().stdout(contains("cycle limit reached"));
}

#[test]
fn compiles_and_runs_object_file() {
    let out = std::env::temp_dir().join("braid_it_hw.obj");

    let mut cmd = Command::cargo_bin("braid").unwrap();
    cmd.arg("compile")
        .arg("tests/files/hw.asm")
        .arg(&out);
    cmd.assert().success().stdout(contains("Saved"));

    let mut cmd = Command::cargo_bin("braid").unwrap();
    cmd.arg("run").arg(&out);
    cmd.assert()
        .success()
        .stdout(contains("Hello, world!"))
        .stdout(contains("Halted"));

    let _ = std::fs::remove_file(&out);
}

#[test]
fn dump_lists_words_and_symbols() {
    let mut cmd = Command::cargo_bin("braid").unwrap();
    cmd.arg("dump").arg("tests/files/hw.asm");

    cmd.assert()
        .success()
        .stdout(contains("text"))
        .stdout(contains("x3000"));
}
