//! Integration tests for core CLI contract behavior.

use {predicates::prelude::*, std::fs, tempfile::tempdir};

fn cli_cmd() -> assert_cmd::Command {
    assert_cmd::cargo::cargo_bin_cmd!("ccflash")
}

#[test]
fn help_exits_zero_and_writes_stdout_only() {
    let mut cmd = cli_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("ccflash"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn short_help_exits_zero_and_writes_stdout_only() {
    let mut cmd = cli_cmd();
    cmd.arg("-h")
        .assert()
        .success()
        .stdout(predicate::str::contains("ccflash"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn version_exits_zero_and_writes_stdout_only() {
    let mut cmd = cli_cmd();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("ccflash"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn help_lists_all_subcommands() {
    let mut cmd = cli_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("flash")
                .and(predicate::str::contains("erase"))
                .and(predicate::str::contains("list-ports")),
        );
}

#[test]
fn flash_with_missing_file_fails_fast() {
    let dir = tempdir().expect("tempdir should be created");
    let nonexistent = dir.path().join("not_there.bin");

    let mut cmd = cli_cmd();
    cmd.arg("flash")
        .arg(nonexistent.as_os_str())
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn flash_without_port_reports_usage_error() {
    let dir = tempdir().expect("tempdir should be created");
    let firmware = dir.path().join("fw.bin");
    fs::write(&firmware, vec![0u8; 1024]).expect("write fw.bin");

    let mut cmd = cli_cmd();
    // Run from the temp dir so no local ccflash.toml supplies a port.
    cmd.current_dir(dir.path())
        .env_remove("CCFLASH_PORT")
        .arg("flash")
        .arg(firmware.as_os_str())
        .assert()
        .failure()
        .stderr(predicate::str::contains("port"));
}

#[test]
fn erase_without_confirmation_flag_fails() {
    let mut cmd = cli_cmd();
    cmd.env_remove("CCFLASH_PORT")
        .arg("erase")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--yes"));
}

#[test]
fn list_ports_runs_without_crashing() {
    // Environments without serial ports must still exit cleanly.
    let mut cmd = cli_cmd();
    let output = cmd.arg("list-ports").output().expect("command should execute");
    let _ = output;
}

#[test]
fn unknown_subcommand_fails_with_usage() {
    let mut cmd = cli_cmd();
    cmd.arg("frobnicate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage").or(predicate::str::contains("error")));
}
