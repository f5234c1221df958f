use assert_cmd::prelude::*;
use predicates::str::contains;
use std::process::Command;

#[test]
fn headless_mode_reports_the_frame_schedule() {
    let mut cmd = Command::cargo_bin("pavilion").expect("binary exists");
    cmd.arg("--headless").arg("--frames").arg("2");
    cmd.assert()
        .success()
        .stdout(contains("frame 1: lights=6 main=8 exterior=2 skybox=1"))
        .stdout(contains("frame 2: lights=6 main=8 exterior=2 skybox=1"))
        .stdout(contains("Rendered 2 frame(s) without a window"));
}

#[test]
fn unknown_arguments_are_rejected() {
    let mut cmd = Command::cargo_bin("pavilion").expect("binary exists");
    cmd.arg("--bogus");
    cmd.assert()
        .failure()
        .stderr(contains("Unknown argument: --bogus"));
}
