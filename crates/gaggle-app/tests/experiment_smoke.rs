use std::process::Command;

#[test]
fn experiment_binary_runs_headless() {
    let bin = env!("CARGO_BIN_EXE_gaggle-app");
    let mut cmd = Command::new(bin);
    cmd.env("GAGGLE_TRIALS", "1")
        .env("GAGGLE_LEARNING_STEPS", "5")
        .env("GAGGLE_TESTING_STEPS", "3")
        .env("GAGGLE_AGENTS", "10")
        .env("GAGGLE_SEED", "42")
        .env("RUST_LOG", "off");

    let status = cmd.status().expect("failed to run gaggle-app binary");
    assert!(status.success(), "experiment run failed");
}
