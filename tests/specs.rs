// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace-level end-to-end specs: run the `quarryd` binary in BATCH mode
//! against a local git fixture repository.

use assert_cmd::Command;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use std::path::Path;

/// Create a local git repository with one committed file.
fn init_fixture_repo(dir: &Path) {
    let git = |args: &[&str]| {
        let output = std::process::Command::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .expect("git not available");
        assert!(
            output.status.success(),
            "git {args:?}: {}",
            String::from_utf8_lossy(&output.stderr)
        );
    };
    git(&["init", "-q", "-b", "main"]);
    std::fs::write(dir.join("main.tf"), "# fixture\n").unwrap();
    git(&["add", "."]);
    git(&[
        "-c",
        "user.name=quarry",
        "-c",
        "user.email=quarry@example.com",
        "commit",
        "-q",
        "-m",
        "init",
    ]);
}

fn encode_job(source: &str, commands: &[&str]) -> String {
    let job = serde_json::json!({
        "jobId": "e2e-1",
        "stepId": "step-1",
        "organizationId": "acme",
        "workspaceId": "fixtures",
        "type": "customScript",
        "source": source,
        "commands": commands,
    });
    BASE64_STANDARD.encode(job.to_string())
}

fn quarryd() -> Command {
    let mut cmd = Command::cargo_bin("quarryd").expect("quarryd binary");
    // keep ambient configuration out of the fixture runs
    for key in ["QUARRY_API_URL", "QUARRY_REGISTRY_DOMAIN", "QUARRY_REDIS_URL", "QUARRY_STORAGE_TYPE"]
    {
        cmd.env_remove(key);
    }
    cmd
}

#[test]
fn batch_custom_script_runs_in_the_checkout_and_cleans_up() {
    let repo = tempfile::tempdir().unwrap();
    init_fixture_repo(repo.path());
    let workspaces = tempfile::tempdir().unwrap();

    let job = encode_job(
        &format!("file://{}", repo.path().display()),
        // the script sees the checked-out source as its working directory
        &["test -f main.tf", "echo quarry-e2e-ok"],
    );

    let assert = quarryd()
        .env("QUARRY_MODE", "BATCH")
        .env("QUARRY_JOB_DATA", &job)
        .env("QUARRY_WORKSPACE_DIR", workspaces.path())
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).into_owned();
    assert!(stdout.contains("quarry-e2e-ok"), "stdout: {stdout}");

    // the job workspace was torn down
    assert_eq!(std::fs::read_dir(workspaces.path()).unwrap().count(), 0);
}

#[test]
fn batch_failing_script_exits_nonzero() {
    let repo = tempfile::tempdir().unwrap();
    init_fixture_repo(repo.path());
    let workspaces = tempfile::tempdir().unwrap();

    let job = encode_job(&format!("file://{}", repo.path().display()), &["exit 7"]);

    quarryd()
        .env("QUARRY_MODE", "BATCH")
        .env("QUARRY_JOB_DATA", &job)
        .env("QUARRY_WORKSPACE_DIR", workspaces.path())
        .assert()
        .failure();

    assert_eq!(std::fs::read_dir(workspaces.path()).unwrap().count(), 0);
}

#[test]
fn batch_unfetchable_source_exits_nonzero() {
    let workspaces = tempfile::tempdir().unwrap();
    let job = encode_job("file:///quarry-no-such-repo", &["true"]);

    quarryd()
        .env("QUARRY_MODE", "BATCH")
        .env("QUARRY_JOB_DATA", &job)
        .env("QUARRY_WORKSPACE_DIR", workspaces.path())
        .assert()
        .failure();
}

#[test]
fn batch_without_job_data_is_a_configuration_error() {
    quarryd()
        .env("QUARRY_MODE", "BATCH")
        .env_remove("QUARRY_JOB_DATA")
        .assert()
        .failure()
        .code(2);
}
