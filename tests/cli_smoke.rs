//! End-to-end CLI tests: argument parsing, envelopes and exit codes.

use assert_cmd::Command;
use predicates::str::contains;
use tempfile::TempDir;

fn planbook(data_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("planbook").expect("binary builds");
    cmd.env("PLANBOOK_DATA", data_dir.path());
    cmd.env_remove("RUST_LOG");
    cmd
}

fn json_stdout(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

#[test]
fn task_new_emits_json_envelope() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;

    let output = planbook(&dir)
        .args(["--json", "task", "new", "write docs", "--estimate", "60"])
        .output()?;
    assert!(output.status.success());

    let envelope = json_stdout(&output);
    assert_eq!(envelope["schema_version"], "planbook.v1");
    assert_eq!(envelope["command"], "task new");
    assert_eq!(envelope["status"], "success");
    assert_eq!(envelope["data"]["state"], "Filed");
    assert_eq!(envelope["data"]["points"], 3);

    planbook(&dir)
        .args(["task", "list"])
        .assert()
        .success()
        .stdout(contains("write docs"));

    Ok(())
}

#[test]
fn task_delete_is_policy_blocked() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;

    let output = planbook(&dir)
        .args(["--json", "task", "new", "permanent"])
        .output()?;
    let id = json_stdout(&output)["data"]["id"]
        .as_str()
        .expect("task id in envelope")
        .to_string();

    planbook(&dir)
        .args(["task", "delete", &id])
        .assert()
        .code(3)
        .stderr(contains("deletion is disabled"))
        .stderr(contains("hint:"));

    // The task is still there.
    planbook(&dir)
        .args(["task", "list"])
        .assert()
        .success()
        .stdout(contains("permanent"));

    Ok(())
}

#[test]
fn error_envelope_in_json_mode() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;

    let output = planbook(&dir)
        .args([
            "--json",
            "task",
            "delete",
            "00000000-0000-0000-0000-000000000000",
        ])
        .output()?;
    assert_eq!(output.status.code(), Some(3));

    let envelope = json_stdout(&output);
    assert_eq!(envelope["status"], "error");
    assert_eq!(envelope["command"], "task delete");
    assert_eq!(envelope["error"]["code"], 3);
    assert_eq!(envelope["error"]["kind"], "policy_blocked");

    Ok(())
}

#[test]
fn invalid_transition_is_user_error() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;

    let output = planbook(&dir)
        .args(["--json", "task", "new", "strict"])
        .output()?;
    let id = json_stdout(&output)["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    planbook(&dir)
        .args(["task", "update", &id, "--state", "doing"])
        .assert()
        .code(2)
        .stderr(contains("Invalid state transition"));

    Ok(())
}

#[test]
fn unknown_task_is_user_error() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;

    planbook(&dir)
        .args(["task", "show", "00000000-0000-0000-0000-000000000000"])
        .assert()
        .code(2)
        .stderr(contains("Task not found"));

    Ok(())
}

#[test]
fn wipe_requires_force() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;

    planbook(&dir)
        .args(["data", "wipe"])
        .assert()
        .code(2)
        .stderr(contains("--force"));

    Ok(())
}

#[test]
fn export_import_round_trip_on_disk() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let snapshot = dir.path().join("snapshot.json");

    planbook(&dir)
        .args(["--quiet", "task", "new", "survives export", "--estimate", "20"])
        .assert()
        .success();

    planbook(&dir)
        .args(["data", "export", "--out"])
        .arg(&snapshot)
        .assert()
        .success()
        .stdout(contains("Snapshot exported"));

    planbook(&dir)
        .args(["data", "wipe", "--force"])
        .assert()
        .success();

    planbook(&dir)
        .args(["data", "import"])
        .arg(&snapshot)
        .assert()
        .success()
        .stdout(contains("Snapshot imported"));

    planbook(&dir)
        .args(["task", "list"])
        .assert()
        .success()
        .stdout(contains("survives export"));

    Ok(())
}

#[test]
fn malformed_import_is_user_error() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let bogus = dir.path().join("bogus.json");
    std::fs::write(&bogus, "{\"version\": 1}")?;

    planbook(&dir)
        .args(["data", "import"])
        .arg(&bogus)
        .assert()
        .code(2)
        .stderr(contains("Malformed snapshot"));

    Ok(())
}

#[test]
fn story_attach_and_progress_through_cli() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;

    let output = planbook(&dir)
        .args(["--json", "story", "new", "release"])
        .output()?;
    let story_id = json_stdout(&output)["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let output = planbook(&dir)
        .args(["--json", "task", "new", "ship", "--estimate", "20"])
        .output()?;
    let task_id = json_stdout(&output)["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    planbook(&dir)
        .args(["story", "attach", &story_id, &task_id])
        .assert()
        .success();

    planbook(&dir)
        .args(["task", "update", &task_id, "--state", "finished"])
        .assert()
        .success();

    let output = planbook(&dir)
        .args(["--json", "story", "show", &story_id])
        .output()?;
    let envelope = json_stdout(&output);
    assert_eq!(envelope["data"]["state"], "Finished");
    assert_eq!(envelope["data"]["progress"], 100);

    Ok(())
}
