#![allow(deprecated)]

use assert_cmd::cargo::cargo_bin;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn sopvault(root: &Path) -> Command {
    let mut cmd = Command::new(cargo_bin("sopvault"));
    cmd.env_remove("SOPVAULT_USER")
        .env_remove("SOPVAULT_HOME")
        .env_remove("SOPVAULT_STORAGE_ROOT")
        .arg("--root")
        .arg(root);
    cmd
}

fn incoming(temp: &TempDir, name: &str) -> String {
    let path = temp.path().join("incoming").join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, b"controlled content").unwrap();
    path.to_str().unwrap().to_string()
}

#[test]
fn upload_approve_delete_and_restore() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("vault");
    let file = incoming(&temp, "gowning.docx");

    // 1. Upload
    sopvault(&root)
        .args(["upload", &file, "-n", "SOP-001", "-t", "Gowning", "-d", "Quality"])
        .args(["--doc-type", "SOP", "--as", "Ann Author"])
        .assert()
        .success()
        .stdout(predicate::str::contains("SOP SOP-001 uploaded"));
    assert!(root.join("register.json").is_file());
    assert!(root.join("storage/Originals/SOP/gowning.docx").is_file());

    // 2. A plain user cannot approve
    sopvault(&root)
        .args(["approve", "SOP-001", "--as", "Ann Author"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not authorized"));

    // 3. Manager, then admin
    sopvault(&root)
        .args(["approve", "SOP-001", "--as", "Max", "--role", "manager"])
        .assert()
        .success()
        .stdout(predicate::str::contains("awaiting admin approval"));
    sopvault(&root)
        .args(["approve", "SOP-001", "--as", "Ada", "--role", "admin"])
        .assert()
        .success()
        .stdout(predicate::str::contains("SOP SOP-001 approved"));

    sopvault(&root)
        .args(["list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("SOP-001").and(predicate::str::contains("Approved")));

    // 4. Deletion request and approval move the file into the archive
    sopvault(&root)
        .args(["request-deletion", "SOP-001", "-m", "Superseded", "--as", "Ann Author"])
        .assert()
        .success();
    sopvault(&root)
        .args(["approve-deletion", "SOP-001", "--as", "Ada", "--role", "admin"])
        .assert()
        .success()
        .stdout(predicate::str::contains("archived"));
    assert!(!root.join("storage/Originals/SOP/gowning.docx").exists());

    sopvault(&root)
        .args(["trash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Superseded"));

    // 5. Restore brings the file back under its original name
    sopvault(&root)
        .args(["restore", "SOP-001", "--as", "Ada", "--role", "admin"])
        .assert()
        .success()
        .stdout(predicate::str::contains("SOP SOP-001 restored"));
    assert!(root.join("storage/Originals/SOP/gowning.docx").is_file());

    sopvault(&root)
        .args(["trash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Trash is empty."));
}

#[test]
fn next_number_counts_past_existing_documents() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("vault");
    let file = incoming(&temp, "line.pdf");

    sopvault(&root)
        .args(["next-number", "SOP"])
        .assert()
        .success()
        .stdout("SOP-001\n");

    sopvault(&root)
        .args(["upload", &file, "-n", "SOP-001", "-t", "Line", "-d", "Quality"])
        .args(["--doc-type", "SOP", "--as", "Ann"])
        .assert()
        .success();

    sopvault(&root)
        .args(["next-number", "SOP"])
        .assert()
        .success()
        .stdout("SOP-002\n");
}

#[test]
fn mutating_commands_need_an_actor() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("vault");

    sopvault(&root)
        .args(["approve", "SOP-001"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--as"));
}

#[test]
fn structured_sop_from_a_json_draft() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("vault");
    let draft = temp.path().join("draft.json");
    let json = serde_json::json!({
        "sop_number": "SOP-010",
        "title": "Line Clearance",
        "department": "Quality",
        "doc_type": "SOP",
        "steps": [
            { "instruction_html": "<p>Remove previous labels</p>" }
        ]
    });
    fs::write(&draft, serde_json::to_string_pretty(&json).unwrap()).unwrap();

    sopvault(&root)
        .args(["create", draft.to_str().unwrap(), "--as", "Ann"])
        .assert()
        .success()
        .stdout(predicate::str::contains("SOP-010"));

    sopvault(&root)
        .args(["sops"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Line Clearance").and(predicate::str::contains("1 steps")));

    sopvault(&root)
        .args(["show", "SOP-010"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created"));
}
