use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn add_entry(conversations: &Path, name: &str, title: Option<&str>) {
    let dir = conversations.join(name);
    fs::create_dir_all(&dir).expect("mkdir entry");
    if let Some(title) = title {
        fs::write(
            dir.join("conversation.toml"),
            format!("version = \"2.0.0\"\ntitle = \"{title}\"\nstatus = \"active\"\n"),
        )
        .expect("write conversation file");
    }
}

fn entry_names(conversations: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(conversations)
        .expect("read conversations")
        .map(|e| e.expect("entry").file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

#[test]
fn cleanup_prunes_renumbers_and_rebuilds_the_index() {
    let tmp = tempdir().expect("tempdir");
    let essence = tmp.path().join("__essence__");
    let conversations = essence.join("conversations");
    add_entry(&conversations, "003_zeta", Some("Zeta"));
    add_entry(&conversations, "001_alpha", None);
    add_entry(&conversations, "002_beta", Some("Beta"));

    assert_cmd::cargo::cargo_bin_cmd!("essence")
        .current_dir(tmp.path())
        .env("ESSENCE_DIR", &essence)
        .arg("cleanup")
        .assert()
        .success()
        .stdout(predicate::str::contains("removed: 001_alpha"))
        .stdout(predicate::str::contains("renamed: 002_beta -> 001_beta"))
        .stdout(predicate::str::contains("renamed: 003_zeta -> 002_zeta"));

    assert_eq!(entry_names(&conversations), vec!["001_beta", "002_zeta"]);

    let meta = fs::read_to_string(essence.join("meta.toml")).expect("read meta");
    assert!(meta.contains("[conversations.001]\nslug = \"beta\"\ntitle = \"Beta\""));
    assert!(meta.contains("[conversations.002]\nslug = \"zeta\"\ntitle = \"Zeta\""));
    assert!(meta.contains("abstract = \"Zeta\""));

    let audit = fs::read_to_string(essence.join("logs/audit.log")).expect("read audit log");
    assert!(audit.contains("\"phase\":\"cleanup\""));

    assert_cmd::cargo::cargo_bin_cmd!("essence")
        .current_dir(tmp.path())
        .env("ESSENCE_DIR", &essence)
        .arg("cleanup")
        .assert()
        .success()
        .stdout(predicate::str::contains("no changes needed"));
}

#[test]
fn dry_run_cleanup_leaves_the_tree_alone() {
    let tmp = tempdir().expect("tempdir");
    let essence = tmp.path().join("__essence__");
    let conversations = essence.join("conversations");
    add_entry(&conversations, "001_alpha", None);
    add_entry(&conversations, "004_delta", Some("Delta"));

    assert_cmd::cargo::cargo_bin_cmd!("essence")
        .current_dir(tmp.path())
        .env("ESSENCE_DIR", &essence)
        .args(["cleanup", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("would remove: 001_alpha"))
        .stdout(predicate::str::contains("would rename: 004_delta -> 001_delta"));

    assert_eq!(entry_names(&conversations), vec!["001_alpha", "004_delta"]);
    assert!(!essence.join("meta.toml").exists());
}

#[test]
fn cleanup_keeps_manual_index_fields() {
    let tmp = tempdir().expect("tempdir");
    let essence = tmp.path().join("__essence__");
    let conversations = essence.join("conversations");
    add_entry(&conversations, "002_beta", Some("Beta"));
    fs::write(
        essence.join("meta.toml"),
        "abstract = \"project notes\"\nversion = \"2.0.0\"\n\n[conversations.009]\nslug = \"gone\"\n",
    )
    .expect("write meta");

    assert_cmd::cargo::cargo_bin_cmd!("essence")
        .current_dir(tmp.path())
        .env("ESSENCE_DIR", &essence)
        .arg("cleanup")
        .assert()
        .success();

    let meta = fs::read_to_string(essence.join("meta.toml")).expect("read meta");
    assert!(meta.starts_with("abstract = \"project notes\"\nversion = \"2.0.0\"\n"));
    assert!(meta.contains("[conversations.001]\nslug = \"beta\""));
    assert!(!meta.contains("gone"));
}
