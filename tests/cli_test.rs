//! CLI surface tests: exit codes and output shapes.

use assert_cmd::Command;
use predicates::prelude::*;

fn zkn(vault: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("zkn").unwrap();
    cmd.arg("--vault").arg(vault);
    cmd
}

fn write_note(vault: &std::path::Path, id: &str, content: &str) {
    std::fs::create_dir_all(vault).unwrap();
    std::fs::write(vault.join(format!("{id}.md")), content).unwrap();
}

#[test]
fn id_prints_twelve_hex_chars() {
    let dir = tempfile::tempdir().unwrap();
    let out = zkn(dir.path()).arg("id").assert().success();
    let stdout = String::from_utf8(out.get_output().stdout.clone()).unwrap();
    let id = stdout.trim();
    assert_eq!(id.len(), 12);
    assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn new_then_show_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let out = zkn(dir.path())
        .args(["new", "--title", "My Note"])
        .assert()
        .success();
    let id = String::from_utf8(out.get_output().stdout.clone())
        .unwrap()
        .trim()
        .to_string();

    zkn(dir.path())
        .args(["show", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("# My Note"));
}

#[test]
fn show_missing_note_exits_one() {
    let dir = tempfile::tempdir().unwrap();
    zkn(dir.path())
        .args(["show", "abcdef123456"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn yank_extracts_heading_section() {
    let dir = tempfile::tempdir().unwrap();
    write_note(
        dir.path(),
        "abc123",
        "# A\n\ntext\n## B\n\nbody\n## C\n\nmore\n",
    );

    zkn(dir.path())
        .args(["yank", "abc123#b"])
        .assert()
        .success()
        .stdout("## B\n\nbody\n");
}

#[test]
fn yank_missing_anchor_exits_one() {
    let dir = tempfile::tempdir().unwrap();
    write_note(dir.path(), "abc123", "# A\n");

    zkn(dir.path())
        .args(["yank", "abc123#nope"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("anchor"));
}

#[test]
fn reindex_then_search_finds_note() {
    let dir = tempfile::tempdir().unwrap();
    write_note(dir.path(), "abc123", "# Tensor calculus\n\ncurvature\n");

    zkn(dir.path()).arg("reindex").assert().success();
    zkn(dir.path())
        .args(["search", "curvature"])
        .assert()
        .success()
        .stdout(predicate::str::contains("abc123"));
}

#[test]
fn search_without_index_hints_reindex() {
    let dir = tempfile::tempdir().unwrap();
    write_note(dir.path(), "abc123", "body\n");

    zkn(dir.path())
        .args(["search", "body"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("reindex"));
}

#[test]
fn resolve_exit_codes_cover_all_outcomes() {
    let dir = tempfile::tempdir().unwrap();
    write_note(dir.path(), "tttttt", "---\ncore/title: Match\n---\n");
    write_note(
        dir.path(),
        "aaaaaa",
        "---\ncore/title: Other\ncore/aliases:\n- Match\n---\n",
    );
    write_note(dir.path(), "d1d1d1", "---\ncore/title: Dup\n---\n");
    write_note(dir.path(), "d2d2d2", "---\ncore/title: Dup\n---\n");
    zkn(dir.path()).arg("reindex").assert().success();

    zkn(dir.path())
        .args(["resolve", "Match", "--prefer", "alias"])
        .assert()
        .success()
        .stdout("aaaaaa\n");
    zkn(dir.path())
        .args(["resolve", "Match", "--prefer", "title"])
        .assert()
        .success()
        .stdout("tttttt\n");
    zkn(dir.path())
        .args(["resolve", "Nowhere"])
        .assert()
        .code(1);
    zkn(dir.path()).args(["resolve", "Dup"]).assert().code(2);
}

#[test]
fn audit_reports_dead_links_with_exit_one() {
    let dir = tempfile::tempdir().unwrap();
    write_note(dir.path(), "abc123", "[[ghost9]]\n");
    zkn(dir.path()).arg("reindex").assert().success();

    zkn(dir.path())
        .arg("audit")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("dead link"));
}

#[test]
fn reindex_json_reports_counts() {
    let dir = tempfile::tempdir().unwrap();
    write_note(dir.path(), "abc123", "# A\n");

    zkn(dir.path())
        .args(["--json", "reindex"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"inserted\":1"));
}

#[test]
fn graph_emits_nodes_and_edges() {
    let dir = tempfile::tempdir().unwrap();
    write_note(dir.path(), "abc123", "[[def456]]\n");
    write_note(dir.path(), "def456", "# Target\n");
    zkn(dir.path()).arg("reindex").assert().success();

    zkn(dir.path())
        .arg("graph")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"source\": \"abc123\""))
        .stdout(predicate::str::contains("\"target\": \"def456\""));
}

#[test]
fn export_writes_pages_and_graph() {
    let dir = tempfile::tempdir().unwrap();
    let vault = dir.path().join("vault");
    write_note(&vault, "abc123", "# Page\n\n![[def456]]\n");
    write_note(&vault, "def456", "embedded content\n");
    zkn(&vault).arg("reindex").assert().success();

    let out = dir.path().join("site");
    zkn(&vault)
        .args(["export", "--out"])
        .arg(&out)
        .assert()
        .success();

    let page = std::fs::read_to_string(out.join("abc123/index.md")).unwrap();
    assert!(page.contains("embedded content"));
    assert!(out.join("graph.json").exists());
}

#[test]
fn fmt_normalizes_link_whitespace() {
    let dir = tempfile::tempdir().unwrap();
    write_note(dir.path(), "abc123", "see [[ def456 | Title ]]\n");

    zkn(dir.path()).arg("fmt").assert().success();
    let text = std::fs::read_to_string(dir.path().join("abc123.md")).unwrap();
    assert!(text.contains("[[def456|Title]]"));
}

#[test]
fn import_plan_apply_rollback_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    std::fs::create_dir_all(&src).unwrap();
    std::fs::write(src.join("note.md"), "# Imported\n\ntext\n").unwrap();
    let vault = dir.path().join("vault");
    std::fs::create_dir_all(&vault).unwrap();
    let plan = dir.path().join("plan.json");

    zkn(&vault)
        .args(["import", "plan"])
        .arg(&src)
        .arg("--out")
        .arg(&plan)
        .assert()
        .success();

    zkn(&vault)
        .args(["import", "apply"])
        .arg(&plan)
        .assert()
        .success();

    let imported: Vec<_> = std::fs::read_dir(&vault)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|x| x == "md"))
        .collect();
    assert_eq!(imported.len(), 1);

    let manifest: Vec<_> = std::fs::read_dir(vault.join(".zkn"))
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("import-"))
        .collect();
    assert_eq!(manifest.len(), 1);

    zkn(&vault)
        .args(["import", "rollback"])
        .arg(manifest[0].path())
        .assert()
        .success();

    let after: Vec<_> = std::fs::read_dir(&vault)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|x| x == "md"))
        .collect();
    assert!(after.is_empty());
}
