//! Integration tests for the durable index against a real vault directory.

use std::collections::BTreeSet;

use zkn::migrate::{resolve_target, Prefer, Resolution, ResolveMode};
use zkn::store::{RebuildOptions, Store};
use zkn::vault::Vault;

struct Fixture {
    _dir: tempfile::TempDir,
    vault: Vault,
    store: Store,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let vault = Vault::new(dir.path().join("vault"));
    let store = Store::open(&dir.path().join("vault/.zkn/index.sqlite")).unwrap();
    Fixture {
        vault,
        store,
        _dir: dir,
    }
}

fn ids(one: &str) -> BTreeSet<String> {
    std::iter::once(one.to_string()).collect()
}

#[test]
fn full_rebuild_mirrors_vault() {
    let f = fixture();
    f.vault
        .write_raw("aaa111", "# Alpha\n\nlinks to [[bbb222#beta]]\n")
        .unwrap();
    f.vault.write_raw("bbb222", "# Beta\n\nplain\n").unwrap();

    let counts = f
        .store
        .rebuild(&f.vault, RebuildOptions { full: true, use_hash: false }, None)
        .unwrap();
    assert_eq!(counts.scanned, 2);
    assert_eq!(counts.inserted, 2);
    assert_eq!(counts.failed, 0);

    assert_eq!(f.store.note_ids().unwrap(), vec!["aaa111", "bbb222"]);
    assert_eq!(f.store.title("aaa111").unwrap().as_deref(), Some("Alpha"));

    let out = f.store.links_out("aaa111").unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].target.id, "bbb222");

    let incoming = f.store.links_in("bbb222").unwrap();
    assert_eq!(incoming.len(), 1);
    assert_eq!(incoming[0].source, "aaa111");

    let blocks = f.store.blocks("aaa111").unwrap();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].heading_slug.as_deref(), Some("alpha"));
}

#[test]
fn incremental_rebuild_counts_one_dirty_note() {
    let f = fixture();
    f.vault.write_raw("aaa111", "# A\n").unwrap();
    f.vault.write_raw("bbb222", "# B\n").unwrap();
    f.store
        .rebuild(&f.vault, RebuildOptions::default(), None)
        .unwrap();

    f.vault.write_raw("aaa111", "# A changed\n").unwrap();
    let counts = f
        .store
        .rebuild(&f.vault, RebuildOptions::default(), None)
        .unwrap();
    assert_eq!(counts.scanned, 2);
    assert_eq!(counts.dirty, 1);
    assert_eq!(counts.inserted, 0);
    assert_eq!(counts.updated, 1);
    assert_eq!(counts.removed, 0);
    assert_eq!(counts.failed, 0);
}

#[test]
fn full_rebuild_of_clean_vault_reports_zero_dirty() {
    let f = fixture();
    f.vault.write_raw("aaa111", "# A\n").unwrap();
    f.vault.write_raw("bbb222", "# B\n").unwrap();
    f.store
        .rebuild(&f.vault, RebuildOptions::default(), None)
        .unwrap();

    // Nothing touched since the last pass: a full rebuild reindexes every
    // note but none of them is dirty.
    let counts = f
        .store
        .rebuild(
            &f.vault,
            RebuildOptions {
                full: true,
                use_hash: false,
            },
            None,
        )
        .unwrap();
    assert_eq!(counts.scanned, 2);
    assert_eq!(counts.dirty, 0);
    assert_eq!(counts.inserted, 0);
    assert_eq!(counts.updated, 2);
    assert_eq!(counts.removed, 0);
    assert_eq!(counts.failed, 0);
}

#[test]
fn deleting_a_file_removes_its_rows() {
    let f = fixture();
    f.vault
        .write_raw("aaa111", "links to [[xxx999]]\n")
        .unwrap();
    f.vault.write_raw("xxx999", "# X\n").unwrap();
    f.store
        .rebuild(&f.vault, RebuildOptions::default(), None)
        .unwrap();
    assert_eq!(f.store.links_in("xxx999").unwrap().len(), 1);

    f.vault.delete("aaa111").unwrap();
    let counts = f
        .store
        .rebuild(&f.vault, RebuildOptions::default(), None)
        .unwrap();
    assert_eq!(counts.removed, 1);
    assert!(f
        .store
        .links_in("xxx999")
        .unwrap()
        .iter()
        .all(|l| l.source != "aaa111"));
}

#[test]
fn dead_links_are_permitted() {
    let f = fixture();
    f.vault.write_raw("aaa111", "[[missing1]]\n").unwrap();
    let counts = f
        .store
        .rebuild(&f.vault, RebuildOptions::default(), None)
        .unwrap();
    assert_eq!(counts.failed, 0);
    let out = f.store.links_out("aaa111").unwrap();
    assert_eq!(out[0].target.id, "missing1");
    assert!(!f.store.note_exists("missing1").unwrap());
}

#[test]
fn update_then_delete_leaves_no_rows() {
    let f = fixture();
    f.vault
        .write_raw(
            "aaa111",
            "---\ncore/aliases:\n- Alias One\n---\n# A ^top\n\n[[bbb222]]\n",
        )
        .unwrap();

    let counts = f
        .store
        .update_notes(&f.vault, &ids("aaa111"), &BTreeSet::new())
        .unwrap();
    assert_eq!(counts.inserted, 1);
    assert!(f.store.note_exists("aaa111").unwrap());
    assert_eq!(f.store.kv_get("aaa111", "core/alias").unwrap(), vec!["Alias One"]);

    let counts = f
        .store
        .update_notes(&f.vault, &BTreeSet::new(), &ids("aaa111"))
        .unwrap();
    assert_eq!(counts.removed, 1);

    assert!(!f.store.note_exists("aaa111").unwrap());
    assert!(f.store.blocks("aaa111").unwrap().is_empty());
    assert!(f.store.links_out("aaa111").unwrap().is_empty());
    assert!(f.store.kv_get("aaa111", "core/alias").unwrap().is_empty());
    assert!(f.store.links_in("bbb222").unwrap().is_empty());
}

#[test]
fn update_notes_classifies_changed_vs_new() {
    let f = fixture();
    f.vault.write_raw("aaa111", "one\n").unwrap();
    f.store
        .update_notes(&f.vault, &ids("aaa111"), &BTreeSet::new())
        .unwrap();

    f.vault.write_raw("aaa111", "two\n").unwrap();
    f.vault.write_raw("bbb222", "new\n").unwrap();
    let mut changed = ids("aaa111");
    changed.extend(ids("bbb222"));
    let counts = f
        .store
        .update_notes(&f.vault, &changed, &BTreeSet::new())
        .unwrap();
    assert_eq!(counts.inserted, 1);
    assert_eq!(counts.updated, 1);
}

#[test]
fn hash_mode_catches_content_change_with_same_identity() {
    let f = fixture();
    let hash_opts = RebuildOptions {
        full: false,
        use_hash: true,
    };
    let mtime = std::time::SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_700_000_000);
    let path = f.vault.note_path("aaa111");

    f.vault.write_raw("aaa111", "same size A\n").unwrap();
    set_mtime(&path, mtime);
    f.store.rebuild(&f.vault, hash_opts, None).unwrap();

    // Same byte length, same pinned mtime: only the digest differs.
    f.vault.write_raw("aaa111", "same size B\n").unwrap();
    set_mtime(&path, mtime);

    let plain = f
        .store
        .rebuild(&f.vault, RebuildOptions::default(), None)
        .unwrap();
    assert_eq!(plain.dirty, 0);

    let hashed = f.store.rebuild(&f.vault, hash_opts, None).unwrap();
    assert_eq!(hashed.dirty, 1);
    assert_eq!(hashed.updated, 1);
}

fn set_mtime(path: &std::path::Path, t: std::time::SystemTime) {
    let file = std::fs::OpenOptions::new().write(true).open(path).unwrap();
    file.set_times(std::fs::FileTimes::new().set_modified(t))
        .unwrap();
}

#[test]
fn search_ranks_and_snippets() {
    let f = fixture();
    f.vault
        .write_raw(
            "aaa111",
            "# Parallel transport\n\ncurvature along a connection\n",
        )
        .unwrap();
    f.vault
        .write_raw("bbb222", "# Cooking\n\nrecipes and nothing else\n")
        .unwrap();
    f.store
        .rebuild(&f.vault, RebuildOptions::default(), None)
        .unwrap();

    let hits = f.store.search("curvature", 10).unwrap();
    assert_eq!(hits, vec!["aaa111"]);

    let snippet = f.store.snippet("aaa111", "curvature").unwrap().unwrap();
    assert!(snippet.contains("<b>curvature</b>"));
}

#[test]
fn search_folds_diacritics() {
    let f = fixture();
    f.vault
        .write_raw("aaa111", "# Schr\u{f6}dinger equation\n")
        .unwrap();
    f.store
        .rebuild(&f.vault, RebuildOptions::default(), None)
        .unwrap();

    assert_eq!(f.store.search("schrodinger", 10).unwrap(), vec!["aaa111"]);
}

#[test]
fn search_on_empty_index_hints_reindex() {
    let f = fixture();
    let err = f.store.search("anything", 10).unwrap_err();
    assert!(matches!(err, zkn::Error::EmptyIndex));
    assert!(err.to_string().contains("reindex"));
}

#[test]
fn orphans_are_unlinked_notes() {
    let f = fixture();
    f.vault.write_raw("aaa111", "[[bbb222]]\n").unwrap();
    f.vault.write_raw("bbb222", "target\n").unwrap();
    f.vault.write_raw("ccc333", "alone\n").unwrap();
    f.store
        .rebuild(&f.vault, RebuildOptions::default(), None)
        .unwrap();

    assert_eq!(f.store.orphans().unwrap(), vec!["ccc333"]);
}

#[test]
fn graph_data_deduplicates_edges() {
    let f = fixture();
    f.vault
        .write_raw("aaa111", "[[bbb222]] and again [[bbb222]]\n")
        .unwrap();
    f.vault.write_raw("bbb222", "x\n").unwrap();
    f.store
        .rebuild(&f.vault, RebuildOptions::default(), None)
        .unwrap();

    let graph = f.store.graph_data().unwrap();
    assert_eq!(graph.nodes.len(), 2);
    assert_eq!(graph.edges.len(), 1);
    assert_eq!(graph.edges[0].source, "aaa111");
    assert_eq!(graph.edges[0].target, "bbb222");
}

#[test]
fn failed_note_rolls_back_and_rebuild_continues() {
    let f = fixture();
    // Opening delimiter with no closing one: header decode fails.
    f.vault.write_raw("bad111", "---\nbroken: [\n").unwrap();
    f.vault.write_raw("good22", "# Fine\n").unwrap();

    let counts = f
        .store
        .rebuild(&f.vault, RebuildOptions::default(), None)
        .unwrap();
    assert_eq!(counts.failed, 1);
    assert_eq!(counts.inserted, 1);
    assert!(!f.store.note_exists("bad111").unwrap());
    assert!(f.store.note_exists("good22").unwrap());
}

#[test]
fn resolver_prefers_requested_category() {
    let f = fixture();
    f.vault
        .write_raw("tttttt", "---\ncore/title: Match\n---\nbody\n")
        .unwrap();
    f.vault
        .write_raw("aaaaaa", "---\ncore/title: Other\ncore/aliases:\n- Match\n---\nbody\n")
        .unwrap();
    f.store
        .rebuild(&f.vault, RebuildOptions::default(), None)
        .unwrap();

    let by_alias =
        resolve_target(&f.store, "Match", ResolveMode::Both, Prefer::Alias).unwrap();
    assert_eq!(by_alias, Resolution::Found("aaaaaa".to_string()));

    let by_title =
        resolve_target(&f.store, "Match", ResolveMode::Both, Prefer::Title).unwrap();
    assert_eq!(by_title, Resolution::Found("tttttt".to_string()));

    let missing =
        resolve_target(&f.store, "Nowhere", ResolveMode::Both, Prefer::Alias).unwrap();
    assert_eq!(missing, Resolution::NotFound);
}

#[test]
fn resolver_reports_ambiguity_within_category() {
    let f = fixture();
    f.vault
        .write_raw("aaaaaa", "---\ncore/title: Dup\n---\n")
        .unwrap();
    f.vault
        .write_raw("bbbbbb", "---\ncore/title: Dup\n---\n")
        .unwrap();
    f.store
        .rebuild(&f.vault, RebuildOptions::default(), None)
        .unwrap();

    match resolve_target(&f.store, "Dup", ResolveMode::Both, Prefer::Alias).unwrap() {
        Resolution::Ambiguous(candidates) => {
            assert_eq!(candidates, vec!["aaaaaa", "bbbbbb"]);
        }
        other => panic!("expected ambiguity, got {other:?}"),
    }
}

#[test]
fn title_heuristic_order() {
    let f = fixture();
    f.vault
        .write_raw("m11111", "---\ncore/title: Meta Title\n---\n# Heading\n")
        .unwrap();
    f.vault.write_raw("h22222", "# Heading Title\n").unwrap();
    f.vault.write_raw("l33333", "\njust a line\n").unwrap();
    f.store
        .rebuild(&f.vault, RebuildOptions::default(), None)
        .unwrap();

    assert_eq!(f.store.title("m11111").unwrap().as_deref(), Some("Meta Title"));
    assert_eq!(
        f.store.title("h22222").unwrap().as_deref(),
        Some("Heading Title")
    );
    assert_eq!(f.store.title("l33333").unwrap().as_deref(), Some("just a line"));
}
