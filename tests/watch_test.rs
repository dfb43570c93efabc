//! End-to-end watcher test: real filesystem events driving the index.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use zkn::store::Store;
use zkn::vault::Vault;
use zkn::watcher::{watch_vault, WatchEvent, WatchOptions};

#[test]
fn watcher_indexes_created_modified_and_deleted_notes() {
    let dir = tempfile::tempdir().unwrap();
    let vault_root = dir.path().join("vault");
    std::fs::create_dir_all(&vault_root).unwrap();
    let db_path = dir.path().join("index.sqlite");

    // Seed one note so the initial sync has something to do.
    Vault::new(&vault_root).write_raw("seed00", "# Seed\n").unwrap();

    let running = Arc::new(AtomicBool::new(true));
    let (events_tx, events_rx) = mpsc::channel();

    let thread = {
        let vault_root = vault_root.clone();
        let db_path = db_path.clone();
        let running = Arc::clone(&running);
        std::thread::spawn(move || {
            let vault = Vault::new(&vault_root);
            let store = Store::open(&db_path).unwrap();
            let opts = WatchOptions { debounce_ms: 100 };
            watch_vault(&vault, &store, opts, &running, |event| {
                let _ = events_tx.send(event);
            })
            .unwrap();
        })
    };

    // Initial sync fires before events are accepted.
    let first = events_rx
        .recv_timeout(Duration::from_secs(10))
        .expect("initial sync event");
    match first {
        WatchEvent::InitialSync { inserted } => assert_eq!(inserted, 1),
        other => panic!("expected initial sync, got {other:?}"),
    }

    let vault = Vault::new(&vault_root);
    vault.write_raw("abc123", "# New note\n\n[[seed00]]\n").unwrap();

    // Wait for the batch that indexes the new note.
    let deadline = Instant::now() + Duration::from_secs(10);
    let mut batch_seen = false;
    while Instant::now() < deadline {
        match events_rx.recv_timeout(Duration::from_secs(10)) {
            Ok(WatchEvent::Batch { counts, .. }) if counts.inserted >= 1 => {
                batch_seen = true;
                break;
            }
            Ok(_) => continue,
            Err(_) => break,
        }
    }
    assert!(batch_seen, "no batch indexed the created note");

    vault.delete("abc123").unwrap();
    let deadline = Instant::now() + Duration::from_secs(10);
    let mut removal_seen = false;
    while Instant::now() < deadline {
        match events_rx.recv_timeout(Duration::from_secs(10)) {
            Ok(WatchEvent::Batch { counts, .. }) if counts.removed >= 1 => {
                removal_seen = true;
                break;
            }
            Ok(_) => continue,
            Err(_) => break,
        }
    }
    assert!(removal_seen, "no batch removed the deleted note");

    running.store(false, Ordering::Release);
    thread.join().unwrap();

    // The index reflects the final state.
    let store = Store::open(&db_path).unwrap();
    assert!(store.note_exists("seed00").unwrap());
    assert!(!store.note_exists("abc123").unwrap());
}
