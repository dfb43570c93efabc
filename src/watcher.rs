//! Watch mode: turn filesystem events into debounced incremental index
//! updates.
//!
//! notify's backend thread is the event receiver; the loop here wakes every
//! 100 ms, coalesces events into a per-id batch, and flushes once the vault
//! has been quiet for the debounce window. All index writes happen on this
//! thread, one per-note transaction at a time, so readers only ever see
//! complete notes.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::Result;
use crate::store::{RebuildOptions, Store, UpdateCounts};
use crate::vault::{Vault, NOTE_EXT};

/// Wake interval of the debounce ticker.
const TICK_MS: u64 = 100;

/// Cap on distinct ids held in one batch; further events are dropped until
/// the batch flushes.
const MAX_BATCH_IDS: usize = 10_000;

#[derive(Debug, Clone, Copy)]
pub struct WatchOptions {
    /// Quiet period before a batch flushes.
    pub debounce_ms: u64,
}

impl Default for WatchOptions {
    fn default() -> Self {
        WatchOptions { debounce_ms: 150 }
    }
}

/// What the watch loop reports back to its caller.
#[derive(Debug)]
pub enum WatchEvent {
    /// Full rebuild ran because the index was empty at startup.
    InitialSync { inserted: usize },
    /// A batch was applied.
    Batch {
        counts: UpdateCounts,
        duration_ms: u64,
    },
    /// A batch failed; the watcher keeps running.
    Error { message: String },
}

/// Per-id state within the current batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    Added,
    Modified,
    Deleted,
}

#[derive(Default)]
struct Batch {
    pending: BTreeMap<String, Pending>,
    last_event: Option<Instant>,
}

impl Batch {
    fn record(&mut self, id: String, state: Pending) {
        use Pending::*;
        if self.pending.len() >= MAX_BATCH_IDS && !self.pending.contains_key(&id) {
            tracing::warn!(id = %id, "batch full, dropping event until next flush");
            return;
        }
        let entry = self.pending.entry(id).or_insert(state);
        *entry = match (*entry, state) {
            // Deletion always wins over earlier adds/modifies.
            (_, Deleted) => Deleted,
            // Added-then-modified stays added; recreation after deletion is
            // an add.
            (Added, Modified) => Added,
            (Deleted, Added) | (Deleted, Modified) => Added,
            (old, Modified) => {
                debug_assert_eq!(old, Modified);
                Modified
            }
            (_, Added) => Added,
        };
        self.last_event = Some(Instant::now());
    }

    fn ready(&self, debounce: Duration) -> bool {
        !self.pending.is_empty()
            && self
                .last_event
                .is_some_and(|t| t.elapsed() >= debounce)
    }

    fn take(&mut self) -> (BTreeSet<String>, BTreeSet<String>) {
        let mut changed = BTreeSet::new();
        let mut deleted = BTreeSet::new();
        for (id, state) in std::mem::take(&mut self.pending) {
            match state {
                Pending::Added | Pending::Modified => {
                    changed.insert(id);
                }
                Pending::Deleted => {
                    deleted.insert(id);
                }
            }
        }
        self.last_event = None;
        (changed, deleted)
    }
}

/// Extract a note id from an event path, or `None` for files the watcher
/// ignores: wrong extension, hidden files, editor temp/swap artifacts.
fn note_id_of(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    if name.starts_with('.') || name.starts_with(".#") || name.ends_with('~') || name.ends_with(".swp")
    {
        return None;
    }
    let stem = name.strip_suffix(&format!(".{NOTE_EXT}"))?;
    if stem.is_empty() || !crate::slug::is_valid_id(stem) {
        return None;
    }
    Some(stem.to_string())
}

fn classify(kind: &EventKind) -> Option<Pending> {
    match kind {
        EventKind::Create(_) => Some(Pending::Added),
        EventKind::Modify(_) => Some(Pending::Modified),
        EventKind::Remove(_) => Some(Pending::Deleted),
        _ => None,
    }
}

/// Watch the vault and keep the index current until `running` goes false.
///
/// If the index is empty at startup a full rebuild runs before any events
/// are accepted. On shutdown the pending batch is flushed, so nothing seen
/// before the signal is lost.
pub fn watch_vault(
    vault: &Vault,
    store: &Store,
    opts: WatchOptions,
    running: &AtomicBool,
    mut observer: impl FnMut(WatchEvent),
) -> Result<()> {
    if store.note_count()? == 0 {
        let counts = store.rebuild(vault, RebuildOptions::default(), None)?;
        observer(WatchEvent::InitialSync {
            inserted: counts.inserted,
        });
    }

    let (tx, rx) = mpsc::channel();
    let mut watcher = RecommendedWatcher::new(tx, notify::Config::default())
        .map_err(|e| crate::error::Error::Io(std::io::Error::other(e)))?;
    watcher
        .watch(vault.root(), RecursiveMode::NonRecursive)
        .map_err(|e| crate::error::Error::Io(std::io::Error::other(e)))?;

    let debounce = Duration::from_millis(opts.debounce_ms);
    let mut batch = Batch::default();

    while running.load(Ordering::Acquire) {
        match rx.recv_timeout(Duration::from_millis(TICK_MS)) {
            Ok(Ok(event)) => {
                let Some(state) = classify(&event.kind) else {
                    continue;
                };
                for path in &event.paths {
                    if let Some(id) = note_id_of(path) {
                        batch.record(id, state);
                    }
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "watch backend error");
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }

        if batch.ready(debounce) {
            flush(vault, store, &mut batch, &mut observer);
        }
    }

    // Drain whatever arrived before the shutdown signal.
    if !batch.pending.is_empty() {
        flush(vault, store, &mut batch, &mut observer);
    }
    Ok(())
}

fn flush(vault: &Vault, store: &Store, batch: &mut Batch, observer: &mut impl FnMut(WatchEvent)) {
    let (changed, deleted) = batch.take();
    let started = Instant::now();
    match store.update_notes(vault, &changed, &deleted) {
        Ok(counts) => observer(WatchEvent::Batch {
            counts,
            duration_ms: started.elapsed().as_millis() as u64,
        }),
        Err(e) => observer(WatchEvent::Error {
            message: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn filter_accepts_only_plain_note_files() {
        assert_eq!(
            note_id_of(&PathBuf::from("/v/abc123.md")),
            Some("abc123".into())
        );
        assert_eq!(note_id_of(&PathBuf::from("/v/.hidden.md")), None);
        assert_eq!(note_id_of(&PathBuf::from("/v/abc123.md~")), None);
        assert_eq!(note_id_of(&PathBuf::from("/v/abc123.md.swp")), None);
        assert_eq!(note_id_of(&PathBuf::from("/v/.#abc123.md")), None);
        assert_eq!(note_id_of(&PathBuf::from("/v/abc123.txt")), None);
        assert_eq!(note_id_of(&PathBuf::from("/v/has space.md")), None);
    }

    #[test]
    fn batch_added_then_modified_is_added() {
        let mut b = Batch::default();
        b.record("a".into(), Pending::Added);
        b.record("a".into(), Pending::Modified);
        assert_eq!(b.pending.get("a"), Some(&Pending::Added));
    }

    #[test]
    fn batch_deletion_overrides() {
        let mut b = Batch::default();
        b.record("a".into(), Pending::Added);
        b.record("a".into(), Pending::Modified);
        b.record("a".into(), Pending::Deleted);
        assert_eq!(b.pending.get("a"), Some(&Pending::Deleted));
    }

    #[test]
    fn batch_recreation_after_delete_is_added() {
        let mut b = Batch::default();
        b.record("a".into(), Pending::Deleted);
        b.record("a".into(), Pending::Added);
        assert_eq!(b.pending.get("a"), Some(&Pending::Added));
    }

    #[test]
    fn batch_take_splits_changed_and_deleted() {
        let mut b = Batch::default();
        b.record("a".into(), Pending::Added);
        b.record("b".into(), Pending::Modified);
        b.record("c".into(), Pending::Deleted);
        let (changed, deleted) = b.take();
        assert_eq!(changed.into_iter().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(deleted.into_iter().collect::<Vec<_>>(), vec!["c"]);
        assert!(b.pending.is_empty());
    }

    #[test]
    fn batch_not_ready_before_debounce() {
        let mut b = Batch::default();
        b.record("a".into(), Pending::Added);
        assert!(!b.ready(Duration::from_secs(60)));
        assert!(b.ready(Duration::from_millis(0)));
    }
}
