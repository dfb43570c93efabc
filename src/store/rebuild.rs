//! Incremental rebuild: change detection and the per-note upsert
//! transaction.
//!
//! Every note is written under its own `BEGIN IMMEDIATE` transaction, so a
//! reader observes either the previous or the new row set for that note,
//! never a mix. A failing note rolls back, is counted, and the rebuild
//! moves on.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::pool::PoolConnection;
use sqlx::Sqlite;

use super::Store;
use crate::error::Result;
use crate::note::{BlockKind, Note};
use crate::vault::Vault;

#[derive(Debug, Clone, Copy, Default)]
pub struct RebuildOptions {
    /// Reindex every note regardless of stored file identity.
    pub full: bool,
    /// When `(mtime, size)` match, fall back to comparing a SHA-256 content
    /// digest before declaring a note clean.
    pub use_hash: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RebuildCounts {
    pub scanned: usize,
    pub dirty: usize,
    pub inserted: usize,
    pub updated: usize,
    pub removed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpdateCounts {
    pub inserted: usize,
    pub updated: usize,
    pub removed: usize,
}

/// Everything derived from one note before its transaction begins; the
/// filesystem and parser are never touched while the write lock is held.
struct NoteRecord {
    note: Note,
    mtime_ns: i64,
    size_bytes: i64,
    hash: Option<String>,
    title: String,
    has_math: bool,
}

impl Store {
    /// Rebuild the index against the vault.
    ///
    /// Enumerates files and stored rows, removes rows whose file is gone,
    /// reindexes dirty (or, with `full`, all) notes one transaction each,
    /// and compacts the database after a full pass. `cancel` is checked
    /// between per-note transactions.
    pub fn rebuild(
        &self,
        vault: &Vault,
        opts: RebuildOptions,
        cancel: Option<&AtomicBool>,
    ) -> Result<RebuildCounts> {
        let mut counts = RebuildCounts::default();

        let file_ids: BTreeSet<String> = vault.list_ids()?.into_iter().collect();
        counts.scanned = file_ids.len();

        let db_ids: BTreeSet<String> = self.note_ids()?.into_iter().collect();

        for id in db_ids.difference(&file_ids) {
            self.remove_note(id)?;
            counts.removed += 1;
        }

        for id in &file_ids {
            if cancel.is_some_and(|c| c.load(Ordering::Acquire)) {
                tracing::info!("rebuild cancelled");
                break;
            }
            let dirty = self.is_dirty(vault, id, opts.use_hash)?;
            if !opts.full && !dirty {
                continue;
            }
            // `dirty` is an identity predicate; a full pass reindexes clean
            // notes without counting them as dirty.
            if dirty {
                counts.dirty += 1;
            }
            let is_new = !db_ids.contains(id);
            match self.index_note(vault, id, opts.use_hash) {
                Ok(()) => {
                    if is_new {
                        counts.inserted += 1;
                    } else {
                        counts.updated += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(note = %id, error = %e, "failed to index note");
                    counts.failed += 1;
                }
            }
        }

        if opts.full {
            self.compact()?;
        }
        Ok(counts)
    }

    /// Targeted update for a watcher batch: remove `deleted`, upsert
    /// `changed`. Same per-note transaction discipline as `rebuild`.
    pub fn update_notes(
        &self,
        vault: &Vault,
        changed: &BTreeSet<String>,
        deleted: &BTreeSet<String>,
    ) -> Result<UpdateCounts> {
        let mut counts = UpdateCounts::default();

        for id in deleted {
            self.remove_note(id)?;
            counts.removed += 1;
        }

        for id in changed {
            let is_new = !self.note_exists(id)?;
            match self.index_note(vault, id, false) {
                Ok(()) => {
                    if is_new {
                        counts.inserted += 1;
                    } else {
                        counts.updated += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(note = %id, error = %e, "failed to index note");
                }
            }
        }
        Ok(counts)
    }

    /// A note is dirty when its stored `(mtime_ns, size_bytes)` differ from
    /// the file's, or (in hash mode) when the content digest differs even
    /// though they match.
    fn is_dirty(&self, vault: &Vault, id: &str, use_hash: bool) -> Result<bool> {
        let Some((mtime_ns, size_bytes)) = vault.file_stats(id) else {
            // Gone from disk; handled as a removal, not as dirt.
            return Ok(false);
        };

        let row: Option<(i64, i64, Option<String>)> = self.rt.block_on(
            sqlx::query_as("SELECT mtime_ns, size_bytes, hash FROM notes WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool),
        )?;
        let Some((db_mtime, db_size, db_hash)) = row else {
            return Ok(true);
        };

        if db_mtime != mtime_ns || db_size != size_bytes {
            return Ok(true);
        }
        if use_hash {
            return Ok(content_hash(vault, id)? != db_hash);
        }
        Ok(false)
    }

    /// Parse one note and replace all its rows inside a single immediate
    /// transaction.
    fn index_note(&self, vault: &Vault, id: &str, use_hash: bool) -> Result<()> {
        let record = load_record(vault, id, use_hash)?;
        self.rt.block_on(async {
            let mut conn = self.pool.acquire().await?;
            sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
            match write_note(&mut conn, &record).await {
                Ok(()) => {
                    sqlx::query("COMMIT").execute(&mut *conn).await?;
                    Ok(())
                }
                Err(e) => {
                    let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                    Err(e)
                }
            }
        })
    }

    /// Drop every row belonging to `id`. Foreign keys cascade blocks,
    /// links and kv; the fts row is removed explicitly.
    fn remove_note(&self, id: &str) -> Result<()> {
        self.rt.block_on(async {
            let mut tx = self.pool.begin().await?;
            sqlx::query("DELETE FROM notes WHERE id = ?1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM fts WHERE id = ?1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            Ok(())
        })
    }

    fn compact(&self) -> Result<()> {
        self.rt.block_on(async {
            sqlx::query("VACUUM").execute(&self.pool).await?;
            sqlx::query("ANALYZE").execute(&self.pool).await?;
            Ok(())
        })
    }
}

fn load_record(vault: &Vault, id: &str, use_hash: bool) -> Result<NoteRecord> {
    let note = vault
        .get(id)?
        .ok_or_else(|| crate::error::Error::NotFound(id.to_string()))?;
    let (mtime_ns, size_bytes) = vault
        .file_stats(id)
        .ok_or_else(|| crate::error::Error::NotFound(id.to_string()))?;
    let hash = if use_hash { content_hash(vault, id)? } else { None };
    let title = extract_title(&note);
    let has_math = detect_math(&note.body.raw);
    Ok(NoteRecord {
        note,
        mtime_ns,
        size_bytes,
        hash,
        title,
        has_math,
    })
}

async fn write_note(conn: &mut PoolConnection<Sqlite>, record: &NoteRecord) -> Result<()> {
    let id = &record.note.id;

    sqlx::query(
        "INSERT INTO notes (id, mtime_ns, size_bytes, hash, title, has_math)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(id) DO UPDATE SET
             mtime_ns = excluded.mtime_ns,
             size_bytes = excluded.size_bytes,
             hash = excluded.hash,
             title = excluded.title,
             has_math = excluded.has_math",
    )
    .bind(id)
    .bind(record.mtime_ns)
    .bind(record.size_bytes)
    .bind(&record.hash)
    .bind(&record.title)
    .bind(record.has_math as i64)
    .execute(&mut **conn)
    .await?;

    sqlx::query("DELETE FROM blocks WHERE note_id = ?1")
        .bind(id)
        .execute(&mut **conn)
        .await?;
    sqlx::query("DELETE FROM links WHERE src = ?1")
        .bind(id)
        .execute(&mut **conn)
        .await?;
    sqlx::query("DELETE FROM kv WHERE note_id = ?1")
        .bind(id)
        .execute(&mut **conn)
        .await?;

    for block in &record.note.body.blocks {
        sqlx::query(
            "INSERT INTO blocks (note_id, kind, start, end, level, slug, label)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(id)
        .bind(block.kind.as_str())
        .bind(block.range.start as i64)
        .bind(block.range.end as i64)
        .bind(block.heading_level.map(i64::from))
        .bind(&block.heading_slug)
        .bind(block.label_name())
        .execute(&mut **conn)
        .await?;
    }

    for link in &record.note.body.links {
        let (anchor_kind, anchor_value) = match &link.target.anchor {
            Some(crate::note::Anchor::Heading { slug }) => (Some("heading"), Some(slug.as_str())),
            Some(crate::note::Anchor::Block { label }) => (Some("block"), Some(label.as_str())),
            None => (None, None),
        };
        sqlx::query(
            "INSERT INTO links (src, dst, start, end, rel, anchor_kind, anchor_value)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(id)
        .bind(&link.target.id)
        .bind(link.range.start as i64)
        .bind(link.range.end as i64)
        .bind(&link.target.rel)
        .bind(anchor_kind)
        .bind(anchor_value)
        .execute(&mut **conn)
        .await?;
    }

    for alias in record.note.aliases() {
        sqlx::query("INSERT INTO kv (note_id, key, value) VALUES (?1, 'core/alias', ?2)")
            .bind(id)
            .bind(alias)
            .execute(&mut **conn)
            .await?;
    }

    sqlx::query("DELETE FROM fts WHERE id = ?1")
        .bind(id)
        .execute(&mut **conn)
        .await?;
    sqlx::query("INSERT INTO fts (id, body, title) VALUES (?1, ?2, ?3)")
        .bind(id)
        .bind(&record.note.body.raw)
        .bind(&record.title)
        .execute(&mut **conn)
        .await?;

    Ok(())
}

fn content_hash(vault: &Vault, id: &str) -> Result<Option<String>> {
    let Some(raw) = vault.read_raw(id)? else {
        return Ok(None);
    };
    let digest = Sha256::digest(raw.as_bytes());
    Ok(Some(format!("{digest:x}")))
}

/// Title heuristic, first hit wins: `core/title` header key, legacy
/// `title` key, first heading's text, first non-empty body line that is
/// not a `---` delimiter, empty string.
fn extract_title(note: &Note) -> String {
    for key in ["core/title", "title"] {
        if let Some(value) = note.meta.get(key) {
            if let Some(title) = scalar_string(value) {
                return title;
            }
        }
    }

    for block in &note.body.blocks {
        if block.kind == BlockKind::Heading {
            if let Some(text) = &block.heading_text {
                return text.clone();
            }
        }
    }

    for line in note.body.raw.lines() {
        let trimmed = line.trim();
        if !trimmed.is_empty() && !trimmed.starts_with("---") {
            return trimmed.to_string();
        }
    }

    String::new()
}

fn scalar_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// A note "has math" when it contains a `$` not escaped by a backslash.
fn detect_math(body: &str) -> bool {
    let mut prev = '\0';
    for c in body.chars() {
        if c == '$' && prev != '\\' {
            return true;
        }
        prev = c;
    }
    false
}
