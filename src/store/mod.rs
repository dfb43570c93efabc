//! Durable index: a SQLite cache of parsed note state, colocated with the
//! vault. Deleting the file is always safe; `rebuild` reconstructs it.
//!
//! sqlx is async; the store wraps it behind synchronous methods with an
//! owned runtime so the rest of the crate stays blocking. Each `Store` owns
//! a small pool: readers take their own connections, writers serialize on
//! SQLite's write lock.
//!
//! ## Module structure
//!
//! - `migrations` — versioned schema setup and upgrades
//! - `rebuild` — change detection, per-note upsert, incremental rebuild
//! - `queries` — links/blocks/graph/alias read surface
//! - `search` — FTS5 query and snippet

mod migrations;
mod queries;
mod rebuild;
mod search;

pub use queries::{GraphData, GraphEdge, GraphNode, IndexStats};
pub use rebuild::{RebuildCounts, RebuildOptions, UpdateCounts};

use std::fs;
use std::path::{Path, PathBuf};

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tokio::runtime::Runtime;

use crate::error::{Error, Result};

/// Write-lock wait before an operation fails with `Busy`.
pub const BUSY_TIMEOUT_MS: u64 = 3000;

/// Current schema version, stored under `meta.schema_version`.
///
/// History:
/// - v1: single value per kv key (PRIMARY KEY (note_id, key))
/// - v2: kv allows repeated keys; one row per alias
pub const CURRENT_SCHEMA_VERSION: i64 = 2;

pub struct Store {
    pub(crate) pool: SqlitePool,
    pub(crate) rt: Runtime,
    path: PathBuf,
}

impl Store {
    /// Open (and if needed create or migrate) the index at `path`.
    ///
    /// A file that does not read as a SQLite database is renamed to a
    /// timestamped `.bad-*` sibling and a fresh index is created in its
    /// place; the vault remains the source of truth either way.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let rt = Runtime::new()?;

        let pool = match Self::connect(&rt, path) {
            Ok(pool) => pool,
            Err(e) if is_corrupt(&e) => {
                let backup = backup_path(path);
                tracing::warn!(
                    path = %path.display(),
                    backup = %backup.display(),
                    "index unreadable; moving aside and starting fresh"
                );
                fs::rename(path, &backup)?;
                Self::connect(&rt, path)?
            }
            Err(e) => return Err(e),
        };

        let store = Store {
            pool,
            rt,
            path: path.to_path_buf(),
        };
        store.ensure_schema()?;
        Ok(store)
    }

    fn connect(rt: &Runtime, path: &Path) -> Result<SqlitePool> {
        // Forward slashes for URL compatibility (Windows paths).
        let path_str = path.to_string_lossy().replace('\\', "/");
        let url = format!("sqlite://{path_str}?mode=rwc");

        let pool = rt.block_on(async {
            let pool = SqlitePoolOptions::new()
                .max_connections(4)
                .after_connect(|conn, _meta| {
                    Box::pin(async move {
                        sqlx::query("PRAGMA foreign_keys = ON")
                            .execute(&mut *conn)
                            .await?;
                        // WAL: concurrent readers, single writer.
                        sqlx::query("PRAGMA journal_mode = WAL")
                            .execute(&mut *conn)
                            .await?;
                        sqlx::query(&format!("PRAGMA busy_timeout = {BUSY_TIMEOUT_MS}"))
                            .execute(&mut *conn)
                            .await?;
                        // fsync on WAL checkpoint only; safe under WAL.
                        sqlx::query("PRAGMA synchronous = NORMAL")
                            .execute(&mut *conn)
                            .await?;
                        sqlx::query("PRAGMA temp_store = MEMORY")
                            .execute(&mut *conn)
                            .await?;
                        Ok(())
                    })
                })
                .connect(&url)
                .await?;
            // Probe so an unreadable file header fails here, not on first use.
            sqlx::query("SELECT count(*) FROM sqlite_master")
                .execute(&pool)
                .await?;
            Ok::<_, Error>(pool)
        })?;
        Ok(pool)
    }

    /// Read `meta.schema_version` (absent table or row counts as 0) and run
    /// migrations up to [`CURRENT_SCHEMA_VERSION`].
    fn ensure_schema(&self) -> Result<()> {
        self.rt.block_on(async {
            let version = current_version(&self.pool).await?;
            if version > CURRENT_SCHEMA_VERSION {
                return Err(Error::SchemaNewer(version, CURRENT_SCHEMA_VERSION));
            }
            if version < CURRENT_SCHEMA_VERSION {
                migrations::migrate(&self.pool, version).await?;
                tracing::info!(from = version, to = CURRENT_SCHEMA_VERSION, "index schema ready");
            }
            Ok(())
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored schema version, for `stats`.
    pub fn schema_version(&self) -> Result<i64> {
        self.rt.block_on(current_version(&self.pool))
    }
}

async fn current_version(pool: &SqlitePool) -> Result<i64> {
    let has_meta: Option<(String,)> = sqlx::query_as(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'meta'",
    )
    .fetch_optional(pool)
    .await?;
    if has_meta.is_none() {
        return Ok(0);
    }
    let row: Option<(String,)> =
        sqlx::query_as("SELECT value FROM meta WHERE key = 'schema_version'")
            .fetch_optional(pool)
            .await?;
    Ok(row.and_then(|(v,)| v.parse().ok()).unwrap_or(0))
}

fn backup_path(path: &Path) -> PathBuf {
    let ts = chrono::Utc::now().timestamp();
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("index");
    path.with_file_name(format!("{stem}.bad-{ts}.sqlite"))
}

fn is_corrupt(e: &Error) -> bool {
    let Error::Db(sqlx::Error::Database(db)) = e else {
        return false;
    };
    // SQLITE_NOTADB (26) / SQLITE_CORRUPT (11), or sqlite's message for an
    // unreadable file header.
    matches!(db.code().as_deref(), Some("26") | Some("11"))
        || db.message().contains("file is not a database")
        || db.message().contains("malformed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_fresh_index() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join(".zkn/index.sqlite");
        let store = Store::open(&db).unwrap();
        assert_eq!(store.schema_version().unwrap(), CURRENT_SCHEMA_VERSION);
        assert!(db.exists());
    }

    #[test]
    fn reopen_keeps_schema_version() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("index.sqlite");
        drop(Store::open(&db).unwrap());
        let store = Store::open(&db).unwrap();
        assert_eq!(store.schema_version().unwrap(), CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn corrupt_file_is_backed_up_and_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("index.sqlite");
        std::fs::write(&db, "this is not a sqlite file, not even close").unwrap();

        let store = Store::open(&db).unwrap();
        assert_eq!(store.schema_version().unwrap(), CURRENT_SCHEMA_VERSION);

        let backups: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".bad-"))
            .collect();
        assert_eq!(backups.len(), 1);
    }

    #[test]
    fn newer_schema_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("index.sqlite");
        {
            let store = Store::open(&db).unwrap();
            store
                .rt
                .block_on(
                    sqlx::query("UPDATE meta SET value = '99' WHERE key = 'schema_version'")
                        .execute(&store.pool),
                )
                .unwrap();
        }
        assert!(matches!(Store::open(&db), Err(Error::SchemaNewer(99, _))));
    }
}
