//! Schema migrations.
//!
//! `meta.schema_version` is read at open; version 0 (no `meta` table yet)
//! gets the full current schema, older versions are stepped forward one
//! migration at a time. The whole upgrade commits as a single transaction.
//!
//! Adding a migration:
//! 1. bump `CURRENT_SCHEMA_VERSION` in `mod.rs`
//! 2. add a `migrate_vN_to_vM` function and its arm in `migrate`
//! 3. update `schema.sql` to the new current shape

use sqlx::{SqliteConnection, SqlitePool};

use super::CURRENT_SCHEMA_VERSION;
use crate::error::{Error, Result};

/// Bring the schema from `from` up to [`CURRENT_SCHEMA_VERSION`].
pub(crate) async fn migrate(pool: &SqlitePool, from: i64) -> Result<()> {
    let mut tx = pool.begin().await?;

    let mut version = from;
    while version < CURRENT_SCHEMA_VERSION {
        match version {
            // Fresh database: create the current schema outright.
            0 => {
                init_schema(&mut tx).await?;
                version = CURRENT_SCHEMA_VERSION;
            }
            1 => {
                migrate_v1_to_v2(&mut tx).await?;
                version = 2;
            }
            other => {
                return Err(Error::Corruption(format!(
                    "no migration path from schema v{other}"
                )))
            }
        }
    }

    sqlx::query(
        "INSERT INTO meta(key, value) VALUES('schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(CURRENT_SCHEMA_VERSION.to_string())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

async fn init_schema(conn: &mut SqliteConnection) -> Result<()> {
    let schema = include_str!("schema.sql");
    for statement in split_statements(schema) {
        sqlx::query(&statement).execute(&mut *conn).await?;
    }
    Ok(())
}

/// v1 keyed `kv` on `(note_id, key)`, which cannot hold one row per alias.
/// Rebuild it without the primary key; rows are repopulated on the next
/// reindex. Idempotent: `DROP TABLE IF EXISTS` plus `IF NOT EXISTS` creates.
async fn migrate_v1_to_v2(conn: &mut SqliteConnection) -> Result<()> {
    sqlx::query("DROP TABLE IF EXISTS kv").execute(&mut *conn).await?;
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS kv (
            note_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT,
            FOREIGN KEY (note_id) REFERENCES notes(id) ON DELETE CASCADE
        )",
    )
    .execute(&mut *conn)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS kv_note_key_idx ON kv(note_id, key)")
        .execute(&mut *conn)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS kv_key_value_idx ON kv(key, value)")
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Split `schema.sql` into executable statements, dropping comment-only
/// fragments.
fn split_statements(schema: &str) -> Vec<String> {
    schema
        .split(';')
        .map(|stmt| {
            stmt.lines()
                .filter(|line| !line.trim().starts_with("--"))
                .collect::<Vec<_>>()
                .join("\n")
                .trim()
                .to_string()
        })
        .filter(|stmt| !stmt.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_splits_into_statements() {
        let stmts = split_statements(include_str!("schema.sql"));
        assert!(stmts.len() >= 10);
        assert!(stmts.iter().all(|s| !s.contains("--")));
        assert!(stmts.iter().any(|s| s.contains("CREATE VIRTUAL TABLE")));
    }
}
