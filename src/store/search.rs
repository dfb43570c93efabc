//! Full-text search over the `fts` virtual table.

use super::Store;
use crate::error::{Error, Result};
use crate::note::NoteId;

impl Store {
    /// FTS5 match, best rank first.
    ///
    /// An empty `fts` table is reported as [`Error::EmptyIndex`] so callers
    /// can suggest a reindex instead of showing silent empty results.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<NoteId>> {
        self.rt.block_on(async {
            let (count,): (i64,) = sqlx::query_as("SELECT count(*) FROM fts")
                .fetch_one(&self.pool)
                .await?;
            if count == 0 {
                return Err(Error::EmptyIndex);
            }

            let rows: Vec<(String,)> = sqlx::query_as(
                "SELECT id FROM fts WHERE fts MATCH ?1 ORDER BY rank LIMIT ?2",
            )
            .bind(query)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows.into_iter().map(|(id,)| id).collect())
        })
    }

    /// Highlighted context for one match: literal `<b>`/`</b>` around hits,
    /// up to 64 tokens of surrounding body.
    pub fn snippet(&self, id: &str, query: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = self.rt.block_on(
            sqlx::query_as(
                "SELECT snippet(fts, 1, '<b>', '</b>', ' \u{2026} ', 64)
                 FROM fts WHERE id = ?1 AND fts MATCH ?2",
            )
            .bind(id)
            .bind(query)
            .fetch_optional(&self.pool),
        )?;
        Ok(row.map(|(s,)| s))
    }
}
