//! Read surface: links, blocks, aliases, orphans, graph export.

use serde::Serialize;
use sqlx::Row;

use super::Store;
use crate::error::Result;
use crate::note::{Anchor, Block, BlockKind, BlockLabel, Link, LinkTarget, NoteId, Range};

#[derive(Debug, Clone, Serialize)]
pub struct GraphNode {
    pub id: NoteId,
    pub title: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphEdge {
    pub source: NoteId,
    pub target: NoteId,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphData {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub notes: i64,
    pub links: i64,
    pub blocks: i64,
    pub aliases: i64,
    pub schema_version: i64,
}

fn anchor_from_columns(kind: Option<String>, value: Option<String>) -> Option<Anchor> {
    match (kind.as_deref(), value) {
        (Some("heading"), Some(slug)) => Some(Anchor::Heading { slug }),
        (Some("block"), Some(label)) => Some(Anchor::Block { label }),
        _ => None,
    }
}

impl Store {
    pub fn note_exists(&self, id: &str) -> Result<bool> {
        let row: Option<(i64,)> = self.rt.block_on(
            sqlx::query_as("SELECT 1 FROM notes WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool),
        )?;
        Ok(row.is_some())
    }

    pub fn note_ids(&self) -> Result<Vec<NoteId>> {
        let rows: Vec<(String,)> = self.rt.block_on(
            sqlx::query_as("SELECT id FROM notes ORDER BY id").fetch_all(&self.pool),
        )?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    pub fn note_count(&self) -> Result<i64> {
        let (count,): (i64,) = self
            .rt
            .block_on(sqlx::query_as("SELECT count(*) FROM notes").fetch_one(&self.pool))?;
        Ok(count)
    }

    /// Indexed title of a note, if any.
    pub fn title(&self, id: &str) -> Result<Option<String>> {
        let row: Option<(Option<String>,)> = self.rt.block_on(
            sqlx::query_as("SELECT title FROM notes WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool),
        )?;
        Ok(row.and_then(|(t,)| t))
    }

    /// Outgoing links, sorted by source position.
    pub fn links_out(&self, id: &str) -> Result<Vec<Link>> {
        let rows = self.rt.block_on(
            sqlx::query(
                "SELECT dst, start, end, rel, anchor_kind, anchor_value
                 FROM links WHERE src = ?1 ORDER BY start",
            )
            .bind(id)
            .fetch_all(&self.pool),
        )?;
        Ok(rows
            .into_iter()
            .map(|row| Link {
                source: id.to_string(),
                target: LinkTarget {
                    id: row.get(0),
                    anchor: anchor_from_columns(row.get(4), row.get(5)),
                    rel: row.get(3),
                    title_text: None,
                },
                range: Range::new(row.get::<i64, _>(1) as usize, row.get::<i64, _>(2) as usize),
            })
            .collect())
    }

    /// Incoming links, sorted by `(src, start)`.
    pub fn links_in(&self, id: &str) -> Result<Vec<Link>> {
        let rows = self.rt.block_on(
            sqlx::query(
                "SELECT src, start, end, rel, anchor_kind, anchor_value
                 FROM links WHERE dst = ?1 ORDER BY src, start",
            )
            .bind(id)
            .fetch_all(&self.pool),
        )?;
        Ok(rows
            .into_iter()
            .map(|row| Link {
                source: row.get(0),
                target: LinkTarget {
                    id: id.to_string(),
                    anchor: anchor_from_columns(row.get(4), row.get(5)),
                    rel: row.get(3),
                    title_text: None,
                },
                range: Range::new(row.get::<i64, _>(1) as usize, row.get::<i64, _>(2) as usize),
            })
            .collect())
    }

    /// Stored blocks of a note, sorted by start. Heading text is not
    /// denormalized; callers needing it load the note.
    pub fn blocks(&self, id: &str) -> Result<Vec<Block>> {
        let rows = self.rt.block_on(
            sqlx::query(
                "SELECT kind, start, end, level, slug, label
                 FROM blocks WHERE note_id = ?1 ORDER BY start",
            )
            .bind(id)
            .fetch_all(&self.pool),
        )?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let kind: String = row.get(0);
                Block {
                    kind: kind.parse().unwrap_or(BlockKind::Other),
                    range: Range::new(
                        row.get::<i64, _>(1) as usize,
                        row.get::<i64, _>(2) as usize,
                    ),
                    label: row
                        .get::<Option<String>, _>(5)
                        .map(|name| BlockLabel { name }),
                    heading_text: None,
                    heading_level: row.get::<Option<i64>, _>(3).map(|l| l as u8),
                    heading_slug: row.get(4),
                    fence_info: None,
                }
            })
            .collect())
    }

    /// Does the note carry a block with this label?
    pub fn has_block_label(&self, id: &str, label: &str) -> Result<bool> {
        let row: Option<(i64,)> = self.rt.block_on(
            sqlx::query_as("SELECT 1 FROM blocks WHERE note_id = ?1 AND label = ?2 LIMIT 1")
                .bind(id)
                .bind(label)
                .fetch_optional(&self.pool),
        )?;
        Ok(row.is_some())
    }

    /// Does the note carry a heading with this slug?
    pub fn has_heading_slug(&self, id: &str, slug: &str) -> Result<bool> {
        let row: Option<(i64,)> = self.rt.block_on(
            sqlx::query_as(
                "SELECT 1 FROM blocks WHERE note_id = ?1 AND kind = 'heading' AND slug = ?2 LIMIT 1",
            )
            .bind(id)
            .bind(slug)
            .fetch_optional(&self.pool),
        )?;
        Ok(row.is_some())
    }

    /// Notes that appear in no link at all, neither as source nor target.
    pub fn orphans(&self) -> Result<Vec<NoteId>> {
        let rows: Vec<(String,)> = self.rt.block_on(
            sqlx::query_as(
                "SELECT id FROM notes
                 WHERE id NOT IN (SELECT src FROM links)
                   AND id NOT IN (SELECT dst FROM links)
                 ORDER BY id",
            )
            .fetch_all(&self.pool),
        )?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Whole-vault graph with deduplicated edges, for export and the
    /// `graph` command.
    pub fn graph_data(&self) -> Result<GraphData> {
        self.rt.block_on(async {
            let nodes: Vec<(String, Option<String>)> =
                sqlx::query_as("SELECT id, title FROM notes ORDER BY id")
                    .fetch_all(&self.pool)
                    .await?;
            let edges: Vec<(String, String)> =
                sqlx::query_as("SELECT DISTINCT src, dst FROM links ORDER BY src, dst")
                    .fetch_all(&self.pool)
                    .await?;
            Ok(GraphData {
                nodes: nodes
                    .into_iter()
                    .map(|(id, title)| GraphNode {
                        id,
                        title: title.unwrap_or_default(),
                    })
                    .collect(),
                edges: edges
                    .into_iter()
                    .map(|(source, target)| GraphEdge { source, target })
                    .collect(),
            })
        })
    }

    /// Ids whose indexed title equals `text` exactly.
    pub fn ids_with_title(&self, text: &str) -> Result<Vec<NoteId>> {
        let rows: Vec<(String,)> = self.rt.block_on(
            sqlx::query_as("SELECT id FROM notes WHERE title = ?1 ORDER BY id")
                .bind(text)
                .fetch_all(&self.pool),
        )?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Ids carrying `text` as a `core/alias`.
    pub fn ids_with_alias(&self, text: &str) -> Result<Vec<NoteId>> {
        let rows: Vec<(String,)> = self.rt.block_on(
            sqlx::query_as(
                "SELECT DISTINCT note_id FROM kv
                 WHERE key = 'core/alias' AND value = ?1 ORDER BY note_id",
            )
            .bind(text)
            .fetch_all(&self.pool),
        )?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// All values stored for `(note_id, key)`.
    pub fn kv_get(&self, id: &str, key: &str) -> Result<Vec<String>> {
        let rows: Vec<(Option<String>,)> = self.rt.block_on(
            sqlx::query_as("SELECT value FROM kv WHERE note_id = ?1 AND key = ?2")
                .bind(id)
                .bind(key)
                .fetch_all(&self.pool),
        )?;
        Ok(rows.into_iter().filter_map(|(v,)| v).collect())
    }

    /// True when any indexed note contains math.
    pub fn any_math(&self) -> Result<bool> {
        let (found,): (i64,) = self.rt.block_on(
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM notes WHERE has_math = 1)")
                .fetch_one(&self.pool),
        )?;
        Ok(found != 0)
    }

    pub fn stats(&self) -> Result<IndexStats> {
        let notes = self.note_count()?;
        let (links,): (i64,) = self
            .rt
            .block_on(sqlx::query_as("SELECT count(*) FROM links").fetch_one(&self.pool))?;
        let (blocks,): (i64,) = self
            .rt
            .block_on(sqlx::query_as("SELECT count(*) FROM blocks").fetch_one(&self.pool))?;
        let (aliases,): (i64,) = self.rt.block_on(
            sqlx::query_as("SELECT count(*) FROM kv WHERE key = 'core/alias'")
                .fetch_one(&self.pool),
        )?;
        Ok(IndexStats {
            notes,
            links,
            blocks,
            aliases,
            schema_version: self.schema_version()?,
        })
    }
}
