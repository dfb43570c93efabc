//! Vault: the flat directory of `<id>.md` files that is the source of
//! truth. Composes the header codec and the parser; the index only ever
//! shadows what lives here.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::note::{Note, NoteId};
use crate::slug::is_valid_id;
use crate::{header, parser};

/// Default note file extension.
pub const NOTE_EXT: &str = "md";

#[derive(Debug, Clone)]
pub struct Vault {
    root: PathBuf,
}

impl Vault {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Vault { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of a note file (whether or not it exists).
    pub fn note_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}.{NOTE_EXT}"))
    }

    /// Raw file contents, `None` if the note does not exist.
    pub fn read_raw(&self, id: &str) -> Result<Option<String>> {
        if !is_valid_id(id) {
            return Err(Error::InvalidId(id.to_string()));
        }
        match fs::read_to_string(self.note_path(id)) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Load and parse a note: raw → header split → body parse.
    pub fn get(&self, id: &str) -> Result<Option<Note>> {
        let Some(raw) = self.read_raw(id)? else {
            return Ok(None);
        };
        let (meta, body_text) = header::decode(&raw)?;
        let id = id.to_string();
        let body = parser::parse(&body_text, &id);
        Ok(Some(Note { id, meta, body }))
    }

    /// Encode and write a note atomically (temp file + rename), so a reader
    /// never observes a partially written file.
    pub fn put(&self, note: &Note) -> Result<()> {
        let contents = header::encode(&note.meta, &note.body.raw)?;
        self.write_raw(&note.id, &contents)
    }

    /// Atomic raw write; creates the vault directory on first use.
    pub fn write_raw(&self, id: &str, contents: &str) -> Result<()> {
        if !is_valid_id(id) {
            return Err(Error::InvalidId(id.to_string()));
        }
        fs::create_dir_all(&self.root)?;
        let tmp = tempfile::NamedTempFile::new_in(&self.root)?;
        fs::write(tmp.path(), contents)?;
        tmp.persist(self.note_path(id))
            .map_err(|e| Error::Io(e.error))?;
        Ok(())
    }

    /// Remove a note file; `NotFound` if it does not exist.
    pub fn delete(&self, id: &str) -> Result<()> {
        match fs::remove_file(self.note_path(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// All note ids in the vault, sorted. Stems that are not well-formed
    /// ids are skipped.
    pub fn list_ids(&self) -> Result<Vec<NoteId>> {
        let mut ids = Vec::new();
        let entries = match fs::read_dir(&self.root) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ids),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(NOTE_EXT) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if is_valid_id(stem) && entry.file_type()?.is_file() {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// `(mtime_ns, size_bytes)` of the note file, `None` if absent.
    pub fn file_stats(&self, id: &str) -> Option<(i64, i64)> {
        let meta = fs::metadata(self.note_path(id)).ok()?;
        let mtime_ns = meta
            .modified()
            .ok()?
            .duration_since(std::time::UNIX_EPOCH)
            .ok()?
            .as_nanos() as i64;
        Some((mtime_ns, meta.len() as i64))
    }
}
