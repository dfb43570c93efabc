//! Rollback: replay an import manifest in reverse.

use std::fs;
use std::path::Path;

use super::import::{ImportManifest, ManifestAction};
use crate::error::Result;

/// Undo the operations a manifest records, newest first. With `dry_run`
/// the planned operations are logged and nothing is touched.
pub fn rollback_import(manifest: &ImportManifest, dry_run: bool) -> Result<usize> {
    let mut undone = 0;

    for entry in manifest.entries.iter().rev() {
        let dst = Path::new(&entry.dst);
        match entry.action {
            ManifestAction::Create | ManifestAction::Copy => {
                if dry_run {
                    tracing::info!(dst = %dst.display(), "would remove");
                } else if dst.exists() {
                    fs::remove_file(dst)?;
                }
                if let Some(backup) = &entry.backup {
                    let backup = Path::new(backup);
                    if dry_run {
                        tracing::info!(backup = %backup.display(), "would restore backup");
                    } else if backup.exists() {
                        fs::rename(backup, dst)?;
                    }
                }
                undone += 1;
            }
            ManifestAction::Move => {
                let Some(src) = &entry.src else { continue };
                let src = Path::new(src);
                if dry_run {
                    tracing::info!(dst = %dst.display(), src = %src.display(), "would move back");
                } else if dst.exists() {
                    if let Some(parent) = src.parent() {
                        fs::create_dir_all(parent)?;
                    }
                    fs::rename(dst, src)?;
                }
                undone += 1;
            }
        }
    }
    Ok(undone)
}
