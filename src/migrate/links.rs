//! Link rewriting: convert title/path-based references into id-based ones.
//!
//! Pure text transformations; unresolved references are preserved verbatim
//! and reported, never dropped.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::resolve::{resolve_target, Prefer, Resolution, ResolveMode};
use crate::error::Result;
use crate::slug::is_valid_id;
use crate::store::Store;
use crate::vault::NOTE_EXT;

static WIKI_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(!?)\[\[([^\[\]]+?)\]\]").expect("wiki regex"));
static MD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").expect("md link regex"));

/// Result of rewriting one note's text.
#[derive(Debug, Clone)]
pub struct LinkRewrite {
    pub text: String,
    pub changes: usize,
    pub unresolved: Vec<String>,
}

/// Rewrite `[[Title]]`, `[[Title|Show]]`, `[[Title#Anchor]]`, `![[Title]]`
/// to id-based form. Targets that already are known ids pass through
/// untouched.
pub fn rewrite_wiki_links(
    text: &str,
    store: &Store,
    mode: ResolveMode,
    prefer: Prefer,
) -> Result<LinkRewrite> {
    let mut changes = 0;
    let mut unresolved = Vec::new();
    let mut failure = None;

    let out = WIKI_RE.replace_all(text, |caps: &Captures<'_>| {
        let bang = &caps[1];
        let inner = &caps[2];

        let (target_part, display) = match inner.split_once('|') {
            Some((t, d)) => (t, Some(d)),
            None => (inner, None),
        };
        let (name, anchor) = match target_part.split_once('#') {
            Some((n, a)) => (n.trim(), Some(a)),
            None => (target_part.trim(), None),
        };

        // Already id-based: leave alone.
        if is_valid_id(name) {
            match store.note_exists(name) {
                Ok(true) => return caps[0].to_string(),
                Ok(false) => {}
                Err(e) => {
                    failure.get_or_insert(e);
                    return caps[0].to_string();
                }
            }
        }

        let id = match resolve_target(store, name, mode, prefer) {
            Ok(Resolution::Found(id)) => id,
            Ok(Resolution::NotFound) => {
                unresolved.push(format!("'{name}' not found"));
                return caps[0].to_string();
            }
            Ok(Resolution::Ambiguous(candidates)) => {
                unresolved.push(format!(
                    "'{name}' is ambiguous ({})",
                    candidates.join(", ")
                ));
                return caps[0].to_string();
            }
            Err(e) => {
                failure.get_or_insert(e);
                return caps[0].to_string();
            }
        };

        changes += 1;
        let mut rebuilt = format!("{bang}[[{id}");
        if let Some(anchor) = anchor {
            rebuilt.push('#');
            rebuilt.push_str(anchor);
        }
        if let Some(display) = display {
            rebuilt.push('|');
            rebuilt.push_str(display);
        }
        rebuilt.push_str("]]");
        rebuilt
    });
    let out = out.into_owned();

    if let Some(e) = failure {
        return Err(e);
    }
    Ok(LinkRewrite {
        text: out,
        changes,
        unresolved,
    })
}

/// Rewrite `[Text](relative/path.md#anchor)` to `[Text](id#anchor)`.
///
/// Paths resolve relative to the containing file (or the vault root for
/// absolute-style `/…` paths) and are accepted only when the stem is a
/// known id. External schemes pass through.
pub fn rewrite_path_links(
    text: &str,
    store: &Store,
    vault_root: &Path,
    file_path: &Path,
) -> Result<LinkRewrite> {
    let mut changes = 0;
    let mut unresolved = Vec::new();
    let mut failure = None;

    let out = MD_RE.replace_all(text, |caps: &Captures<'_>| {
        let label = &caps[1];
        let href = &caps[2];

        if href.starts_with("http://")
            || href.starts_with("https://")
            || href.starts_with("mailto:")
            || href.starts_with("ftp://")
        {
            return caps[0].to_string();
        }

        let (path_part, anchor) = match href.split_once('#') {
            Some((p, a)) => (p, Some(a)),
            None => (href, None),
        };

        let resolved = match path_part.strip_prefix('/') {
            Some(rooted) => vault_root.join(rooted),
            None => file_path
                .parent()
                .unwrap_or_else(|| Path::new(""))
                .join(path_part),
        };

        if resolved.extension().and_then(|e| e.to_str()) != Some(NOTE_EXT) {
            return caps[0].to_string();
        }
        let Some(stem) = resolved.file_stem().and_then(|s| s.to_str()) else {
            return caps[0].to_string();
        };

        match store.note_exists(stem) {
            Ok(true) => {}
            Ok(false) => {
                unresolved.push(format!("'{stem}' not in index (from path {path_part})"));
                return caps[0].to_string();
            }
            Err(e) => {
                failure.get_or_insert(e);
                return caps[0].to_string();
            }
        }

        changes += 1;
        match anchor {
            Some(anchor) => format!("[{label}]({stem}#{anchor})"),
            None => format!("[{label}]({stem})"),
        }
    });
    let out = out.into_owned();

    if let Some(e) = failure {
        return Err(e);
    }
    Ok(LinkRewrite {
        text: out,
        changes,
        unresolved,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LinkFormat {
    Wiki,
    Md,
    #[default]
    Mixed,
}

/// Run the requested rewrites over one note's text.
pub fn migrate_note_links(
    text: &str,
    store: &Store,
    vault_root: &Path,
    file_path: &Path,
    from: LinkFormat,
    mode: ResolveMode,
    prefer: Prefer,
) -> Result<LinkRewrite> {
    let mut current = text.to_string();
    let mut changes = 0;
    let mut unresolved = Vec::new();

    if matches!(from, LinkFormat::Wiki | LinkFormat::Mixed) {
        let pass = rewrite_wiki_links(&current, store, mode, prefer)?;
        current = pass.text;
        changes += pass.changes;
        unresolved.extend(pass.unresolved);
    }
    if matches!(from, LinkFormat::Md | LinkFormat::Mixed) {
        let pass = rewrite_path_links(&current, store, vault_root, file_path)?;
        current = pass.text;
        changes += pass.changes;
        unresolved.extend(pass.unresolved);
    }

    Ok(LinkRewrite {
        text: current,
        changes,
        unresolved,
    })
}
