//! Note-level commands: create, show, edit, remove, list, yank, locate.

use anyhow::{Context, Result};
use colored::Colorize;

use zkn::note::{Anchor, Meta, Note, NoteId, Range};
use zkn::slicer::slice_by_anchor;
use zkn::{parser, slug};

use crate::cli::{App, EXIT_OK, EXIT_RECOVERABLE};

/// Split `id`, `id#slug`, `id#^label`.
fn parse_ref(reference: &str) -> (&str, Option<Anchor>) {
    match reference.split_once('#') {
        Some((id, anchor)) => (id, Some(Anchor::from_ref(anchor))),
        None => (reference, None),
    }
}

fn editor() -> std::process::Command {
    let editor = std::env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());
    std::process::Command::new(editor)
}

pub(crate) fn cmd_id(app: &App) -> Result<i32> {
    println!("{}", slug::new_id(app.config.id.bytes));
    Ok(EXIT_OK)
}

pub(crate) fn cmd_new(
    app: &App,
    title: Option<&str>,
    meta_args: &[String],
    edit: bool,
) -> Result<i32> {
    let vault = app.vault();
    let id: NoteId = slug::new_id(app.config.id.bytes);

    let mut meta = Meta::new();
    meta.insert("id".into(), id.as_str().into());
    if let Some(title) = title {
        meta.insert("core/title".into(), title.into());
    }
    for kv in meta_args {
        let (key, value) = kv
            .split_once('=')
            .with_context(|| format!("--meta '{kv}' is not key=value"))?;
        meta.insert(key.trim().into(), value.trim().into());
    }

    let body_text = match title {
        Some(title) => format!("# {title}\n\n"),
        None => String::new(),
    };
    let note = Note {
        body: parser::parse(&body_text, &id),
        id: id.clone(),
        meta,
    };
    vault.put(&note)?;

    if !app.quiet {
        println!("{id}");
    }

    if edit {
        editor().arg(vault.note_path(&id)).status()?;
    }
    Ok(EXIT_OK)
}

pub(crate) fn cmd_show(app: &App, reference: &str) -> Result<i32> {
    let (id, _) = parse_ref(reference);
    let Some(note) = app.vault().get(id)? else {
        eprintln!("note '{id}' not found");
        return Ok(EXIT_RECOVERABLE);
    };
    print!("{}", note.body.raw);
    Ok(EXIT_OK)
}

pub(crate) fn cmd_edit(app: &App, id: &str) -> Result<i32> {
    let vault = app.vault();
    if vault.get(id)?.is_none() {
        eprintln!("note '{id}' not found");
        return Ok(EXIT_RECOVERABLE);
    }
    editor().arg(vault.note_path(id)).status()?;
    Ok(EXIT_OK)
}

pub(crate) fn cmd_rm(app: &App, id: &str) -> Result<i32> {
    match app.vault().delete(id) {
        Ok(()) => {
            if !app.quiet {
                println!("removed {id}");
            }
            Ok(EXIT_OK)
        }
        Err(zkn::Error::NotFound(_)) => {
            eprintln!("note '{id}' not found");
            Ok(EXIT_RECOVERABLE)
        }
        Err(e) => Err(e.into()),
    }
}

pub(crate) fn cmd_ls(app: &App, grep: Option<&str>, orphans: bool) -> Result<i32> {
    let vault = app.vault();
    let mut ids = vault.list_ids()?;

    if let Some(pattern) = grep {
        let needle = pattern.to_lowercase();
        ids.retain(|id| match vault.get(id) {
            Ok(Some(note)) => note.body.raw.to_lowercase().contains(&needle),
            _ => false,
        });
    }

    if orphans {
        let store = app.open_store()?;
        let orphan_set: std::collections::BTreeSet<_> =
            store.orphans()?.into_iter().collect();
        ids.retain(|id| orphan_set.contains(id));
    }

    for id in ids {
        println!("{id}");
    }
    Ok(EXIT_OK)
}

pub(crate) fn cmd_yank(app: &App, reference: &str) -> Result<i32> {
    let (id, anchor) = parse_ref(reference);
    let Some(note) = app.vault().get(id)? else {
        eprintln!("note '{id}' not found");
        return Ok(EXIT_RECOVERABLE);
    };

    let (start, end) = slice_by_anchor(&note, anchor.as_ref());
    if start == end {
        if let Some(anchor) = anchor {
            eprintln!("anchor '#{anchor}' not found in note {id}");
            return Ok(EXIT_RECOVERABLE);
        }
    }
    print!("{}", Range::new(start, end).slice(&note.body.raw));
    Ok(EXIT_OK)
}

/// Line number (1-based) of a character offset.
fn line_of_offset(text: &str, offset: usize) -> usize {
    1 + text
        .chars()
        .take(offset)
        .filter(|&c| c == '\n')
        .count()
}

pub(crate) fn cmd_locate(app: &App, reference: &str, format: &str) -> Result<i32> {
    let vault = app.vault();
    let (id, anchor) = parse_ref(reference);
    let Some(note) = vault.get(id)? else {
        eprintln!("note '{id}' not found");
        return Ok(EXIT_RECOVERABLE);
    };

    let (start, end) = slice_by_anchor(&note, anchor.as_ref());
    if start == end && anchor.is_some() {
        let anchor = anchor.expect("checked");
        eprintln!("anchor '#{anchor}' not found in note {id}");
        return Ok(EXIT_RECOVERABLE);
    }

    let path = vault.note_path(id);
    let start_line = line_of_offset(&note.body.raw, start);
    let end_line = line_of_offset(&note.body.raw, end.saturating_sub(1).max(start));

    if format == "tsv" {
        println!(
            "{id}\t{}\t{start}\t{end}\t{start_line}\t{end_line}",
            path.display()
        );
    } else {
        let mut out = serde_json::json!({
            "id": id,
            "path": path.display().to_string(),
            "range": { "start": start, "end": end },
            "lines": { "start": start_line, "end": end_line },
        });
        if let Some(anchor) = anchor {
            out["anchor"] = serde_json::to_value(&anchor)?;
        }
        println!("{}", serde_json::to_string_pretty(&out)?);
    }
    Ok(EXIT_OK)
}

/// Shared helper for backref context display.
pub(crate) fn print_backref_context(source_id: &str, raw: &str, link_start: usize) {
    let line_no = line_of_offset(raw, link_start);
    let first = line_no.saturating_sub(2).max(1);
    println!("\n{}:", source_id.bold());
    for (i, line) in raw.lines().enumerate() {
        let n = i + 1;
        if n >= first && n <= line_no {
            println!("  {line}");
        }
        if n > line_no {
            break;
        }
    }
}
