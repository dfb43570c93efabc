//! Index-backed commands: reindex, stats, search, backrefs, graph.

use anyhow::Result;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use zkn::store::RebuildOptions;

use crate::cli::{cancel_flag, App, EXIT_OK, EXIT_RECOVERABLE};

pub(crate) fn cmd_reindex(app: &App, full: bool, hash: bool) -> Result<i32> {
    let vault = app.vault();
    let store = app.open_store()?;

    let spinner = if app.quiet || app.json {
        None
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(ProgressStyle::with_template("{spinner} {msg}").expect("template"));
        pb.set_message(if full { "reindexing (full)" } else { "reindexing" });
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        Some(pb)
    };

    let opts = RebuildOptions {
        full,
        use_hash: hash || app.config.index.use_hash,
    };
    let counts = store.rebuild(&vault, opts, Some(cancel_flag()))?;

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    if app.json {
        println!("{}", serde_json::to_string(&counts)?);
    } else if !app.quiet {
        println!(
            "scanned {} dirty {} +{} ~{} -{} failed {}",
            counts.scanned,
            counts.dirty,
            counts.inserted,
            counts.updated,
            counts.removed,
            counts.failed
        );
    }
    Ok(if counts.failed > 0 { EXIT_RECOVERABLE } else { EXIT_OK })
}

pub(crate) fn cmd_stats(app: &App) -> Result<i32> {
    let store = app.open_store()?;
    let stats = store.stats()?;

    if app.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("Index: {}", store.path().display());
        println!("  schema:  v{}", stats.schema_version);
        println!("  notes:   {}", stats.notes);
        println!("  links:   {}", stats.links);
        println!("  blocks:  {}", stats.blocks);
        println!("  aliases: {}", stats.aliases);
    }
    Ok(EXIT_OK)
}

pub(crate) fn cmd_search(app: &App, query: &str, limit: usize, snippets: bool) -> Result<i32> {
    let store = app.open_store()?;

    let ids = match store.search(query, limit) {
        Ok(ids) => ids,
        Err(e @ zkn::Error::EmptyIndex) => {
            eprintln!("{e}");
            return Ok(EXIT_RECOVERABLE);
        }
        Err(e) => return Err(e.into()),
    };

    if app.json {
        let mut rows = Vec::new();
        for id in &ids {
            rows.push(serde_json::json!({
                "id": id,
                "title": store.title(id)?.unwrap_or_default(),
                "snippet": if snippets { store.snippet(id, query)? } else { None },
            }));
        }
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(EXIT_OK);
    }

    for id in &ids {
        let title = store.title(id)?.unwrap_or_default();
        if title.is_empty() {
            println!("{id}");
        } else {
            println!("{id}  {}", title.bold());
        }
        if snippets {
            if let Some(snippet) = store.snippet(id, query)? {
                println!("  {}", snippet.replace('\n', " "));
            }
        }
    }
    Ok(EXIT_OK)
}

pub(crate) fn cmd_backrefs(app: &App, id: &str) -> Result<i32> {
    let vault = app.vault();
    let store = app.open_store()?;
    let incoming = store.links_in(id)?;

    if app.json {
        let mut rows = Vec::new();
        for link in &incoming {
            rows.push(serde_json::json!({
                "source": link.source,
                "start": link.range.start,
                "end": link.range.end,
            }));
        }
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(EXIT_OK);
    }

    for link in &incoming {
        if let Some(note) = vault.get(&link.source)? {
            super::notes::print_backref_context(&link.source, &note.body.raw, link.range.start);
        }
    }
    Ok(EXIT_OK)
}

pub(crate) fn cmd_graph(app: &App) -> Result<i32> {
    let store = app.open_store()?;
    let graph = store.graph_data()?;
    println!("{}", serde_json::to_string_pretty(&graph)?);
    Ok(EXIT_OK)
}
