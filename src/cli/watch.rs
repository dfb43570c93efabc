//! `zkn watch` - drive the watcher and render its events.

use anyhow::Result;

use zkn::watcher::{watch_vault, WatchEvent, WatchOptions};

use crate::cli::{App, EXIT_OK};

pub(crate) fn cmd_watch(app: &App, debounce: Option<u64>) -> Result<i32> {
    let vault = app.vault();
    let store = app.open_store()?;

    let opts = WatchOptions {
        debounce_ms: debounce.unwrap_or(app.config.watch.debounce_ms),
    };

    if !app.quiet && !app.json {
        println!(
            "watching {} (debounce {} ms), Ctrl+C to stop",
            vault.root().display(),
            opts.debounce_ms
        );
    }

    let running = super::signal::running_flag();
    let json = app.json;
    let quiet = app.quiet;

    watch_vault(&vault, &store, opts, &running, |event| match event {
        WatchEvent::InitialSync { inserted } => {
            if json {
                println!(
                    "{}",
                    serde_json::json!({ "type": "initial_sync", "inserted": inserted })
                );
            } else if !quiet {
                println!("index was empty, initial sync indexed {inserted} note(s)");
            }
        }
        WatchEvent::Batch {
            counts,
            duration_ms,
        } => {
            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "type": "batch",
                        "inserted": counts.inserted,
                        "updated": counts.updated,
                        "removed": counts.removed,
                        "duration_ms": duration_ms,
                    })
                );
            } else if !quiet {
                println!(
                    "indexed +{} ~{} -{} ({duration_ms} ms)",
                    counts.inserted, counts.updated, counts.removed
                );
            }
        }
        WatchEvent::Error { message } => {
            if json {
                println!(
                    "{}",
                    serde_json::json!({ "type": "error", "message": message })
                );
            } else {
                eprintln!("watch error: {message}");
            }
        }
    })?;

    if !app.quiet && !app.json {
        println!("watch stopped");
    }
    Ok(EXIT_OK)
}
