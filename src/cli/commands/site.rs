//! `fmt` and `export` commands.

use std::path::Path;

use anyhow::Result;

use zkn::format::{self, TextOptions};
use zkn::header;

use crate::cli::{App, EXIT_OK};

pub(crate) fn cmd_fmt(
    app: &App,
    wrap: usize,
    ids_only: bool,
    header_order: bool,
    dry_run: bool,
) -> Result<i32> {
    let vault = app.vault();
    let text_opts = TextOptions {
        wrap,
        eol: Some(format::Eol::Lf),
        strip_trailing: true,
        ensure_final_eol: true,
    };

    let mut changed = 0;
    for id in vault.list_ids()? {
        let Some(raw) = vault.read_raw(&id)? else {
            continue;
        };

        let body = match header::decode(&raw) {
            Ok((_, body)) => body,
            Err(e) => {
                tracing::warn!(note = %id, error = %e, "skipping note with bad header");
                continue;
            }
        };
        // Keep the original header text verbatim unless asked to reorder
        // it; `decode` hands back the body as a suffix of the raw text.
        let header_text = &raw[..raw.len() - body.len()];

        let mut new_body = format::normalize_links(&body, ids_only);
        new_body = format::normalize_text(&new_body, &text_opts);

        let mut new_raw = format!("{header_text}{new_body}");
        if header_order {
            new_raw = format::normalize_header(&new_raw, &id)?;
        }

        if new_raw != raw {
            changed += 1;
            if dry_run {
                println!("{id}");
            } else {
                vault.write_raw(&id, &new_raw)?;
            }
        }
    }

    if !app.quiet {
        let verb = if dry_run { "would format" } else { "formatted" };
        println!("{verb} {changed} note(s)");
    }
    Ok(EXIT_OK)
}

pub(crate) fn cmd_export(app: &App, out: Option<&Path>) -> Result<i32> {
    let vault = app.vault();
    let store = app.open_store()?;

    let out = out
        .map(Path::to_path_buf)
        .or_else(|| app.config.export.out.clone())
        .unwrap_or_else(|| std::path::PathBuf::from("site"));
    let opts = zkn::export::ExportOptions {
        katex_auto: app.config.export.katex_auto,
    };

    let report = zkn::export::export_site(&vault, &store, &out, opts)?;
    if !app.quiet {
        println!(
            "exported {} note(s) to {} ({} missing target(s))",
            report.notes,
            out.display(),
            report.missing_targets
        );
    }
    Ok(EXIT_OK)
}
