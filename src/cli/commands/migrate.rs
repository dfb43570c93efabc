//! Resolver, link migration, bulk import and audit commands.

use std::path::Path;

use anyhow::Result;
use colored::Colorize;
use similar::TextDiff;

use zkn::migrate::{
    self, ApplyOptions, IdStrategy, LinkFormat, OnConflict, PlanOptions, Prefer, Resolution,
    ResolveMode, Severity,
};
use zkn::resolver::{IndexResolver, Resolver, VaultResolver};

use crate::cli::{App, EXIT_AMBIGUOUS, EXIT_OK, EXIT_RECOVERABLE};

pub(crate) fn cmd_resolve(
    app: &App,
    text: &str,
    mode: ResolveMode,
    prefer: Prefer,
) -> Result<i32> {
    let store = app.open_store()?;
    match migrate::resolve_target(&store, text, mode, prefer)? {
        Resolution::Found(id) => {
            println!("{id}");
            Ok(EXIT_OK)
        }
        Resolution::NotFound => {
            eprintln!("'{text}' did not match any title or alias");
            Ok(EXIT_RECOVERABLE)
        }
        Resolution::Ambiguous(candidates) => {
            eprintln!("'{text}' is ambiguous:");
            for id in candidates {
                eprintln!("  {id}");
            }
            Ok(EXIT_AMBIGUOUS)
        }
    }
}

pub(crate) fn cmd_migrate_links(
    app: &App,
    from: LinkFormat,
    mode: ResolveMode,
    prefer: Prefer,
    dry_run: bool,
) -> Result<i32> {
    let vault = app.vault();
    let store = app.open_store()?;

    let mut changed_notes = 0;
    let mut total_changes = 0;
    let mut unresolved = Vec::new();

    for id in vault.list_ids()? {
        let Some(raw) = vault.read_raw(&id)? else {
            continue;
        };
        let file_path = vault.note_path(&id);
        let outcome = migrate::migrate_note_links(
            &raw,
            &store,
            vault.root(),
            &file_path,
            from,
            mode,
            prefer,
        )?;

        for reason in outcome.unresolved {
            unresolved.push(format!("{id}: {reason}"));
        }
        if outcome.changes == 0 {
            continue;
        }

        changed_notes += 1;
        total_changes += outcome.changes;

        if dry_run {
            let diff = TextDiff::from_lines(&raw, &outcome.text);
            print!(
                "{}",
                diff.unified_diff()
                    .header(&format!("a/{id}.md"), &format!("b/{id}.md"))
            );
        } else {
            vault.write_raw(&id, &outcome.text)?;
        }
    }

    if !app.quiet {
        let verb = if dry_run { "would rewrite" } else { "rewrote" };
        println!("{verb} {total_changes} link(s) in {changed_notes} note(s)");
        for line in &unresolved {
            eprintln!("{} {line}", "unresolved:".yellow());
        }
    }
    Ok(EXIT_OK)
}

pub(crate) fn cmd_import_plan(
    app: &App,
    src: &Path,
    out: &Path,
    id_strategy: IdStrategy,
    id_bytes: usize,
) -> Result<i32> {
    let opts = PlanOptions {
        id_strategy,
        id_bytes,
    };
    let plan = migrate::build_plan(src, &opts)?;
    migrate::save_plan(&plan, out)?;

    if !app.quiet {
        let ok = plan
            .items
            .iter()
            .filter(|i| i.status == migrate::ItemStatus::Ok)
            .count();
        println!(
            "planned {} note(s) ({} importable, {} conflicts) -> {}",
            plan.items.len(),
            ok,
            plan.conflicts.len(),
            out.display()
        );
        for (name, paths) in &plan.conflicts {
            eprintln!("{} '{name}' claimed by {}", "conflict:".yellow(), paths.join(", "));
        }
    }
    Ok(if plan.conflicts.is_empty() { EXIT_OK } else { EXIT_RECOVERABLE })
}

pub(crate) fn cmd_import_apply(
    app: &App,
    plan_path: &Path,
    move_files: bool,
    on_conflict: OnConflict,
    dry_run: bool,
) -> Result<i32> {
    let vault = app.vault();
    let plan = migrate::load_plan(plan_path)?;
    let opts = ApplyOptions {
        move_files,
        on_conflict,
        dry_run,
    };
    let manifest = migrate::apply_import(&plan, &vault, &opts)?;

    if dry_run {
        if !app.quiet {
            println!("dry run, nothing written");
        }
        return Ok(EXIT_OK);
    }

    let manifest_path = vault
        .root()
        .join(".zkn")
        .join(format!("import-{}.json", chrono::Utc::now().timestamp()));
    migrate::save_manifest(&manifest, &manifest_path)?;

    if !app.quiet {
        println!(
            "imported {} note(s); manifest at {}",
            manifest.entries.len(),
            manifest_path.display()
        );
    }
    Ok(EXIT_OK)
}

pub(crate) fn cmd_import_rollback(app: &App, manifest_path: &Path, dry_run: bool) -> Result<i32> {
    let manifest = migrate::load_manifest(manifest_path)?;
    let undone = migrate::rollback_import(&manifest, dry_run)?;
    if !app.quiet {
        let verb = if dry_run { "would undo" } else { "undid" };
        println!("{verb} {undone} operation(s)");
    }
    Ok(EXIT_OK)
}

pub(crate) fn cmd_audit(app: &App, strict: bool) -> Result<i32> {
    let vault = app.vault();
    let store = app.open_store()?;

    // An unindexed vault would audit as all-dead through the index; fall
    // back to live resolution there.
    let by_index;
    let by_vault;
    let resolver: &dyn Resolver = if store.note_count()? > 0 {
        by_index = IndexResolver::new(&store);
        &by_index
    } else {
        by_vault = VaultResolver::new(&vault);
        &by_vault
    };
    let report = migrate::audit_vault(&vault, resolver, strict)?;

    if app.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for finding in &report.findings {
            let tag = match finding.severity {
                Severity::Error => "error".red(),
                Severity::Warning => "warning".yellow(),
                Severity::Info => "info".normal(),
            };
            println!("{}: [{tag}] {}", finding.note_id, finding.message);
        }
        if !app.quiet {
            println!(
                "{} note(s), {} link(s): {} dead, {} unknown anchors, {} duplicate labels, {} unmigrated",
                report.total_notes,
                report.total_links,
                report.dead_links,
                report.unknown_anchors,
                report.duplicate_labels,
                report.unmigrated_links
            );
        }
    }
    Ok(if report.has_errors() { EXIT_RECOVERABLE } else { EXIT_OK })
}
