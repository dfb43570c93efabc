//! Static-site export: one `<id>/index.md` per note with transclusions
//! expanded and wiki links rewritten to site paths, plus `graph.json`.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::error::Result;
use crate::note::{NoteId, Range};
use crate::parser::parse_target;
use crate::slicer::slice_by_anchor;
use crate::store::Store;
use crate::vault::Vault;

static TRANS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[\[([^\[\]]+?)\]\]").expect("transclusion regex"));
static LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[([^\[\]]+?)\]\]").expect("link regex"));

/// Transclusion chains deeper than this substitute the depth sentinel.
const MAX_TRANSCLUDE_DEPTH: usize = 8;

#[derive(Debug, Clone, Copy, Default)]
pub struct ExportOptions {
    /// Emit a `.katex` flag file when any exported note contains math.
    pub katex_auto: bool,
}

#[derive(Debug, Default)]
pub struct ExportReport {
    pub notes: usize,
    pub missing_targets: usize,
}

/// Export the whole vault to `out`.
pub fn export_site(
    vault: &Vault,
    store: &Store,
    out: &Path,
    opts: ExportOptions,
) -> Result<ExportReport> {
    fs::create_dir_all(out)?;

    let titles: HashMap<NoteId, String> = store
        .graph_data()?
        .nodes
        .into_iter()
        .map(|n| (n.id, n.title))
        .collect();

    let mut report = ExportReport::default();

    for id in vault.list_ids()? {
        let Some(note) = vault.get(&id)? else {
            continue;
        };

        let mut chain = vec![id.clone()];
        let mut md = expand_transclusions(vault, &note.body.raw, &mut chain, &mut report);
        md = rewrite_links(&md);

        // Give the page a title heading when the body does not already
        // start with one.
        if let Some(title) = titles.get(&id).filter(|t| !t.is_empty()) {
            if !md.starts_with('#') {
                md = format!("# {title}\n\n{md}");
            }
        }

        let page_dir = out.join(&id);
        fs::create_dir_all(&page_dir)?;
        fs::write(page_dir.join("index.md"), md)?;
        report.notes += 1;
    }

    let graph = store.graph_data()?;
    fs::write(
        out.join("graph.json"),
        serde_json::to_string_pretty(&graph).expect("graph serializes"),
    )?;

    if opts.katex_auto && store.any_math()? {
        fs::write(out.join(".katex"), "")?;
    }

    Ok(report)
}

/// Replace every `![[...]]` with the target's sliced body.
///
/// `chain` holds the ids currently being expanded; a target already on it
/// is a cycle and gets a callout sentinel instead of recursing forever.
fn expand_transclusions(
    vault: &Vault,
    md: &str,
    chain: &mut Vec<NoteId>,
    report: &mut ExportReport,
) -> String {
    TRANS_RE
        .replace_all(md, |caps: &Captures<'_>| {
            let target = parse_target(&caps[1]);

            if chain.iter().any(|id| id == &target.id) {
                return format!("> **zkn:** transclusion cycle at `{}`\n", target.id);
            }
            if chain.len() > MAX_TRANSCLUDE_DEPTH {
                return format!("> **zkn:** transclusion too deep at `{}`\n", target.id);
            }

            let note = match vault.get(&target.id) {
                Ok(Some(note)) => note,
                _ => {
                    report.missing_targets += 1;
                    return format!("> **zkn:** missing note `{}`\n", target.id);
                }
            };

            let (start, end) = slice_by_anchor(&note, target.anchor.as_ref());
            if start == end && target.anchor.is_some() {
                report.missing_targets += 1;
                let anchor = target.anchor.as_ref().expect("checked above");
                return format!("> **zkn:** missing anchor `{}#{anchor}`\n", target.id);
            }

            let slice = Range::new(start, end).slice(&note.body.raw).to_string();
            chain.push(target.id.clone());
            let expanded = expand_transclusions(vault, &slice, chain, report);
            chain.pop();
            expanded
        })
        .into_owned()
}

/// `[[id|Title]]` → `[Title](/id/)`; the anchor part is dropped from the
/// path, the display text falls back to the bare id.
fn rewrite_links(md: &str) -> String {
    LINK_RE
        .replace_all(md, |caps: &Captures<'_>| {
            let target = parse_target(&caps[1]);
            let title = target
                .title_text
                .clone()
                .unwrap_or_else(|| target.id.clone());
            format!("[{title}](/{}/)", target.id)
        })
        .into_owned()
}
