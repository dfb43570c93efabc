//! Title/alias → id resolution over the index.

use crate::error::Result;
use crate::note::NoteId;
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ResolveMode {
    Title,
    Alias,
    #[default]
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Prefer {
    Title,
    #[default]
    Alias,
}

/// Outcome of a resolution. Misses and ambiguity are data, not errors;
/// the CLI maps them to exit codes 1 and 2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(NoteId),
    NotFound,
    Ambiguous(Vec<NoteId>),
}

impl Resolution {
    pub fn found(&self) -> Option<&NoteId> {
        match self {
            Resolution::Found(id) => Some(id),
            _ => None,
        }
    }
}

/// Resolve display text to a note id via indexed titles and
/// `core/alias` rows.
///
/// Exactly one match overall wins; one title match plus one alias match is
/// broken by `prefer`; several matches within a category are ambiguous.
pub fn resolve_target(
    store: &Store,
    text: &str,
    mode: ResolveMode,
    prefer: Prefer,
) -> Result<Resolution> {
    let title_ids = match mode {
        ResolveMode::Title | ResolveMode::Both => store.ids_with_title(text)?,
        ResolveMode::Alias => Vec::new(),
    };
    let alias_ids = match mode {
        ResolveMode::Alias | ResolveMode::Both => store.ids_with_alias(text)?,
        ResolveMode::Title => Vec::new(),
    };

    Ok(match (title_ids.len(), alias_ids.len()) {
        (0, 0) => Resolution::NotFound,
        (1, 0) => Resolution::Found(title_ids.into_iter().next().expect("one title")),
        (0, 1) => Resolution::Found(alias_ids.into_iter().next().expect("one alias")),
        (1, 1) => {
            let pick = match prefer {
                Prefer::Title => &title_ids,
                Prefer::Alias => &alias_ids,
            };
            Resolution::Found(pick[0].clone())
        }
        _ => {
            let mut candidates = title_ids;
            candidates.extend(alias_ids);
            candidates.sort();
            candidates.dedup();
            Resolution::Ambiguous(candidates)
        }
    })
}
