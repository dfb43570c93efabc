//! Read-only link resolution: does a target exist, is its anchor valid?
//!
//! Misses are data results, not errors. Two backings: the live vault
//! (always current, reparses on every call) and the index (fast, as fresh
//! as the last rebuild).

use crate::error::Result;
use crate::note::{Anchor, BlockKind, LinkTarget};
use crate::store::Store;
use crate::vault::Vault;

pub trait Resolver {
    /// Is the target id a known note?
    fn exists(&self, target: &LinkTarget) -> Result<bool>;

    /// Is the anchor absent, or does it name a label/slug present in the
    /// target note?
    fn anchor_ok(&self, target: &LinkTarget) -> Result<bool>;
}

/// Resolver over the live vault; parses the target note on demand.
pub struct VaultResolver<'a> {
    vault: &'a Vault,
}

impl<'a> VaultResolver<'a> {
    pub fn new(vault: &'a Vault) -> Self {
        VaultResolver { vault }
    }
}

impl Resolver for VaultResolver<'_> {
    fn exists(&self, target: &LinkTarget) -> Result<bool> {
        Ok(self.vault.get(&target.id)?.is_some())
    }

    fn anchor_ok(&self, target: &LinkTarget) -> Result<bool> {
        let Some(anchor) = &target.anchor else {
            return Ok(true);
        };
        let Some(note) = self.vault.get(&target.id)? else {
            return Ok(false);
        };
        Ok(match anchor {
            Anchor::Block { label } => note
                .body
                .blocks
                .iter()
                .any(|b| b.label_name() == Some(label)),
            Anchor::Heading { slug } => note.body.blocks.iter().any(|b| {
                b.kind == BlockKind::Heading && b.heading_slug.as_deref() == Some(slug.as_str())
            }),
        })
    }
}

/// Resolver over the durable index; no note load, no parse.
pub struct IndexResolver<'a> {
    store: &'a Store,
}

impl<'a> IndexResolver<'a> {
    pub fn new(store: &'a Store) -> Self {
        IndexResolver { store }
    }
}

impl Resolver for IndexResolver<'_> {
    fn exists(&self, target: &LinkTarget) -> Result<bool> {
        self.store.note_exists(&target.id)
    }

    fn anchor_ok(&self, target: &LinkTarget) -> Result<bool> {
        let Some(anchor) = &target.anchor else {
            return Ok(true);
        };
        match anchor {
            Anchor::Block { label } => self.store.has_block_label(&target.id, label),
            Anchor::Heading { slug } => self.store.has_heading_slug(&target.id, slug),
        }
    }
}
