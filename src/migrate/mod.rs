//! Vault maintenance built on the index and the resolver: title/alias
//! resolution, link rewriting, bulk import with rollback, integrity audit.

mod audit;
mod import;
mod links;
mod resolve;
mod rollback;

pub use audit::{audit_vault, AuditFinding, AuditReport, Severity};
pub use import::{
    apply_import, build_plan, load_manifest, load_plan, save_manifest, save_plan, ApplyOptions,
    IdStrategy, ImportItem, ImportManifest, ImportPlan, ItemStatus, ManifestAction, ManifestEntry,
    OnConflict, PlanOptions,
};
pub use links::{
    migrate_note_links, rewrite_path_links, rewrite_wiki_links, LinkFormat, LinkRewrite,
};
pub use resolve::{resolve_target, Prefer, Resolution, ResolveMode};
pub use rollback::rollback_import;
