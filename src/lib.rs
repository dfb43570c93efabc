//! # zkn - plain-text knowledge base
//!
//! A local knowledge-base engine over a flat directory of Markdown notes.
//! Files on disk are the source of truth; a colocated SQLite index caches
//! parsed state and is always safe to delete and rebuild.
//!
//! ## Features
//!
//! - **Wiki links and anchors**: `[[id]]`, `[[id#slug]]`, `[[id#^label]]`,
//!   transclusion via `![[...]]`
//! - **Anchor slicing**: extract exactly one heading section or labelled
//!   block from a note
//! - **Durable incremental index**: FTS5 search, backlinks, graph queries,
//!   mtime/size (optionally SHA-256) change detection
//! - **Watch mode**: debounced filesystem events drive incremental updates
//! - **Import and export**: bulk import with rollback manifests, static
//!   site export with transclusion expansion
//!
//! ## Quick start
//!
//! ```no_run
//! use zkn::store::{RebuildOptions, Store};
//! use zkn::vault::Vault;
//!
//! # fn main() -> zkn::Result<()> {
//! let vault = Vault::new("notes");
//! let store = Store::open(std::path::Path::new("notes/.zkn/index.sqlite"))?;
//! let counts = store.rebuild(&vault, RebuildOptions::default(), None)?;
//! println!("indexed {} notes", counts.inserted + counts.updated);
//!
//! for id in store.search("curvature", 10)? {
//!     println!("{id}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod export;
pub mod format;
pub mod header;
pub mod migrate;
pub mod note;
pub mod parser;
pub mod resolver;
pub mod slicer;
pub mod slug;
pub mod store;
pub mod vault;
pub mod watcher;

pub use error::{Error, Result};
pub use note::{Anchor, Block, BlockKind, Link, LinkTarget, Note, NoteBody, NoteId, Range};
pub use resolver::{IndexResolver, Resolver, VaultResolver};
pub use slicer::slice_by_anchor;
pub use slug::{is_valid_id, new_id, slugify};
pub use store::Store;
pub use vault::Vault;
