//! Bulk import: plan (scan + conflict detection), apply (copy/move with a
//! rollback manifest).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::note::Meta;
use crate::slug::{new_id, slugify};
use crate::vault::{Vault, NOTE_EXT};
use crate::header;

pub const PLAN_VERSION: u32 = 1;
pub const MANIFEST_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum IdStrategy {
    /// Fresh random hex ids.
    #[default]
    Random,
    /// Deterministic ids from the source path digest.
    Hash,
    /// Slug of the source filename (readable, collision-prone).
    Slug,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Ok,
    Conflict,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportItem {
    /// Source path, relative to the scanned directory.
    pub src: String,
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    pub status: ItemStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportPlan {
    pub version: u32,
    pub generated_at: String,
    pub src: String,
    pub id_strategy: IdStrategy,
    pub items: Vec<ImportItem>,
    /// Duplicate title/alias → the source paths claiming it.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub conflicts: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestAction {
    Create,
    Move,
    Copy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub action: ManifestAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    pub dst: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup: Option<String>,
}

/// Versioned record of what `apply` did, in order; `rollback` replays it in
/// reverse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportManifest {
    pub version: u32,
    pub timestamp: String,
    pub src_dir: String,
    pub dst_vault: String,
    pub operation: ManifestAction,
    pub entries: Vec<ManifestEntry>,
}

#[derive(Debug, Clone)]
pub struct PlanOptions {
    pub id_strategy: IdStrategy,
    pub id_bytes: usize,
}

impl Default for PlanOptions {
    fn default() -> Self {
        PlanOptions {
            id_strategy: IdStrategy::Random,
            id_bytes: 6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OnConflict {
    /// Leave the existing vault file alone and skip the item.
    Skip,
    /// Import under a fresh random id.
    NewId,
    /// Abort the apply.
    #[default]
    Fail,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyOptions {
    /// Move files instead of copying them.
    pub move_files: bool,
    pub on_conflict: OnConflict,
    pub dry_run: bool,
}

/// Scan `src_dir` for note files and build an import plan with generated
/// ids, extracted titles/aliases, and duplicate-title conflict markers.
pub fn build_plan(src_dir: &Path, opts: &PlanOptions) -> Result<ImportPlan> {
    let mut items = Vec::new();
    let mut claims: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut used_ids = std::collections::BTreeSet::new();

    let mut files: Vec<PathBuf> = WalkDir::new(src_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some(NOTE_EXT))
        .collect();
    files.sort();

    for path in files {
        let rel = path
            .strip_prefix(src_dir)
            .unwrap_or(&path)
            .to_string_lossy()
            .to_string();

        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                items.push(ImportItem {
                    src: rel,
                    id: String::new(),
                    title: String::new(),
                    aliases: Vec::new(),
                    status: ItemStatus::Error,
                    reason: Some(e.to_string()),
                });
                continue;
            }
        };

        let (title, aliases) = extract_title_and_aliases(&content, &path);

        let mut id = generate_id(opts, &rel, &content);
        while !used_ids.insert(id.clone()) {
            // Id collision within the plan (hash/slug strategies); fall
            // back to a random id rather than silently merging notes.
            id = new_id(opts.id_bytes);
        }

        claims.entry(title.clone()).or_default().push(rel.clone());
        for alias in &aliases {
            claims.entry(alias.clone()).or_default().push(rel.clone());
        }

        items.push(ImportItem {
            src: rel,
            id,
            title,
            aliases,
            status: ItemStatus::Ok,
            reason: None,
        });
    }

    let conflicts: BTreeMap<String, Vec<String>> = claims
        .into_iter()
        .filter(|(name, paths)| !name.is_empty() && paths.len() > 1)
        .collect();

    for item in &mut items {
        if item.status != ItemStatus::Ok {
            continue;
        }
        let clash = conflicts.contains_key(&item.title)
            || item.aliases.iter().any(|a| conflicts.contains_key(a));
        if clash {
            item.status = ItemStatus::Conflict;
            item.reason = Some("duplicate title or alias".to_string());
        }
    }

    Ok(ImportPlan {
        version: PLAN_VERSION,
        generated_at: chrono::Utc::now().to_rfc3339(),
        src: src_dir.to_string_lossy().to_string(),
        id_strategy: opts.id_strategy,
        items,
        conflicts,
    })
}

fn generate_id(opts: &PlanOptions, rel: &str, content: &str) -> String {
    match opts.id_strategy {
        IdStrategy::Random => new_id(opts.id_bytes),
        IdStrategy::Hash => {
            let digest = Sha256::digest(rel.replace('\\', "/").as_bytes());
            format!("{digest:x}")[..opts.id_bytes * 2].to_string()
        }
        IdStrategy::Slug => {
            let stem = Path::new(rel)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or(rel);
            let slug = slugify(stem);
            if slug.is_empty() {
                // Unsluggable name (symbols only); content hash keeps it stable.
                let digest = Sha256::digest(content.as_bytes());
                format!("{digest:x}")[..opts.id_bytes * 2].to_string()
            } else {
                slug.chars().take(50).collect()
            }
        }
    }
}

/// Title/alias extraction for foreign notes: header keys first
/// (`core/title`, `title`; `core/aliases`, `aliases`), then the first H1,
/// then the first non-empty line, then the file stem.
fn extract_title_and_aliases(content: &str, path: &Path) -> (String, Vec<String>) {
    let mut title = String::new();
    let mut aliases = Vec::new();

    let body = match header::decode(content) {
        Ok((meta, body)) => {
            for key in ["core/title", "title"] {
                if let Some(v) = meta.get(key) {
                    if let Some(s) = v.as_str() {
                        title = s.to_string();
                        break;
                    }
                }
            }
            for key in ["core/aliases", "aliases"] {
                match meta.get(key) {
                    Some(serde_yaml::Value::Sequence(seq)) => {
                        aliases = seq
                            .iter()
                            .filter_map(|v| v.as_str().map(str::to_string))
                            .collect();
                        break;
                    }
                    Some(serde_yaml::Value::String(one)) => {
                        aliases = vec![one.clone()];
                        break;
                    }
                    _ => {}
                }
            }
            body
        }
        // Foreign files may carry headers we cannot parse; fall back to the
        // body heuristics on the raw text.
        Err(_) => content.to_string(),
    };

    if title.is_empty() {
        for line in body.lines() {
            let line = line.trim();
            if let Some(h1) = line.strip_prefix("# ") {
                title = h1.trim().to_string();
                break;
            }
            if !line.is_empty() && !line.starts_with('#') {
                title = line.chars().take(100).collect();
                break;
            }
        }
    }
    if title.is_empty() {
        title = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
    }

    (title, aliases)
}

/// Execute a plan against the vault. Returns the manifest describing what
/// was done (empty `entries` under `dry_run`).
pub fn apply_import(
    plan: &ImportPlan,
    vault: &Vault,
    opts: &ApplyOptions,
) -> Result<ImportManifest> {
    let operation = if opts.move_files {
        ManifestAction::Move
    } else {
        ManifestAction::Copy
    };
    let mut manifest = ImportManifest {
        version: MANIFEST_VERSION,
        timestamp: chrono::Utc::now().to_rfc3339(),
        src_dir: plan.src.clone(),
        dst_vault: vault.root().to_string_lossy().to_string(),
        operation,
        entries: Vec::new(),
    };

    let src_dir = PathBuf::from(&plan.src);

    for item in &plan.items {
        if item.status != ItemStatus::Ok {
            tracing::debug!(src = %item.src, status = ?item.status, "skipping item");
            continue;
        }

        let src_path = src_dir.join(&item.src);
        let mut id = item.id.clone();
        let mut dst_path = vault.note_path(&id);

        if dst_path.exists() {
            match opts.on_conflict {
                OnConflict::Skip => continue,
                OnConflict::NewId => {
                    id = new_id(6);
                    dst_path = vault.note_path(&id);
                }
                OnConflict::Fail => {
                    return Err(Error::Io(std::io::Error::new(
                        std::io::ErrorKind::AlreadyExists,
                        format!("{} already exists in vault", dst_path.display()),
                    )))
                }
            }
        }

        if opts.dry_run {
            continue;
        }

        let content = fs::read_to_string(&src_path)?;
        let injected = inject_header(&content, &id, &item.title, &item.aliases)?;
        vault.write_raw(&id, &injected)?;

        if opts.move_files {
            fs::remove_file(&src_path)?;
            manifest.entries.push(ManifestEntry {
                action: ManifestAction::Move,
                src: Some(src_path.to_string_lossy().to_string()),
                dst: dst_path.to_string_lossy().to_string(),
                backup: None,
            });
        } else {
            manifest.entries.push(ManifestEntry {
                action: ManifestAction::Create,
                src: Some(src_path.to_string_lossy().to_string()),
                dst: dst_path.to_string_lossy().to_string(),
                backup: None,
            });
        }
    }

    Ok(manifest)
}

/// Force `id`, `core/title` and `core/aliases` into the header, keeping any
/// other keys the file already had.
fn inject_header(content: &str, id: &str, title: &str, aliases: &[String]) -> Result<String> {
    let (mut meta, body) = header::decode(content).unwrap_or_else(|_| {
        // Unparseable header: keep the raw text as body and start fresh.
        (Meta::new(), content.to_string())
    });

    meta.insert("id".into(), id.into());
    meta.insert("core/title".into(), title.into());
    if !aliases.is_empty() {
        let seq: Vec<serde_yaml::Value> = aliases
            .iter()
            .map(|a| serde_yaml::Value::String(a.clone()))
            .collect();
        meta.insert("core/aliases".into(), serde_yaml::Value::Sequence(seq));
    }

    header::encode(&meta, &body)
}

pub fn save_manifest(manifest: &ImportManifest, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(
        path,
        serde_json::to_string_pretty(manifest).expect("manifest serializes"),
    )?;
    Ok(())
}

pub fn load_manifest(path: &Path) -> Result<ImportManifest> {
    let text = fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|e| {
        Error::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("bad manifest {}: {e}", path.display()),
        ))
    })
}

pub fn save_plan(plan: &ImportPlan, path: &Path) -> Result<()> {
    fs::write(
        path,
        serde_json::to_string_pretty(plan).expect("plan serializes"),
    )?;
    Ok(())
}

pub fn load_plan(path: &Path) -> Result<ImportPlan> {
    let text = fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|e| {
        Error::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("bad plan {}: {e}", path.display()),
        ))
    })
}
