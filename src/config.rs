//! Configuration file support.
//!
//! Config files are loaded in order (later overrides earlier):
//! 1. `~/.config/zkn/config.toml` (user defaults)
//! 2. `<vault>/zkn.toml` (vault overrides), or the file named by
//!    `--config` in its place
//!
//! CLI flags override all config file values. Unreadable or unparsable
//! files are warned about and skipped, never fatal.

use std::path::{Path, PathBuf};

use serde::Deserialize;

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct VaultSection {
    /// Vault root directory.
    pub root: Option<PathBuf>,
    /// Index database path; defaults to `<vault>/.zkn/index.sqlite`.
    pub db: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IdSection {
    /// Random bytes per generated id (hex doubles this).
    pub bytes: usize,
}

impl Default for IdSection {
    fn default() -> Self {
        IdSection { bytes: 6 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WatchSection {
    /// Quiet window before a batch of file events is applied.
    pub debounce_ms: u64,
}

impl Default for WatchSection {
    fn default() -> Self {
        WatchSection { debounce_ms: 150 }
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct IndexSection {
    /// Confirm mtime/size matches with a content digest.
    pub use_hash: bool,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ExportSection {
    /// Output directory for `zkn export`.
    pub out: Option<PathBuf>,
    /// Emit a `.katex` flag file when exported notes contain math.
    pub katex_auto: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UiSection {
    pub colors: bool,
}

impl Default for UiSection {
    fn default() -> Self {
        UiSection { colors: true }
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub vault: VaultSection,
    pub id: IdSection,
    pub watch: WatchSection,
    pub index: IndexSection,
    pub export: ExportSection,
    pub ui: UiSection,
}

impl Config {
    /// Load and merge the user config and the vault config. An `explicit`
    /// path (`--config`) is used in place of the vault's `zkn.toml`.
    pub fn load(explicit: Option<&Path>, vault_hint: Option<&Path>) -> Self {
        let user = dirs::config_dir()
            .map(|d| d.join("zkn/config.toml"))
            .and_then(|p| Self::load_file(&p))
            .unwrap_or_default();

        let overlay = match explicit {
            Some(path) => Self::load_file(path).unwrap_or_else(|| {
                tracing::warn!(path = %path.display(), "--config file not usable, ignoring");
                Self::default()
            }),
            None => {
                let vault_root = vault_hint
                    .map(Path::to_path_buf)
                    .or_else(|| user.vault.root.clone())
                    .unwrap_or_else(|| PathBuf::from("."));
                Self::load_file(&vault_root.join("zkn.toml")).unwrap_or_default()
            }
        };

        user.override_with(overlay)
    }

    fn load_file(path: &Path) -> Option<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("failed to read config {}: {e}", path.display());
                return None;
            }
        };
        match toml::from_str::<Self>(&content) {
            Ok(config) => {
                tracing::debug!(path = %path.display(), "loaded config");
                Some(config)
            }
            Err(e) => {
                tracing::warn!("failed to parse config {}: {e}", path.display());
                None
            }
        }
    }

    /// Field-wise merge; `other`'s explicit values win.
    fn override_with(mut self, other: Self) -> Self {
        if other.vault.root.is_some() {
            self.vault.root = other.vault.root;
        }
        if other.vault.db.is_some() {
            self.vault.db = other.vault.db;
        }
        if other.id.bytes != IdSection::default().bytes {
            self.id.bytes = other.id.bytes;
        }
        if other.watch.debounce_ms != WatchSection::default().debounce_ms {
            self.watch.debounce_ms = other.watch.debounce_ms;
        }
        if other.index.use_hash {
            self.index.use_hash = true;
        }
        if other.export.out.is_some() {
            self.export.out = other.export.out;
        }
        if other.export.katex_auto {
            self.export.katex_auto = true;
        }
        if !other.ui.colors {
            self.ui.colors = false;
        }
        self
    }

    /// Effective vault root: CLI flag, then config, then the working
    /// directory.
    pub fn vault_root(&self, flag: Option<&Path>) -> PathBuf {
        flag.map(Path::to_path_buf)
            .or_else(|| self.vault.root.clone())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Effective index path for a vault root.
    pub fn db_path(&self, vault_root: &Path) -> PathBuf {
        self.vault
            .db
            .clone()
            .unwrap_or_else(|| vault_root.join(".zkn").join("index.sqlite"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let c = Config::default();
        assert_eq!(c.id.bytes, 6);
        assert_eq!(c.watch.debounce_ms, 150);
        assert!(!c.index.use_hash);
        assert!(c.ui.colors);
    }

    #[test]
    fn parses_full_file() {
        let c: Config = toml::from_str(
            r#"
            [vault]
            root = "/tmp/notes"

            [id]
            bytes = 8

            [watch]
            debounce_ms = 400

            [index]
            use_hash = true

            [export]
            out = "site"
            katex_auto = true

            [ui]
            colors = false
            "#,
        )
        .unwrap();
        assert_eq!(c.vault.root.as_deref(), Some(Path::new("/tmp/notes")));
        assert_eq!(c.id.bytes, 8);
        assert_eq!(c.watch.debounce_ms, 400);
        assert!(c.index.use_hash);
        assert!(!c.ui.colors);
    }

    #[test]
    fn db_path_defaults_under_vault() {
        let c = Config::default();
        assert_eq!(
            c.db_path(Path::new("/v")),
            PathBuf::from("/v/.zkn/index.sqlite")
        );
    }

    #[test]
    fn explicit_config_file_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[watch]\ndebounce_ms = 900\n").unwrap();

        let c = Config::load(Some(&path), None);
        assert_eq!(c.watch.debounce_ms, 900);

        // A missing explicit file degrades to defaults instead of failing.
        let c = Config::load(Some(&dir.path().join("absent.toml")), None);
        assert_eq!(c.watch.debounce_ms, WatchSection::default().debounce_ms);
    }

    #[test]
    fn override_prefers_vault_config() {
        let user: Config = toml::from_str("[watch]\ndebounce_ms = 300\n").unwrap();
        let vault: Config = toml::from_str("[watch]\ndebounce_ms = 500\n").unwrap();
        let merged = user.override_with(vault);
        assert_eq!(merged.watch.debounce_ms, 500);

        let user: Config = toml::from_str("[watch]\ndebounce_ms = 300\n").unwrap();
        let merged = user.override_with(Config::default());
        assert_eq!(merged.watch.debounce_ms, 300);
    }
}
