//! CLI implementation for zkn.

mod commands;
mod signal;
mod watch;

pub(crate) use signal::{cancel_flag, setup_signal_handler};

use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};

use zkn::config::Config;
use zkn::migrate::{IdStrategy, LinkFormat, OnConflict, Prefer, ResolveMode};
use zkn::store::Store;
use zkn::vault::Vault;

/// Exit codes shared by all subcommands.
///
/// 0 success; 1 recoverable failure (missing note or anchor, dead links in
/// audit); 2 ambiguity; 130 interrupted.
pub const EXIT_OK: i32 = 0;
pub const EXIT_RECOVERABLE: i32 = 1;
pub const EXIT_AMBIGUOUS: i32 = 2;

#[derive(Parser)]
#[command(name = "zkn")]
#[command(about = "Plain-text knowledge base with a durable index")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Vault directory (default: config, then current directory)
    #[arg(long, global = true, env = "ZKN_VAULT")]
    vault: Option<PathBuf>,

    /// Config file to use instead of the vault's zkn.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output as JSON where supported
    #[arg(long, global = true)]
    json: bool,

    /// Suppress progress output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Show debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the vault directory, config stub and index
    Init,
    /// Print a fresh random note id
    Id,
    /// Create a new note
    New {
        /// Title stored in the header and as the first heading
        #[arg(short, long)]
        title: Option<String>,
        /// Extra header entries, `key=value`
        #[arg(short, long)]
        meta: Vec<String>,
        /// Open the new note in $EDITOR
        #[arg(short, long)]
        edit: bool,
    },
    /// Print a note body (whole, no header)
    Show {
        /// Note reference: `id`, `id#slug` or `id#^label`
        reference: String,
    },
    /// Open a note in $EDITOR
    Edit { id: String },
    /// Delete a note file
    Rm { id: String },
    /// List note ids
    Ls {
        /// Only notes whose body contains this substring
        #[arg(long)]
        grep: Option<String>,
        /// Only notes with no incoming or outgoing links
        #[arg(long)]
        orphans: bool,
    },
    /// Print the slice a reference addresses
    Yank {
        /// Note reference: `id`, `id#slug` or `id#^label`
        reference: String,
    },
    /// Print offsets and line numbers for a reference
    Locate {
        reference: String,
        /// Output format
        #[arg(long, default_value = "json", value_parser = ["json", "tsv"])]
        format: String,
    },
    /// Rebuild or refresh the index
    Reindex {
        /// Reindex every note, then compact the database
        #[arg(long)]
        full: bool,
        /// Confirm unchanged mtime/size with a content digest
        #[arg(long)]
        hash: bool,
    },
    /// Show index statistics
    Stats,
    /// Full-text search
    Search {
        query: String,
        /// Max results
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
        /// Show highlighted snippets
        #[arg(long)]
        snippets: bool,
    },
    /// Show notes linking to a note
    Backrefs { id: String },
    /// Print the whole vault graph as JSON
    Graph,
    /// Watch the vault and keep the index current
    Watch {
        /// Debounce window in milliseconds
        #[arg(long)]
        debounce: Option<u64>,
    },
    /// Resolve a title or alias to a note id
    Resolve {
        text: String,
        #[arg(long, value_enum, default_value = "both")]
        mode: ResolveMode,
        #[arg(long, value_enum, default_value = "alias")]
        prefer: Prefer,
    },
    /// Rewrite title/path links to id-based links across the vault
    MigrateLinks {
        /// Which link syntaxes to rewrite
        #[arg(long, value_enum, default_value = "mixed")]
        from: LinkFormat,
        #[arg(long, value_enum, default_value = "both")]
        mode: ResolveMode,
        #[arg(long, value_enum, default_value = "alias")]
        prefer: Prefer,
        /// Print diffs instead of writing files
        #[arg(long)]
        dry_run: bool,
    },
    /// Bulk import foreign notes
    #[command(subcommand)]
    Import(ImportCommands),
    /// Check link and label integrity
    Audit {
        /// Treat unmigrated links as errors
        #[arg(long)]
        strict: bool,
    },
    /// Normalize note text (links, whitespace, header order)
    Fmt {
        /// Wrap paragraphs at this column (0 = off)
        #[arg(long, default_value = "0")]
        wrap: usize,
        /// Collapse `[[id|id]]` to `[[id]]`
        #[arg(long)]
        ids_only: bool,
        /// Also rewrite the header into canonical key order
        #[arg(long)]
        header: bool,
        /// Print changed ids instead of writing
        #[arg(long)]
        dry_run: bool,
    },
    /// Export a static site with transclusions expanded
    Export {
        /// Output directory
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
enum ImportCommands {
    /// Scan a directory and write an import plan
    Plan {
        /// Source directory to scan
        src: PathBuf,
        /// Where to write the plan JSON
        #[arg(long, default_value = "import-plan.json")]
        out: PathBuf,
        #[arg(long, value_enum, default_value = "random")]
        id_strategy: IdStrategy,
        /// Random/hash id length in bytes
        #[arg(long, default_value = "6")]
        id_bytes: usize,
    },
    /// Execute a plan against the vault
    Apply {
        /// Plan JSON produced by `import plan`
        plan: PathBuf,
        /// Move files instead of copying
        #[arg(long)]
        r#move: bool,
        #[arg(long, value_enum, default_value = "fail")]
        on_conflict: OnConflict,
        #[arg(long)]
        dry_run: bool,
    },
    /// Undo an apply using its manifest
    Rollback {
        /// Manifest JSON written by `import apply`
        manifest: PathBuf,
        #[arg(long)]
        dry_run: bool,
    },
}

/// Everything a command needs: merged config plus resolved paths.
pub(crate) struct App {
    pub config: Config,
    pub vault_root: PathBuf,
    pub json: bool,
    pub quiet: bool,
}

impl App {
    fn from_cli(cli: &Cli) -> Self {
        let config = Config::load(cli.config.as_deref(), cli.vault.as_deref());
        let vault_root = config.vault_root(cli.vault.as_deref());
        if cli.json || !config.ui.colors {
            colored::control::set_override(false);
        }
        App {
            vault_root,
            json: cli.json,
            quiet: cli.quiet,
            config,
        }
    }

    pub fn vault(&self) -> Vault {
        Vault::new(&self.vault_root)
    }

    pub fn open_store(&self) -> anyhow::Result<Store> {
        let db = self.config.db_path(&self.vault_root);
        Ok(Store::open(&db)?)
    }
}

/// Dispatch a parsed command line; returns the process exit code.
pub fn run_with(cli: Cli) -> Result<i32> {
    setup_signal_handler();
    let app = App::from_cli(&cli);

    match &cli.command {
        Commands::Init => commands::init::run(&app),
        Commands::Id => commands::notes::cmd_id(&app),
        Commands::New { title, meta, edit } => {
            commands::notes::cmd_new(&app, title.as_deref(), meta, *edit)
        }
        Commands::Show { reference } => commands::notes::cmd_show(&app, reference),
        Commands::Edit { id } => commands::notes::cmd_edit(&app, id),
        Commands::Rm { id } => commands::notes::cmd_rm(&app, id),
        Commands::Ls { grep, orphans } => commands::notes::cmd_ls(&app, grep.as_deref(), *orphans),
        Commands::Yank { reference } => commands::notes::cmd_yank(&app, reference),
        Commands::Locate { reference, format } => {
            commands::notes::cmd_locate(&app, reference, format)
        }
        Commands::Reindex { full, hash } => commands::index::cmd_reindex(&app, *full, *hash),
        Commands::Stats => commands::index::cmd_stats(&app),
        Commands::Search {
            query,
            limit,
            snippets,
        } => commands::index::cmd_search(&app, query, *limit, *snippets),
        Commands::Backrefs { id } => commands::index::cmd_backrefs(&app, id),
        Commands::Graph => commands::index::cmd_graph(&app),
        Commands::Watch { debounce } => watch::cmd_watch(&app, *debounce),
        Commands::Resolve { text, mode, prefer } => {
            commands::migrate::cmd_resolve(&app, text, *mode, *prefer)
        }
        Commands::MigrateLinks {
            from,
            mode,
            prefer,
            dry_run,
        } => commands::migrate::cmd_migrate_links(&app, *from, *mode, *prefer, *dry_run),
        Commands::Import(sub) => match sub {
            ImportCommands::Plan {
                src,
                out,
                id_strategy,
                id_bytes,
            } => commands::migrate::cmd_import_plan(&app, src, out, *id_strategy, *id_bytes),
            ImportCommands::Apply {
                plan,
                r#move,
                on_conflict,
                dry_run,
            } => commands::migrate::cmd_import_apply(&app, plan, *r#move, *on_conflict, *dry_run),
            ImportCommands::Rollback { manifest, dry_run } => {
                commands::migrate::cmd_import_rollback(&app, manifest, *dry_run)
            }
        },
        Commands::Audit { strict } => commands::migrate::cmd_audit(&app, *strict),
        Commands::Fmt {
            wrap,
            ids_only,
            header,
            dry_run,
        } => commands::site::cmd_fmt(&app, *wrap, *ids_only, *header, *dry_run),
        Commands::Export { out } => commands::site::cmd_export(&app, out.as_deref()),
        Commands::Completions { shell } => {
            clap_complete::generate(
                *shell,
                &mut Cli::command(),
                "zkn",
                &mut std::io::stdout(),
            );
            Ok(EXIT_OK)
        }
    }
}
