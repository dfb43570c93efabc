//! `zkn init` - create the vault directory, a config stub and the index.

use anyhow::Result;

use crate::cli::{App, EXIT_OK};

const CONFIG_STUB: &str = "\
# zkn configuration
#
# [vault]
# db = \".zkn/index.sqlite\"
#
# [watch]
# debounce_ms = 150
#
# [index]
# use_hash = false
#
# [export]
# out = \"site\"
# katex_auto = true
";

pub(crate) fn run(app: &App) -> Result<i32> {
    std::fs::create_dir_all(&app.vault_root)?;

    let config_path = app.vault_root.join("zkn.toml");
    if !config_path.exists() {
        std::fs::write(&config_path, CONFIG_STUB)?;
    }

    // Opening creates the schema.
    let store = app.open_store()?;
    drop(store);

    if !app.quiet {
        println!("initialized vault at {}", app.vault_root.display());
    }
    Ok(EXIT_OK)
}
