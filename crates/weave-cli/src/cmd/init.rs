use anyhow::{Context as _, Result};
use clap::Args;
use serde::Serialize;
use std::io::Write;

use weave_core::config::{WEAVE_DIR, project_config_path};
use weave_core::db::{self, migrations};

use super::{Context, display_relative};
use crate::output::{self, OutputMode};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Rewrite `.weave/config.toml` with the defaults even if it exists.
    #[arg(long)]
    pub force: bool,
}

const CONFIG_TOML: &str = "[store]\n\
    path = \".weave/weave.sqlite3\"\n\
    deadline_ms = 3000\n\
    \n\
    [graph]\n\
    # \"direct\" or \"transitive\"\n\
    readiness = \"direct\"\n\
    require_resolved = false\n\
    cross_project_dependencies = false\n";

const GITIGNORE: &str = "*.sqlite3\n*.sqlite3-wal\n*.sqlite3-shm\n";

#[derive(Debug, Serialize)]
struct InitReport {
    config: String,
    config_written: bool,
    store: String,
    schema_version: u32,
}

/// Execute `wv init`. Creates the project skeleton:
///
/// ```text
/// .weave/
///   config.toml     (default config, kept unless --force)
///   .gitignore      (store files)
///   weave.sqlite3   (migrated store)
/// ```
///
/// Running it again is safe: the store is reopened and migrated in place.
///
/// # Errors
///
/// Returns an error if the existing config is malformed or any filesystem
/// or store operation fails.
pub fn run_init(args: &InitArgs, output: OutputMode, ctx: &Context) -> Result<()> {
    let weave_dir = ctx.project_root.join(WEAVE_DIR);
    std::fs::create_dir_all(&weave_dir)
        .with_context(|| format!("Failed to create {}", weave_dir.display()))?;

    let config_path = project_config_path(&ctx.project_root);
    let config_written = args.force || !config_path.exists();
    if config_written {
        std::fs::write(&config_path, CONFIG_TOML)
            .with_context(|| format!("Failed to write config: {}", config_path.display()))?;
        let gitignore_path = weave_dir.join(".gitignore");
        std::fs::write(&gitignore_path, GITIGNORE).with_context(|| {
            format!("Failed to write .gitignore: {}", gitignore_path.display())
        })?;
    }

    let config = ctx.config()?;
    let store_path = config.store_path(&ctx.project_root);
    let conn = db::open_store(&store_path, config.store_options().deadline)?;
    let schema_version = migrations::current_schema_version(&conn)
        .context("Failed to read schema version")?;
    drop(conn);
    tracing::info!(store = %store_path.display(), schema_version, "initialized store");

    let report = InitReport {
        config: display_relative(&config_path, &ctx.project_root),
        config_written,
        store: display_relative(&store_path, &ctx.project_root),
        schema_version,
    };
    output::render_mode(
        output,
        &report,
        |r, w| {
            writeln!(w, "config\t{}", r.config)?;
            writeln!(w, "store\t{}", r.store)?;
            writeln!(w, "schema\t{}", r.schema_version)
        },
        |r, w| {
            let verb = if r.config_written { "wrote" } else { "kept" };
            writeln!(w, "✓ Initialized workflow store.")?;
            writeln!(w)?;
            output::pretty_kv(w, "Config", format!("{} ({verb})", r.config))?;
            output::pretty_kv(w, "Store", &r.store)?;
            output::pretty_kv(w, "Schema", r.schema_version.to_string())?;
            writeln!(w)?;
            writeln!(w, "Next: wv create <project-id> <name>")
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use weave_core::config::WeaveConfig;

    #[test]
    fn config_template_parses_to_defaults() {
        let parsed: WeaveConfig = toml_roundtrip(CONFIG_TOML);
        assert_eq!(parsed, WeaveConfig::default());
    }

    fn toml_roundtrip(text: &str) -> WeaveConfig {
        let dir = tempfile::tempdir().expect("temp dir");
        let weave = dir.path().join(WEAVE_DIR);
        std::fs::create_dir_all(&weave).expect("mkdir");
        std::fs::write(weave.join("config.toml"), text).expect("write");
        weave_core::config::load_config(dir.path()).expect("load")
    }
}
