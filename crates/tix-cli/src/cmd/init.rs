//! `tix init` — create the `.tix/` project skeleton.

use std::io::Write;
use std::path::Path;

use anyhow::{Context as _, Result};
use clap::Args;
use serde::Serialize;
use tix_core::config::{CONFIG_FILE, PROJECT_DIR, ProjectConfig, StoreBackend};
use tracing::info;

use crate::engine::open_store;
use crate::output::{CliError, OutputMode, render, render_error};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Rewrite the config even if `.tix/` already exists.
    #[arg(long)]
    pub force: bool,

    /// Store backend to record in the config: sqlite, or memory for a
    /// project used only through `tix serve`.
    #[arg(long)]
    pub backend: Option<StoreBackend>,
}

const GITIGNORE: &str = "*.db\n*.db-wal\n*.db-shm\n";

#[derive(Debug, Serialize)]
struct InitOutput {
    project_dir: String,
    config: String,
    backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    database: Option<String>,
}

/// Execute `tix init`. Creates:
///
/// ```text
/// .tix/
///   config.toml   (defaults, see `ProjectConfig`)
///   .gitignore    (database files)
///   tix.db        (SQLite store, migrated to the latest schema)
/// ```
///
/// # Errors
///
/// Returns an error if `.tix/` already exists and `--force` is not set, or if
/// any filesystem or store operation fails.
pub fn run_init(args: &InitArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let project_dir = project_root.join(PROJECT_DIR);

    if project_dir.exists() && !args.force {
        let msg = ".tix/ already exists";
        render_error(
            output,
            &CliError::with_details(
                msg,
                "use `tix init --force` to rewrite the config",
                "already_initialized",
            ),
        )?;
        anyhow::bail!("{msg}");
    }

    std::fs::create_dir_all(&project_dir)
        .with_context(|| format!("Failed to create {}", project_dir.display()))?;

    let mut config = ProjectConfig::default();
    if let Some(backend) = args.backend {
        config.store.backend = backend;
    }

    let config_path = project_dir.join(CONFIG_FILE);
    std::fs::write(&config_path, config.to_toml()?)
        .with_context(|| format!("Failed to write config: {}", config_path.display()))?;

    let gitignore_path = project_dir.join(".gitignore");
    std::fs::write(&gitignore_path, GITIGNORE)
        .with_context(|| format!("Failed to write .gitignore: {}", gitignore_path.display()))?;

    // Opening the store creates and migrates the database.
    open_store(&project_dir, &config.store)?;
    let database = (config.store.backend == StoreBackend::Sqlite)
        .then(|| project_dir.join(&config.store.path).display().to_string());

    info!(project = %project_dir.display(), backend = %config.store.backend, "initialized project");

    let payload = InitOutput {
        project_dir: project_dir.display().to_string(),
        config: config_path.display().to_string(),
        backend: config.store.backend.to_string(),
        database,
    };

    render(output, &payload, |p, w| {
        writeln!(w, "✓ Initialized {}", p.project_dir)?;
        writeln!(w)?;
        writeln!(w, "  Config:   {}", p.config)?;
        writeln!(w, "  Backend:  {}", p.backend)?;
        if let Some(ref db) = p.database {
            writeln!(w, "  Database: {db}")?;
        }
        writeln!(w)?;
        writeln!(w, "Next steps:")?;
        if p.database.is_some() {
            writeln!(w, "  tix create --title \"Printer on floor 3 is jammed\"")?;
        }
        writeln!(w, "  tix serve")
    })
}
