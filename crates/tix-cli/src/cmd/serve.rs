//! `tix serve` — expose the engine over HTTP.

use std::path::Path;

use anyhow::Context as _;
use clap::Args;
use tix_core::config::StoreBackend;
use tracing::info;

use crate::engine::{Engine, find_project_root, load_config, open_serving_engine};
use crate::output::OutputMode;
use crate::server::{self, AppState};

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Listen address, overriding `server.addr` from the config.
    #[arg(long)]
    pub addr: Option<String>,

    /// Serve from an in-memory store. Works outside a project.
    #[arg(long)]
    pub memory: bool,
}

/// Execute `tix serve`. Blocks until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the project cannot be opened, the address cannot be
/// bound, or the runtime fails to start.
pub fn run_serve(args: &ServeArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let engine = if args.memory {
        let root = find_project_root(project_root).unwrap_or_else(|| project_root.to_path_buf());
        let mut config = load_config(output, &root)?;
        config.store.backend = StoreBackend::Memory;
        Engine::open(&root, config)?
    } else {
        open_serving_engine(output, project_root)?
    };

    let addr = args
        .addr
        .clone()
        .unwrap_or_else(|| engine.config.server.addr.clone());
    info!(
        root = %engine.root.display(),
        backend = ?engine.config.store.backend,
        "starting http server"
    );

    let state = AppState::new(
        engine.service,
        engine.projector,
        engine.config.projections.default_limit,
    );
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?
        .block_on(server::serve(&addr, state))
}
