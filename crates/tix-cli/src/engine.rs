//! Project discovery and engine wiring shared by every command.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use tix_core::clock::{Clock, SystemClock};
use tix_core::config::{PROJECT_DIR, ProjectConfig, StoreBackend, StoreConfig, resolve_config};
use tix_core::model::TicketId;
use tix_core::service::parse_ticket_id;
use tix_core::store::{MemoryStore, SqliteStore, TicketStore};
use tix_core::{ErrorCode, LifecycleService, Projector};
use tracing::{debug, warn};

use crate::output::{CliError, OutputMode, engine_failure, report_error};

/// An opened project: its resolved config plus the service and projector
/// sharing one store.
pub struct Engine {
    pub root: PathBuf,
    pub config: ProjectConfig,
    pub service: LifecycleService,
    pub projector: Projector,
}

impl Engine {
    /// Open the store named by `config` under `root/.tix`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened.
    pub fn open(root: &Path, config: ProjectConfig) -> Result<Self> {
        let store = open_store(&root.join(PROJECT_DIR), &config.store)?;
        Ok(Self::with_store(root, config, store))
    }

    pub fn with_store(root: &Path, config: ProjectConfig, store: Arc<dyn TicketStore>) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
        let service = LifecycleService::new(Arc::clone(&store), Arc::clone(&clock))
            .with_max_commit_retries(config.lifecycle.max_commit_retries);
        let projector = Projector::new(store, clock);
        Self {
            root: root.to_path_buf(),
            config,
            service,
            projector,
        }
    }
}

/// Find the directory holding `.tix/` by walking up from `start`.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(PROJECT_DIR).is_dir() {
            return Some(current);
        }
        if !current.pop() {
            return None;
        }
    }
}

/// Open the configured store. SQLite paths are relative to `project_dir`.
///
/// # Errors
///
/// Returns an error if the SQLite database cannot be opened or migrated.
pub fn open_store(project_dir: &Path, config: &StoreConfig) -> Result<Arc<dyn TicketStore>> {
    match config.backend {
        StoreBackend::Sqlite => {
            let path = project_dir.join(&config.path);
            debug!(path = %path.display(), "opening sqlite ticket store");
            let store = SqliteStore::open_with(&path, config.timeout(), config.pool_size)
                .with_context(|| format!("Failed to open ticket store {}", path.display()))?;
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            warn!("memory store selected: tickets are lost when the server exits");
            Ok(Arc::new(MemoryStore::with_timeout(config.timeout())))
        }
    }
}

/// Resolve the project config, rendering parse failures in `output` mode.
///
/// # Errors
///
/// Returns an error if the config file or an environment override is malformed.
pub fn load_config(output: OutputMode, root: &Path) -> Result<ProjectConfig> {
    resolve_config(root).map_err(|err| {
        let code = ErrorCode::ConfigParseError;
        report_error(
            output,
            &CliError::with_details(
                format!("{}: {err:#}", code.message()),
                code.hint().unwrap_or_default(),
                code.code(),
            ),
        );
        err
    })
}

fn locate_project(output: OutputMode, start: &Path) -> Result<(PathBuf, ProjectConfig)> {
    let root = find_project_root(start).ok_or_else(|| {
        let code = ErrorCode::NotInitialized;
        let msg = "Not a tix project: .tix directory not found";
        report_error(
            output,
            &CliError::with_details(msg, code.hint().unwrap_or_default(), code.code()),
        );
        anyhow::anyhow!("{msg}")
    })?;
    let config = load_config(output, &root)?;
    Ok((root, config))
}

/// Refuse a memory-backed project for commands that exit after one call; each
/// would start from an empty store.
fn require_durable_store(output: OutputMode, config: &StoreConfig) -> Result<()> {
    if config.backend != StoreBackend::Memory {
        return Ok(());
    }
    let msg = "The memory store only lives inside `tix serve`";
    report_error(
        output,
        &CliError::with_details(
            msg,
            "Run `tix serve`, or set store.backend = \"sqlite\" in .tix/config.toml.",
            ErrorCode::InvalidInput.code(),
        ),
    );
    anyhow::bail!("{msg}")
}

/// Discover the project above `start` and open its engine for a one-shot
/// command.
///
/// # Errors
///
/// Returns an error (already rendered) when no `.tix/` directory exists, the
/// config is malformed or selects the memory store, or the store cannot be
/// opened.
pub fn open_engine(output: OutputMode, start: &Path) -> Result<Engine> {
    let (root, config) = locate_project(output, start)?;
    require_durable_store(output, &config.store)?;
    Engine::open(&root, config)
}

/// Like [`open_engine`], for the long-lived server, which may keep tickets in
/// memory.
///
/// # Errors
///
/// Returns an error (already rendered) when no `.tix/` directory exists or the
/// config is malformed, or an error if the store cannot be opened.
pub fn open_serving_engine(output: OutputMode, start: &Path) -> Result<Engine> {
    let (root, config) = locate_project(output, start)?;
    Engine::open(&root, config)
}

/// Parse a ticket id, accepting the bare hex form: "3fa9" → "tk-3fa9".
///
/// # Errors
///
/// Returns an error (already rendered) when the id is malformed.
pub fn ticket_id(output: OutputMode, raw: &str) -> Result<TicketId> {
    let raw = raw.trim();
    let full = if raw.starts_with(TicketId::PREFIX) {
        raw.to_string()
    } else {
        format!("{}{raw}", TicketId::PREFIX)
    };
    parse_ticket_id(&full).map_err(|err| engine_failure(output, err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn finds_project_in_ancestor() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(PROJECT_DIR)).unwrap();
        let nested = dir.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_project_root(&nested).as_deref(), Some(dir.path()));
    }

    #[test]
    fn missing_project_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(find_project_root(dir.path()).is_none());
    }

    #[test]
    fn bare_ids_gain_the_prefix() {
        assert_eq!(
            ticket_id(OutputMode::Text, "3fa9").unwrap().as_str(),
            "tk-3fa9"
        );
        assert_eq!(
            ticket_id(OutputMode::Text, " tk-3fa9 ").unwrap().as_str(),
            "tk-3fa9"
        );
    }

    #[test]
    fn engine_opens_sqlite_store_under_project_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(PROJECT_DIR)).unwrap();

        let engine = Engine::open(dir.path(), ProjectConfig::default()).unwrap();
        let ticket = engine
            .service
            .create(tix_core::model::NewTicket::new("printer jam"))
            .unwrap();
        assert_eq!(engine.service.get(&ticket.id).unwrap().title, "printer jam");
        assert!(dir.path().join(PROJECT_DIR).join("tix.db").exists());
    }

    fn memory_project() -> TempDir {
        let dir = TempDir::new().unwrap();
        let project_dir = dir.path().join(PROJECT_DIR);
        std::fs::create_dir_all(&project_dir).unwrap();
        let mut config = ProjectConfig::default();
        config.store.backend = StoreBackend::Memory;
        std::fs::write(
            project_dir.join(tix_core::config::CONFIG_FILE),
            config.to_toml().unwrap(),
        )
        .unwrap();
        dir
    }

    #[test]
    fn one_shot_commands_refuse_memory_store() {
        let dir = memory_project();
        let err = open_engine(OutputMode::Json, dir.path()).err().unwrap();
        assert!(err.to_string().contains("tix serve"));
    }

    #[test]
    fn server_accepts_memory_store() {
        let dir = memory_project();
        let engine = open_serving_engine(OutputMode::Json, dir.path()).unwrap();
        assert_eq!(engine.config.store.backend, StoreBackend::Memory);
        assert!(!dir.path().join(PROJECT_DIR).join("tix.db").exists());
    }
}
