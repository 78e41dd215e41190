//! tix-core: the ticket lifecycle engine.
//!
//! # Conventions
//!
//! - **Errors**: library operations return [`error::EngineError`]; config and
//!   glue use `anyhow::Result`.
//! - **Logging**: use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod authority;
pub mod clock;
pub mod config;
pub mod error;
pub mod lock;
pub mod model;
pub mod projector;
pub mod replay;
pub mod service;
pub mod store;

pub use authority::{Decision, DenyReason, allowed_actions, authorize_assignment, decide};
pub use error::{EngineError, ErrorCode, ErrorKind};
pub use projector::{Dashboard, Projector, StatusHistogram};
pub use service::LifecycleService;
