//! `tix verify` — replay a ticket's audit log against its stored record.

use std::io::Write;
use std::path::Path;

use clap::Args;
use serde::Serialize;
use tix_core::model::{Status, TicketId};

use crate::engine::{open_engine, ticket_id};
use crate::output::{OutputMode, engine_failure, render};

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Ticket id.
    pub id: String,
}

#[derive(Debug, Serialize)]
struct VerifyOutput {
    id: TicketId,
    ok: bool,
    status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    assignee: Option<String>,
    events: u64,
}

/// Execute `tix verify`.
///
/// # Errors
///
/// Returns an error (already rendered) if the id is unknown or the log does
/// not replay to the stored status, assignee, and version.
pub fn run_verify(
    args: &VerifyArgs,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let id = ticket_id(output, &args.id)?;
    let engine = open_engine(output, project_root)?;
    let replayed = engine
        .service
        .verify(&id)
        .map_err(|err| engine_failure(output, err))?;

    let payload = VerifyOutput {
        id,
        ok: true,
        status: replayed.status,
        assignee: replayed.assignee,
        events: replayed.version,
    };
    render(output, &payload, |p, w| {
        writeln!(w, "✓ {}: {} events replay to {}", p.id, p.events, p.status)
    })
}
