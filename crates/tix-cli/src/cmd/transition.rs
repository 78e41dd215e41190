//! `tix start|wait|escalate|resolve|close|cancel|reopen` — apply one
//! lifecycle action.
//!
//! The lifecycle table decides; a denied action is reported with its reason
//! (`illegal_transition` or `ticket_terminal`) and nothing is recorded.

use std::io::Write;
use std::path::Path;

use clap::Args;
use tix_core::model::{Action, Ticket};

use crate::engine::{open_engine, ticket_id};
use crate::output::{OutputMode, engine_failure, render_mode};

#[derive(Args, Debug)]
pub struct TransitionArgs {
    /// Ticket id.
    pub id: String,

    /// Free-text note recorded on the event.
    #[arg(short, long)]
    pub note: Option<String>,
}

/// Execute a status-changing command for `action`.
///
/// # Errors
///
/// Returns an error (already rendered) if the id is unknown or the lifecycle
/// table denies the action.
pub fn run_transition(
    action: Action,
    args: &TransitionArgs,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let id = ticket_id(output, &args.id)?;
    let engine = open_engine(output, project_root)?;
    let ticket = engine
        .service
        .apply_action(&id, action, args.note.as_deref())
        .map_err(|err| engine_failure(output, err))?;

    render_mode(
        output,
        &ticket,
        |t, w| writeln!(w, "{}\t{}", t.id, t.status),
        |t, w| render_transition_human(action, t, w),
    )
}

/// Confirmation line shared by every mutating command.
pub fn render_transition_human(
    action: Action,
    ticket: &Ticket,
    w: &mut dyn Write,
) -> std::io::Result<()> {
    write!(w, "✓ {action} {}: now {}", ticket.id, ticket.status)?;
    if let Some(ref assignee) = ticket.assignee {
        write!(w, " (assignee {assignee})")?;
    }
    writeln!(w)
}
