//! `tix assign` — name an owner, or take the `created → assigned` edge.
//!
//! With `--to`, the assignee is replaced and the status is left alone; any
//! non-terminal ticket can be reassigned. Without it, `assign` is an ordinary
//! lifecycle action and only applies to `created` tickets.

use std::io::Write;
use std::path::Path;

use clap::Args;
use tix_core::model::Action;

use crate::cmd::transition::render_transition_human;
use crate::engine::{open_engine, ticket_id};
use crate::output::{OutputMode, engine_failure, render_mode};

#[derive(Args, Debug)]
pub struct AssignArgs {
    /// Ticket id.
    pub id: String,

    /// Agent to own the ticket.
    #[arg(short, long)]
    pub to: Option<String>,

    /// Free-text note recorded on the event.
    #[arg(short, long)]
    pub note: Option<String>,
}

/// Execute `tix assign`.
///
/// # Errors
///
/// Returns an error (already rendered) if the id is unknown, the assignee is
/// blank, or the ticket no longer accepts assignment.
pub fn run_assign(
    args: &AssignArgs,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let id = ticket_id(output, &args.id)?;
    let engine = open_engine(output, project_root)?;
    let note = args.note.as_deref();

    let result = match args.to.as_deref() {
        Some(agent) => engine.service.assign(&id, agent, note),
        None => engine.service.apply_action(&id, Action::Assign, note),
    };
    let ticket = result.map_err(|err| engine_failure(output, err))?;

    render_mode(
        output,
        &ticket,
        |t, w| {
            writeln!(
                w,
                "{}\t{}\t{}",
                t.id,
                t.status,
                t.assignee.as_deref().unwrap_or("-")
            )
        },
        |t, w| render_transition_human(Action::Assign, t, w),
    )
}
