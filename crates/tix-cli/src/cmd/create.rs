//! `tix create` — open a new ticket.

use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use clap::Args;
use tix_core::model::{NewTicket, Ticket};

use crate::engine::open_engine;
use crate::output::{OutputMode, engine_failure, local_time, render_mode};

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Short summary of the problem.
    #[arg(short, long)]
    pub title: String,

    /// Longer free-text description.
    #[arg(short, long)]
    pub desc: Option<String>,

    /// Deadline as an RFC 3339 timestamp (e.g. 2026-11-02T17:00:00Z).
    #[arg(long)]
    pub due: Option<DateTime<Utc>>,
}

impl CreateArgs {
    fn to_new_ticket(&self) -> NewTicket {
        let mut input = NewTicket::new(self.title.clone());
        if let Some(ref desc) = self.desc {
            input = input.with_description(desc.clone());
        }
        if let Some(due) = self.due {
            input = input.with_due_at(due);
        }
        input
    }
}

/// Execute `tix create`.
///
/// # Errors
///
/// Returns an error (already rendered) if the project cannot be opened or the
/// title is rejected.
pub fn run_create(
    args: &CreateArgs,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let engine = open_engine(output, project_root)?;
    let ticket = engine
        .service
        .create(args.to_new_ticket())
        .map_err(|err| engine_failure(output, err))?;

    render_mode(
        output,
        &ticket,
        |t, w| writeln!(w, "{}\t{}\t{}", t.id, t.status, t.title),
        |t, w| render_created_human(t, w),
    )
}

fn render_created_human(ticket: &Ticket, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(w, "✓ Created {}: {}", ticket.id, ticket.title)?;
    if let Some(due) = ticket.due_at {
        writeln!(w, "  due {}", local_time(due))?;
    }
    Ok(())
}
