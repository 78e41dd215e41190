//! `tix list` — list tickets, oldest first.

use std::io::Write;
use std::path::Path;

use clap::Args;
use tix_core::model::{Status, Ticket};

use crate::engine::open_engine;
use crate::output::{OutputMode, engine_failure, local_time, pretty_rule, render_mode};

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only tickets in this status (e.g. in_progress).
    #[arg(short, long)]
    pub status: Option<Status>,

    /// Only tickets owned by this agent.
    #[arg(short, long)]
    pub assignee: Option<String>,
}

impl ListArgs {
    fn keeps(&self, ticket: &Ticket) -> bool {
        self.status.is_none_or(|s| ticket.status == s)
            && self
                .assignee
                .as_deref()
                .is_none_or(|a| ticket.assignee.as_deref() == Some(a))
    }
}

/// Execute `tix list`.
///
/// # Errors
///
/// Returns an error (already rendered) if the project or store cannot be read.
pub fn run_list(args: &ListArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let engine = open_engine(output, project_root)?;
    let tickets: Vec<Ticket> = engine
        .service
        .list()
        .map_err(|err| engine_failure(output, err))?
        .into_iter()
        .filter(|t| args.keeps(t))
        .collect();

    render_mode(
        output,
        &tickets,
        |t, w| render_ticket_rows(t, w),
        |t, w| render_ticket_table(t, w),
    )
}

/// One tab-separated line per ticket.
pub fn render_ticket_rows(tickets: &[Ticket], w: &mut dyn Write) -> std::io::Result<()> {
    for t in tickets {
        writeln!(
            w,
            "{}\t{}\t{}\t{}",
            t.id,
            t.status,
            t.assignee.as_deref().unwrap_or("-"),
            t.title
        )?;
    }
    Ok(())
}

/// Aligned table for human output.
pub fn render_ticket_table(tickets: &[Ticket], w: &mut dyn Write) -> std::io::Result<()> {
    if tickets.is_empty() {
        return writeln!(w, "No tickets.");
    }
    writeln!(
        w,
        "{:<16}  {:<11}  {:<12}  {:<19}  TITLE",
        "ID", "STATUS", "ASSIGNEE", "DUE"
    )?;
    pretty_rule(w)?;
    for t in tickets {
        writeln!(
            w,
            "{:<16}  {:<11}  {:<12}  {:<19}  {}",
            t.id.as_str(),
            t.status.as_str(),
            t.assignee.as_deref().unwrap_or("-"),
            t.due_at.map_or_else(|| "-".to_string(), local_time),
            t.title
        )?;
    }
    Ok(())
}
