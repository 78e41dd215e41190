//! `tix show` — display one ticket and what can happen to it next.
//!
//! Accepts bare ids: "3fa9" → "tk-3fa9".

use std::io::Write;
use std::path::Path;

use chrono::Utc;
use clap::Args;
use serde::Serialize;
use tix_core::model::{Action, Ticket};
use tix_core::{allowed_actions, authorize_assignment};

use crate::engine::{open_engine, ticket_id};
use crate::output::{
    OutputMode, engine_failure, local_time, pretty_kv, pretty_rule, pretty_section, render_mode,
};

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Ticket id to display.
    pub id: String,
}

/// Ticket detail as returned in JSON output.
#[derive(Debug, Serialize)]
pub struct ShowTicket {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub overdue: bool,
    /// Actions the lifecycle table accepts from the current status.
    pub allowed_actions: Vec<Action>,
    /// Whether the ticket can still be reassigned.
    pub assignable: bool,
}

impl ShowTicket {
    pub fn new(ticket: Ticket) -> Self {
        let overdue = ticket.is_overdue(Utc::now());
        let allowed_actions = allowed_actions(ticket.status);
        let assignable = authorize_assignment(ticket.status).is_ok();
        Self {
            ticket,
            overdue,
            allowed_actions,
            assignable,
        }
    }

    fn actions_line(&self) -> String {
        if self.allowed_actions.is_empty() {
            return "none".to_string();
        }
        self.allowed_actions
            .iter()
            .copied()
            .map(Action::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Execute `tix show`.
///
/// # Errors
///
/// Returns an error (already rendered) if the id is malformed or unknown.
pub fn run_show(args: &ShowArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let id = ticket_id(output, &args.id)?;
    let engine = open_engine(output, project_root)?;
    let ticket = engine
        .service
        .get(&id)
        .map_err(|err| engine_failure(output, err))?;

    render_mode(
        output,
        &ShowTicket::new(ticket),
        |t, w| render_show_text(t, w),
        |t, w| render_show_human(t, w),
    )
}

fn render_show_human(show: &ShowTicket, w: &mut dyn Write) -> std::io::Result<()> {
    let t = &show.ticket;
    pretty_section(w, &format!("Ticket {}", t.id))?;
    writeln!(w, "{}", t.title)?;
    pretty_rule(w)?;
    pretty_kv(w, "status", t.status.as_str())?;
    pretty_kv(w, "assignee", t.assignee.as_deref().unwrap_or("(unassigned)"))?;
    pretty_kv(w, "created", local_time(t.created_at))?;
    pretty_kv(w, "updated", local_time(t.updated_at))?;
    if let Some(due) = t.due_at {
        let flag = if show.overdue { "  OVERDUE" } else { "" };
        pretty_kv(w, "due", format!("{}{flag}", local_time(due)))?;
    }
    pretty_kv(w, "next", show.actions_line())?;

    if !t.description.is_empty() {
        writeln!(w)?;
        pretty_section(w, "Description")?;
        for line in t.description.lines() {
            writeln!(w, "{line}")?;
        }
    }
    Ok(())
}

fn render_show_text(show: &ShowTicket, w: &mut dyn Write) -> std::io::Result<()> {
    let t = &show.ticket;
    writeln!(w, "id:          {}", t.id)?;
    writeln!(w, "title:       {}", t.title)?;
    writeln!(w, "status:      {}", t.status)?;
    if let Some(ref assignee) = t.assignee {
        writeln!(w, "assignee:    {assignee}")?;
    }
    writeln!(w, "created_at:  {}", t.created_at.to_rfc3339())?;
    writeln!(w, "updated_at:  {}", t.updated_at.to_rfc3339())?;
    if let Some(due) = t.due_at {
        writeln!(w, "due_at:      {}", due.to_rfc3339())?;
        writeln!(w, "overdue:     {}", show.overdue)?;
    }
    writeln!(w, "next:        {}", show.actions_line())?;
    if !t.description.is_empty() {
        writeln!(w, "desc:        {}", t.description)?;
    }
    Ok(())
}
