//! `tix events` — a ticket's audit log, oldest first.

use std::io::Write;
use std::path::Path;

use clap::Args;
use serde::Serialize;
use tix_core::model::{TicketEvent, TicketId};

use crate::engine::{open_engine, ticket_id};
use crate::output::{OutputMode, engine_failure, local_time, pretty_rule, render_mode};

#[derive(Args, Debug)]
pub struct EventsArgs {
    /// Ticket id.
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct EventLog {
    pub id: TicketId,
    pub events: Vec<TicketEvent>,
}

/// Execute `tix events`.
///
/// # Errors
///
/// Returns an error (already rendered) if the id is unknown.
pub fn run_events(
    args: &EventsArgs,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let id = ticket_id(output, &args.id)?;
    let engine = open_engine(output, project_root)?;
    let events = engine
        .service
        .events(&id)
        .map_err(|err| engine_failure(output, err))?;

    render_mode(
        output,
        &EventLog { id, events },
        |log, w| render_events_text(log, w),
        |log, w| render_events_human(log, w),
    )
}

fn transition(event: &TicketEvent) -> String {
    match event.from_status {
        Some(from) if from != event.to_status => format!("{from} -> {}", event.to_status),
        _ => event.to_status.to_string(),
    }
}

fn render_events_human(log: &EventLog, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(w, "Events for {} ({})", log.id, log.events.len())?;
    pretty_rule(w)?;
    for event in &log.events {
        write!(
            w,
            "{:>3}  {}  {:<9}  {}",
            event.seq,
            local_time(event.at),
            event.event_type.as_str(),
            transition(event)
        )?;
        if let Some(ref assignee) = event.assignee {
            write!(w, "  [{assignee}]")?;
        }
        if let Some(ref note) = event.note {
            write!(w, "  \"{note}\"")?;
        }
        writeln!(w)?;
    }
    Ok(())
}

fn render_events_text(log: &EventLog, w: &mut dyn Write) -> std::io::Result<()> {
    for event in &log.events {
        writeln!(
            w,
            "{}\t{}\t{}\t{}\t{}\t{}",
            event.seq,
            event.at.to_rfc3339(),
            event.event_type,
            transition(event),
            event.assignee.as_deref().unwrap_or("-"),
            event.note.as_deref().unwrap_or("")
        )?;
    }
    Ok(())
}
