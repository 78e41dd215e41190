#![forbid(unsafe_code)]

mod cmd;
mod engine;
mod output;
mod server;

use clap::{CommandFactory, Parser, Subcommand};
use output::{OutputMode, resolve_output_mode};
use std::env;
use tix_core::model::Action;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "tix: support ticket lifecycle engine",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Output format (pretty, text, json). Overrides FORMAT.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn output_mode(&self) -> OutputMode {
        resolve_output_mode(self.format, self.json)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Project",
        about = "Initialize a tix project",
        long_about = "Create .tix/ with a default config and an empty ticket store.",
        after_help = "EXAMPLES:\n    # Initialize a project in the current directory\n    tix init\n\n    # Project whose tickets live only inside `tix serve`\n    tix init --backend memory"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Open a new ticket",
        long_about = "Create a ticket in the created status with no assignee.",
        after_help = "EXAMPLES:\n    # Open a ticket\n    tix create --title \"VPN down\"\n\n    # With a deadline\n    tix create -t \"VPN down\" --due 2026-11-02T17:00:00Z\n\n    # Emit machine-readable output\n    tix create -t \"VPN down\" --json"
    )]
    Create(cmd::create::CreateArgs),

    #[command(
        next_help_heading = "Read",
        about = "List tickets",
        long_about = "List tickets oldest first, optionally filtered by status or assignee.",
        after_help = "EXAMPLES:\n    # Everything\n    tix list\n\n    # Bob's open work\n    tix list --status in_progress --assignee bob"
    )]
    List(cmd::list::ListArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show one ticket",
        long_about = "Show a ticket with the actions its current status accepts.",
        after_help = "EXAMPLES:\n    # Show a ticket\n    tix show tk-3fa9\n\n    # The prefix is optional\n    tix show 3fa9"
    )]
    Show(cmd::show::ShowArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Assign a ticket",
        long_about = "Without --to, move a created ticket to assigned. With --to, set the owner and keep the status.",
        after_help = "EXAMPLES:\n    # Hand a ticket to bob\n    tix assign tk-3fa9 --to bob\n\n    # Mark as assigned\n    tix assign tk-3fa9"
    )]
    Assign(cmd::assign::AssignArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Start work on a ticket",
        after_help = "EXAMPLES:\n    tix start tk-3fa9 --note \"on it\""
    )]
    Start(cmd::transition::TransitionArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Park a ticket waiting on the customer",
        after_help = "EXAMPLES:\n    tix wait tk-3fa9 --note \"asked for logs\""
    )]
    Wait(cmd::transition::TransitionArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Escalate a ticket",
        after_help = "EXAMPLES:\n    tix escalate tk-3fa9"
    )]
    Escalate(cmd::transition::TransitionArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Resolve a ticket",
        after_help = "EXAMPLES:\n    tix resolve tk-3fa9 --note \"replaced cable\""
    )]
    Resolve(cmd::transition::TransitionArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Close a ticket",
        long_about = "Close a ticket that is not resolved. Resolved tickets can only be reopened.",
        after_help = "EXAMPLES:\n    tix close tk-3fa9"
    )]
    Close(cmd::transition::TransitionArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Cancel a ticket",
        after_help = "EXAMPLES:\n    tix cancel tk-3fa9 --note \"duplicate\""
    )]
    Cancel(cmd::transition::TransitionArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Reopen a resolved ticket",
        after_help = "EXAMPLES:\n    tix reopen tk-3fa9 --note \"came back\""
    )]
    Reopen(cmd::transition::TransitionArgs),

    #[command(
        next_help_heading = "History",
        about = "Show a ticket's audit log",
        after_help = "EXAMPLES:\n    tix events tk-3fa9\n\n    # Emit machine-readable output\n    tix events tk-3fa9 --json"
    )]
    Events(cmd::events::EventsArgs),

    #[command(
        next_help_heading = "History",
        about = "Show per-round timing for a ticket",
        long_about = "Split the audit log into handling rounds (one per reopen) with milestone times.",
        after_help = "EXAMPLES:\n    tix cycles tk-3fa9"
    )]
    Cycles(cmd::cycles::CyclesArgs),

    #[command(
        next_help_heading = "History",
        about = "Check a ticket against its audit log",
        long_about = "Replay the audit log and compare status, assignee, and version with the stored record.",
        after_help = "EXAMPLES:\n    tix verify tk-3fa9"
    )]
    Verify(cmd::verify::VerifyArgs),

    #[command(
        next_help_heading = "Reports",
        about = "Count tickets per status",
        after_help = "EXAMPLES:\n    tix stats\n\n    # Emit machine-readable output\n    tix stats --json"
    )]
    Stats(cmd::stats::StatsArgs),

    #[command(
        next_help_heading = "Reports",
        about = "List tickets nobody owns",
        long_about = "Unassigned tickets in created or waiting, newest first.",
        after_help = "EXAMPLES:\n    tix unassigned --limit 10"
    )]
    Unassigned(cmd::backlog::BacklogArgs),

    #[command(
        next_help_heading = "Reports",
        about = "List tickets past their deadline",
        long_about = "Non-terminal tickets whose due date has passed, most overdue first.",
        after_help = "EXAMPLES:\n    tix overdue"
    )]
    Overdue(cmd::backlog::BacklogArgs),

    #[command(
        next_help_heading = "Reports",
        about = "Counts plus both backlogs",
        after_help = "EXAMPLES:\n    tix dashboard --limit 5"
    )]
    Dashboard(cmd::backlog::BacklogArgs),

    #[command(
        next_help_heading = "Project",
        about = "Serve the engine over HTTP",
        long_about = "Run the JSON HTTP API until Ctrl-C.",
        after_help = "EXAMPLES:\n    # Use the address from .tix/config.toml\n    tix serve\n\n    # Scratch server, no project needed\n    tix serve --memory --addr 127.0.0.1:8080"
    )]
    Serve(cmd::serve::ServeArgs),

    #[command(
        next_help_heading = "Project",
        about = "Generate shell completion scripts",
        after_help = "EXAMPLES:\n    tix completions bash\n\n    tix completions zsh"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("TIX_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "tix=debug,tix_core=debug,info"
        } else {
            "tix=info,tix_core=info,warn"
        })
    });

    let format = env::var("TIX_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let project_root = env::current_dir()?;
    let output = cli.output_mode();

    let transition = |action: Action, args: &cmd::transition::TransitionArgs| {
        cmd::transition::run_transition(action, args, output, &project_root)
    };

    match cli.command {
        Commands::Init(ref args) => cmd::init::run_init(args, output, &project_root),
        Commands::Create(ref args) => cmd::create::run_create(args, output, &project_root),
        Commands::List(ref args) => cmd::list::run_list(args, output, &project_root),
        Commands::Show(ref args) => cmd::show::run_show(args, output, &project_root),
        Commands::Assign(ref args) => cmd::assign::run_assign(args, output, &project_root),
        Commands::Start(ref args) => transition(Action::Start, args),
        Commands::Wait(ref args) => transition(Action::Wait, args),
        Commands::Escalate(ref args) => transition(Action::Escalate, args),
        Commands::Resolve(ref args) => transition(Action::Resolve, args),
        Commands::Close(ref args) => transition(Action::Close, args),
        Commands::Cancel(ref args) => transition(Action::Cancel, args),
        Commands::Reopen(ref args) => transition(Action::Reopen, args),
        Commands::Events(ref args) => cmd::events::run_events(args, output, &project_root),
        Commands::Cycles(ref args) => cmd::cycles::run_cycles(args, output, &project_root),
        Commands::Verify(ref args) => cmd::verify::run_verify(args, output, &project_root),
        Commands::Stats(ref args) => cmd::stats::run_stats(args, output, &project_root),
        Commands::Unassigned(ref args) => {
            cmd::backlog::run_unassigned(args, output, &project_root)
        }
        Commands::Overdue(ref args) => cmd::backlog::run_overdue(args, output, &project_root),
        Commands::Dashboard(ref args) => cmd::backlog::run_dashboard(args, output, &project_root),
        Commands::Serve(ref args) => cmd::serve::run_serve(args, output, &project_root),
        Commands::Completions(ref args) => {
            let mut command = Cli::command();
            cmd::completions::run_completions(args, &mut command)
        }
    }
}
