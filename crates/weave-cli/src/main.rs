#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{Parser, Subcommand};
use output::{CliError, OutputMode};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "wv: workflow dependency graph",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Output format (pretty, text, json). Overrides `WEAVE_FORMAT`.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Emit JSON output (same as `--format json`).
    #[arg(long, global = true, hide = true)]
    json: bool,

    /// Use this store file instead of the configured one (also `WEAVE_DB`).
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn output_mode(&self) -> OutputMode {
        output::resolve_output_mode(self.format, self.json)
    }

    fn db_override(&self) -> Option<PathBuf> {
        self.db
            .clone()
            .or_else(|| env::var_os("WEAVE_DB").map(PathBuf::from))
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Setup",
        about = "Initialize a workflow store",
        long_about = "Create .weave/ with a default config and an empty, migrated store.",
        after_help = "EXAMPLES:\n    # Initialize in the current directory\n    wv init\n\n    # Rewrite the default config\n    wv init --force"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        next_help_heading = "Workflows",
        about = "Create a workflow",
        long_about = "Create an empty workflow (project) with the given id and name.",
        after_help = "EXAMPLES:\n    # Create a workflow\n    wv create proj1 \"Alpha release\"\n\n    # Emit machine-readable output\n    wv create proj1 \"Alpha release\" --json"
    )]
    Create(cmd::create::CreateArgs),

    #[command(
        next_help_heading = "Workflows",
        about = "Show a workflow",
        long_about = "Show every task of a workflow with its status and dependencies.",
        after_help = "EXAMPLES:\n    # Show a workflow\n    wv show proj1\n\n    # Emit machine-readable output\n    wv show proj1 --json"
    )]
    Show(cmd::show::ShowArgs),

    #[command(
        next_help_heading = "Workflows",
        about = "List workflows",
        long_about = "List every workflow with its task count.",
        after_help = "EXAMPLES:\n    # List workflows\n    wv list"
    )]
    List,

    #[command(
        next_help_heading = "Workflows",
        about = "Delete a workflow",
        long_about = "Delete a workflow together with its tasks and every dependency touching them.",
        after_help = "EXAMPLES:\n    # Delete a workflow\n    wv delete proj1"
    )]
    Delete(cmd::delete::DeleteArgs),

    #[command(
        next_help_heading = "Tasks",
        about = "Add a task",
        long_about = "Add a task to a workflow. Dependencies must already exist and must not close a cycle.",
        after_help = "EXAMPLES:\n    # Add a task with no dependencies\n    wv add proj1 t1 --name Design\n\n    # Add a task depending on t1\n    wv add proj1 t2 --name Build --dep t1\n\n    # Add a task that starts blocked\n    wv add proj1 t3 --name Review --blocked"
    )]
    Add(cmd::add::AddArgs),

    #[command(
        next_help_heading = "Tasks",
        about = "Add a dependency edge",
        long_about = "Record that a task depends on another existing task.",
        after_help = "EXAMPLES:\n    # t3 depends on t2\n    wv link proj1 t3 t2"
    )]
    Link(cmd::link::LinkArgs),

    #[command(
        next_help_heading = "Tasks",
        about = "Set a task's status",
        long_about = "Move a task to pending, in_progress, done or blocked.",
        after_help = "EXAMPLES:\n    # Start a task\n    wv status proj1 t1 in_progress\n\n    # Finish it\n    wv status proj1 t1 done"
    )]
    Status(cmd::status::StatusArgs),

    #[command(
        next_help_heading = "Tasks",
        about = "Block a task",
        after_help = "EXAMPLES:\n    # Block t1\n    wv block proj1 t1"
    )]
    Block(cmd::status::TaskRef),

    #[command(
        next_help_heading = "Tasks",
        about = "Unblock a task",
        long_about = "Move a blocked task back to pending.",
        after_help = "EXAMPLES:\n    # Unblock t1\n    wv unblock proj1 t1"
    )]
    Unblock(cmd::status::TaskRef),

    #[command(
        next_help_heading = "Readiness",
        about = "Check a task's dependencies",
        long_about = "Report whether every dependency of a task is met, and which are not.",
        after_help = "EXAMPLES:\n    # Check t2\n    wv check proj1 t2\n\n    # Emit machine-readable output\n    wv check proj1 t2 --json"
    )]
    Check(cmd::check::CheckArgs),

    #[command(
        next_help_heading = "Readiness",
        about = "Is a task blocked?",
        after_help = "EXAMPLES:\n    # Look up t1 in any workflow\n    wv blocked t1"
    )]
    Blocked(cmd::check::TaskIdArgs),

    #[command(
        next_help_heading = "Readiness",
        about = "Does a task exist?",
        after_help = "EXAMPLES:\n    # Look up t1 in any workflow\n    wv exists t1"
    )]
    Exists(cmd::check::TaskIdArgs),

    #[command(
        next_help_heading = "Readiness",
        about = "List tasks ready to start",
        long_about = "List the workflow's unresolved tasks whose dependencies are all met.",
        after_help = "EXAMPLES:\n    # Ready tasks\n    wv ready proj1"
    )]
    Ready(cmd::plan::PlanArgs),

    #[command(
        next_help_heading = "Readiness",
        about = "Print an execution order",
        long_about = "Print the workflow's tasks so that each follows its dependencies.",
        after_help = "EXAMPLES:\n    # Execution order\n    wv order proj1"
    )]
    Order(cmd::plan::PlanArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("WEAVE_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "weave=debug,info"
        } else {
            "weave=info,warn"
        })
    });

    let format = env::var("WEAVE_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

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

fn run(cli: &Cli, output: OutputMode) -> anyhow::Result<()> {
    let project_root = env::current_dir()?;
    let ctx = cmd::Context {
        project_root,
        db_override: cli.db_override(),
    };
    debug!(command = ?cli.command, "dispatching");

    match &cli.command {
        Commands::Init(args) => cmd::init::run_init(args, output, &ctx),
        Commands::Create(args) => cmd::create::run_create(args, output, &ctx),
        Commands::Show(args) => cmd::show::run_show(args, output, &ctx),
        Commands::List => cmd::show::run_list(output, &ctx),
        Commands::Delete(args) => cmd::delete::run_delete(args, output, &ctx),
        Commands::Add(args) => cmd::add::run_add(args, output, &ctx),
        Commands::Link(args) => cmd::link::run_link(args, output, &ctx),
        Commands::Status(args) => cmd::status::run_status(args, output, &ctx),
        Commands::Block(task) => cmd::status::run_block(task, true, output, &ctx),
        Commands::Unblock(task) => cmd::status::run_block(task, false, output, &ctx),
        Commands::Check(args) => cmd::check::run_check(args, output, &ctx),
        Commands::Blocked(args) => cmd::check::run_blocked(args, output, &ctx),
        Commands::Exists(args) => cmd::check::run_exists(args, output, &ctx),
        Commands::Ready(args) => cmd::plan::run_ready(args, output, &ctx),
        Commands::Order(args) => cmd::plan::run_order(args, output, &ctx),
    }
}

fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    if cli.verbose {
        info!("Verbose mode enabled");
    }
    let output = cli.output_mode();

    match run(&cli, output) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let cli_error = CliError::from_anyhow(&err);
            debug!(error = ?err, code = %cli_error.error_code, "command failed");
            if let Err(render_err) = output::render_error(output, &cli_error) {
                eprintln!("error: {err:#} (and failed to render: {render_err})");
            }
            cli_error.exit_code()
        }
    }
}
