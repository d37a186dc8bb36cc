#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{Parser, Subcommand};
use cmd::{Context, WorkspaceError};
use output::{CliError, OutputMode};
use stagegate_core::config::{self, EffectiveConfig};
use stagegate_core::store::StoreError;
use stagegate_core::{ErrorCode, TrackError};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Exit status for faults (store, config, I/O).
const EXIT_FAULT: u8 = 1;
/// Exit status for rejected requests (locked stage, unknown id).
const EXIT_REJECTED: u8 = 2;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "sg: stage-gated production tracking",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Member reference recorded on checks and defect reports.
    #[arg(long, global = true)]
    actor: Option<String>,

    /// Workspace directory (defaults to the current directory).
    #[arg(long, global = true, value_name = "DIR")]
    dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Workspace",
        about = "Initialize a stagegate workspace",
        after_help = "EXAMPLES:\n    # Initialize with a sqlite store\n    sg init\n\n    # Use a different tree root\n    sg init --root atelier"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        next_help_heading = "Workspace",
        about = "Load a JSON document into the store",
        after_help = "EXAMPLES:\n    # Replace one order record\n    sg import xoxo/orders/DH001 order.json\n\n    # Load a full tree export at the root\n    sg import \"\" export.json"
    )]
    Import(cmd::import::ImportArgs),

    #[command(
        next_help_heading = "Workspace",
        about = "Print a store subtree as JSON",
        after_help = "EXAMPLES:\n    # Dump one product\n    sg export xoxo/orders/DH001/products/p1"
    )]
    Export(cmd::export::ExportArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show a product's tracking view",
        after_help = "EXAMPLES:\n    # Show a product under an order\n    sg show DH001 p1\n\n    # Show a product under a warranty claim\n    sg show BH042 p1 --warranty"
    )]
    Show(cmd::show::ShowArgs),

    #[command(
        next_help_heading = "Read",
        about = "List products under an order or warranty claim"
    )]
    Products(cmd::products::ProductsArgs),

    #[command(
        next_help_heading = "Track",
        about = "Check a task",
        after_help = "EXAMPLES:\n    # Check a task as mem_01\n    sg --actor mem_01 check DH001 p1 wf_1 task_wf_1_0"
    )]
    Check(cmd::toggle::ToggleArgs),

    #[command(next_help_heading = "Track", about = "Uncheck a task")]
    Uncheck(cmd::toggle::ToggleArgs),

    #[command(next_help_heading = "Track", about = "Report or resolve a stage defect")]
    Defect {
        #[command(subcommand)]
        command: cmd::defect::DefectCommand,
    },

    #[command(
        next_help_heading = "Track",
        about = "Replace the members assigned to a stage",
        after_help = "EXAMPLES:\n    # Assign two members\n    sg assign DH001 p1 wf_2 mem_01 mem_02\n\n    # Clear the assignment\n    sg assign DH001 p1 wf_2"
    )]
    Assign(cmd::assign::AssignArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("STAGEGATE_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "stagegate=debug,info"
        } else {
            "stagegate=info,warn"
        })
    });

    let format = env::var("STAGEGATE_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

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

/// Classify a failed command into an error code and exit status.
fn classify(err: &anyhow::Error) -> (Option<ErrorCode>, u8) {
    if let Some(track) = err.downcast_ref::<TrackError>() {
        let status = if track.is_rejection() {
            EXIT_REJECTED
        } else {
            EXIT_FAULT
        };
        return (Some(track.code()), status);
    }
    if let Some(store) = err.downcast_ref::<StoreError>() {
        return (Some(store.code()), EXIT_FAULT);
    }
    if let Some(workspace) = err.downcast_ref::<WorkspaceError>() {
        return (Some(workspace.code()), EXIT_FAULT);
    }
    (None, EXIT_FAULT)
}

fn report(output: OutputMode, err: &anyhow::Error, code: Option<ErrorCode>) {
    let mut cli_error = CliError::new(format!("{err:#}"));
    if let Some(code) = code {
        cli_error = cli_error.with_code(code);
    }
    if let Err(render_err) = output::render_error(output, &cli_error) {
        eprintln!("error: {err:#} (and failed to render it: {render_err})");
    }
}

fn dispatch(command: &Commands, ctx: &Context<'_>) -> anyhow::Result<()> {
    match command {
        Commands::Init(args) => cmd::init::run_init(args, ctx.root, ctx.output),
        Commands::Import(args) => cmd::import::run_import(args, ctx),
        Commands::Export(args) => cmd::export::run_export(args, ctx),
        Commands::Show(args) => cmd::show::run_show(args, ctx),
        Commands::Products(args) => cmd::products::run_products(args, ctx),
        Commands::Check(args) => cmd::toggle::run_toggle(args, true, ctx),
        Commands::Uncheck(args) => cmd::toggle::run_toggle(args, false, ctx),
        Commands::Defect { command } => cmd::defect::run_defect(command, ctx),
        Commands::Assign(args) => cmd::assign::run_assign(args, ctx),
    }
}

fn load_config(cli: &Cli, root: &std::path::Path) -> Result<EffectiveConfig, ExitCode> {
    config::resolve_config(root, cli.json, cli.actor.as_deref()).map_err(|err| {
        report(
            OutputMode::fallback(cli.json),
            &err,
            Some(ErrorCode::ConfigParseError),
        );
        ExitCode::from(EXIT_FAULT)
    })
}

fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let root = match cli.dir.clone().map_or_else(env::current_dir, Ok) {
        Ok(root) => root,
        Err(err) => {
            report(OutputMode::fallback(cli.json), &anyhow::Error::from(err), None);
            return ExitCode::from(EXIT_FAULT);
        }
    };

    let config = match load_config(&cli, &root) {
        Ok(config) => config,
        Err(code) => return code,
    };
    let ctx = Context {
        root: &root,
        config: &config,
        output: OutputMode::from_resolved(&config.resolved_output),
    };
    debug!(root = %root.display(), output = %config.resolved_output, "resolved workspace");

    match dispatch(&cli.command, &ctx) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let (code, status) = classify(&err);
            report(ctx.output, &err, code);
            ExitCode::from(status)
        }
    }
}
