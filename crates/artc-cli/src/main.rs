//! `artc` entry point
//!
//! Thin adapter over `artc-core`: parses arguments, installs logging, opens
//! the workspace and hands off to one command. Logs go to stderr; command
//! output goes to stdout.

mod commands;

use anyhow::{Context, Result};
use artc_artifact::{ArtifactId, ArtifactKind, ArtifactStatus};
use artc_core::{ArtcConfig, Workspace};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "artc=info";

#[derive(Debug, Parser)]
#[command(name = "artc", version, about = "Artifact compiler: typed artifacts, validated passes, locked tests")]
struct Cli {
    /// Config file (defaults to <root>/artc.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Project root
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List registered artifacts
    List {
        #[arg(long)]
        kind: Option<ArtifactKind>,
        #[arg(long)]
        status: Option<ArtifactStatus>,
    },
    /// Print one artifact envelope
    Show { id: ArtifactId },
    /// Store a hand-written payload as a DRAFT
    Create {
        kind: ArtifactKind,
        /// JSON payload document
        payload: PathBuf,
        #[arg(long = "depends-on")]
        depends_on: Vec<ArtifactId>,
    },
    /// Replace the payload of a DRAFT
    Modify { id: ArtifactId, payload: PathBuf },
    /// Remove a DRAFT
    Discard { id: ArtifactId },
    /// Approve a DRAFT
    Approve {
        id: ArtifactId,
        #[arg(long)]
        approver: Option<String>,
    },
    /// Lock an approved TestPlan and hash its test files
    Lock {
        id: ArtifactId,
        #[arg(long)]
        approver: Option<String>,
    },
    /// Check locked test files and the audit chain
    Verify {
        /// Only this TestPlan
        id: Option<ArtifactId>,
    },
    /// Run a pass against a recorded model response
    Build {
        kind: ArtifactKind,
        /// Recorded response text
        #[arg(long)]
        response: PathBuf,
        #[command(flatten)]
        inputs: commands::ContextArgs,
    },
    /// Print the prompt a pass would send
    Prompt {
        kind: ArtifactKind,
        #[command(flatten)]
        inputs: commands::ContextArgs,
    },
    /// Run the output pipeline on a response file
    CheckOutput { kind: ArtifactKind, response: PathBuf },
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(cli: &Cli) -> Result<ArtcConfig> {
    match &cli.config {
        Some(path) => ArtcConfig::load(path).with_context(|| format!("loading {}", path.display())),
        None => ArtcConfig::discover(&cli.root).context("loading configuration"),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.json);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = load_config(&cli)?;
    tracing::debug!(root = %config.project_root.display(), state = %config.state_path().display(), "configuration loaded");
    let ws = Workspace::open(config).context("opening workspace")?;
    let approver = |given: Option<String>| given.unwrap_or_else(|| ws.config().default_approver.clone());

    match cli.command {
        Command::List { kind, status } => commands::list(&ws, kind, status),
        Command::Show { id } => commands::show(&ws, id),
        Command::Create { kind, payload, depends_on } => commands::create(&ws, kind, &payload, depends_on),
        Command::Modify { id, payload } => commands::modify(&ws, id, &payload),
        Command::Discard { id } => commands::discard(&ws, id),
        Command::Approve { id, approver: who } => commands::approve(&ws, id, &approver(who)),
        Command::Lock { id, approver: who } => commands::lock(&ws, id, &approver(who)),
        Command::Verify { id } => commands::verify(&ws, id),
        Command::Build { kind, response, inputs } => commands::build(&ws, kind, &response, &inputs).await,
        Command::Prompt { kind, inputs } => commands::prompt(&ws, kind, &inputs),
        Command::CheckOutput { kind, response } => commands::check_output(&ws, kind, &response),
    }
}
