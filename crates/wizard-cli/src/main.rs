mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    config::ConfigSubcommand, session::SessionSubcommand, store::StoreSubcommand,
    workspace::WorkspaceSubcommand,
};
use std::path::PathBuf;
use wizard_core::reveal::RevealMode;

#[derive(Parser)]
#[command(
    name = "wizard",
    about = "Resumable guided wizard sessions (AVA, MARGO, VERA, Product Refiner)",
    version,
    propagate_version = true
)]
struct Cli {
    /// Wizard root (default: nearest parent containing .wizard/, else cwd)
    #[arg(long, global = true, env = "WIZARD_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .wizard/ and a default config
    Init,

    /// Inspect or validate the configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Select or show the active workspace
    Workspace {
        #[command(subcommand)]
        subcommand: WorkspaceSubcommand,
    },

    /// Start, inspect, answer and export flow sessions
    Session {
        #[command(subcommand)]
        subcommand: SessionSubcommand,
    },

    /// Split a text file into reveal chunks
    Chunk {
        file: PathBuf,
        /// Minimum chunk length in characters (default: reveal.min_chunk_length)
        #[arg(long)]
        min: Option<usize>,
    },

    /// Progressively print a text file
    Reveal {
        file: PathBuf,
        /// immediate, staggered_fade or typewriter (default: reveal.mode)
        #[arg(long)]
        mode: Option<RevealMode>,
        /// Minimum chunk length in characters
        #[arg(long)]
        min: Option<usize>,
        /// Delay between chunks in milliseconds
        #[arg(long)]
        stagger_ms: Option<u64>,
    },

    /// Manage persisted local state
    Store {
        #[command(subcommand)]
        subcommand: StoreSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Session { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
        Commands::Workspace { subcommand } => cmd::workspace::run(&root, subcommand, cli.json),
        Commands::Session { subcommand } => cmd::session::run(&root, subcommand, cli.json),
        Commands::Chunk { file, min } => cmd::chunk::run(&root, &file, min, cli.json),
        Commands::Reveal {
            file,
            mode,
            min,
            stagger_ms,
        } => cmd::reveal::run(&root, &file, mode, min, stagger_ms),
        Commands::Store { subcommand } => cmd::store::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
