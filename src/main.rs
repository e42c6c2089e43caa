//! # kiln CLI Entry Point
//!
//! This is the main executable for the `kiln` command-line tool.
//! It parses CLI arguments using clap and routes commands to the appropriate handlers.

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use tracing_subscriber::EnvFilter;

use kiln::commands;

#[derive(Parser)]
#[command(name = "kiln")]
#[command(about = "Run your build tool and capture its output", version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Show debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the project in the current directory
    Build {
        /// The build configuration to use [default: Release]
        #[arg(long)]
        configuration: Option<String>,
        /// A scheme to build (if not specified, all schemes will be built)
        #[arg(long)]
        scheme: Option<String>,
    },
    /// Generate shell completion scripts
    Completion { shell: Shell },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "kiln=debug" } else { "kiln=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Build {
            configuration,
            scheme,
        } => commands::build::handle_build(configuration, scheme),

        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            let bin_name = cmd.get_name().to_string();
            generate(shell, &mut cmd, bin_name, &mut std::io::stdout());
            Ok(())
        }
    }
}
