#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

mod command;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use command::{
    BatchInput, BatchStrategy, CommandStrategy, InfoStrategy, InitStrategy, RunInput, RunStrategy,
    VersionStrategy,
};
use progout_config::Config;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "progout")]
#[command(about = "Run commands once and reuse their captured output", long_about = None)]
struct Cli {
    /// Log debug details (cache hits, spawned programs)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single command and print its output
    Run {
        /// Interpret the command with the configured shell
        #[arg(long)]
        shell: bool,

        /// Discard the command's standard error
        #[arg(long)]
        hide_stderr: bool,

        /// Directory to run the command in
        #[arg(long)]
        cwd: Option<PathBuf>,

        /// One string, or a program followed by its arguments
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Run every directive in a JSON file through one shared cache
    Batch {
        /// JSON array of command directives
        file: PathBuf,
    },
    /// Initialize configuration
    Init,
    /// Show configuration
    Info,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    // Only commands that use the config fail on a broken file, so `init`
    // and `version` keep working.
    let config = Config::load_or_default();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        config
            .as_ref()
            .ok()
            .and_then(|config| config.logging.level.parse().ok())
            .unwrap_or(Level::INFO)
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let code = dispatch(cli.command, config).await?;
    Ok(exit_code(code))
}

async fn dispatch(command: Commands, config: anyhow::Result<Config>) -> anyhow::Result<i32> {
    let code = match command {
        Commands::Run {
            shell,
            hide_stderr,
            cwd,
            command,
        } => {
            RunStrategy
                .execute(RunInput {
                    config: config?,
                    command,
                    shell,
                    hide_standard_error: hide_stderr,
                    working_directory: cwd,
                })
                .await?
        }
        Commands::Batch { file } => {
            BatchStrategy
                .execute(BatchInput {
                    config: config?,
                    file,
                })
                .await?
        }
        Commands::Init => {
            InitStrategy.execute(()).await?;
            0
        }
        Commands::Info => {
            InfoStrategy.execute(config?).await?;
            0
        }
        Commands::Version => {
            VersionStrategy.execute(()).await?;
            0
        }
    };
    Ok(code)
}

/// Map a child's exit code onto ours; signals and out-of-range codes become 1.
fn exit_code(code: i32) -> ExitCode {
    u8::try_from(code).map_or(ExitCode::FAILURE, ExitCode::from)
}
