//! xbuild: Xcode-compatible build driver.
//!
//! Provides the `xbuild` command:
//! - `xbuild build` - execute a build plan with the simple executor
//!
//! Exit codes follow the driver contract: 0 on success, 1 when the build
//! itself fails, -1 for configuration problems.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod cmd;
mod plan;

#[derive(Parser)]
#[command(name = "xbuild")]
#[command(author, version, about = "Xcode-compatible build driver")]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Execute a build plan
  Build {
    /// Path to the build plan
    #[arg(long, default_value = "build.json")]
    plan: PathBuf,

    /// Emit the build log without touching the filesystem or spawning tools
    #[arg(long)]
    dry_run: bool,

    /// Build log formatter
    #[arg(long, default_value = "default")]
    formatter: String,

    /// Execution engine
    #[arg(long, default_value = "simple")]
    executor: String,
  },
}

fn main() {
  let cli = Cli::parse();

  // The build log owns stdout; diagnostics go to stderr.
  let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
  FmtSubscriber::builder()
    .with_max_level(level)
    .with_target(false)
    .without_time()
    .with_writer(std::io::stderr)
    .init();

  let code = match cli.command {
    Commands::Build {
      plan,
      dry_run,
      formatter,
      executor,
    } => cmd::build::run(&plan, dry_run, &formatter, &executor),
  };

  std::process::exit(code);
}
