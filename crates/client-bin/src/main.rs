//! Chainprox client command-line entry point.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use client_bin::app;
use client_config_and_utils::{init_logging, Config, Paths};

/// Chainprox client command-line interface.
#[derive(Parser)]
#[command(name = "chainprox")]
#[command(about = "Chainprox desktop client core")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error). Defaults to the configured level.
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Base directory for data files (store, config, logs). Defaults to ~/.chainprox
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and keep the service connections open
    Run {
        #[arg(long, requires = "password")]
        email: Option<String>,
        #[arg(long, env = "CHAINPROX_PASSWORD", requires = "email")]
        password: Option<String>,
    },
    /// Forget the saved login
    Logout,
    /// Install the newest known update
    Upgrade,
    /// Show the saved login and update state
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    let config = Config::load(&paths)?;

    init_logging(cli.log_level.as_deref().unwrap_or(&config.log_level), &paths);

    match cli.command {
        Some(Commands::Run { email, password }) => {
            app::run_client(config, paths, email.zip(password)).await?;
        }
        None => {
            app::run_client(config, paths, None).await?;
        }
        Some(Commands::Logout) => app::logout(&paths)?,
        Some(Commands::Upgrade) => app::upgrade(&config, &paths).await?,
        Some(Commands::Status) => app::show_status(&paths)?,
    }

    Ok(())
}
