//! ftpl - feature template tool

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod settings;

#[derive(Parser)]
#[command(name = "ftpl")]
#[command(version)]
#[command(about = "Resolve, compile and watch feature templates", long_about = None)]
struct Cli {
    #[command(flatten)]
    store: StoreArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command
#[derive(Args, Debug)]
pub struct StoreArgs {
    /// Template store root; template paths are relative to it
    #[arg(short = 'r', long, global = true, default_value = ".")]
    pub root: PathBuf,

    /// TOML file with compile settings
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Maximum inclusion depth (overrides the config file)
    #[arg(long, global = true)]
    pub max_depth: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a template with every include and merge expanded
    Resolve {
        /// Template path, relative to the store root
        template: String,

        /// Also list the files that were read
        #[arg(long)]
        watched: bool,
    },

    /// Print the builder tree a template compiles to, as JSON
    Compile {
        /// Template path, relative to the store root
        template: String,

        /// Environment parameter visible to env() (KEY=VALUE)
        #[arg(short = 'P', long = "param", value_parser = settings::parse_param)]
        params: Vec<(String, String)>,

        /// Compile with flat output unless the template decides otherwise
        #[arg(long)]
        flat_output: bool,
    },

    /// Compile a template and report whenever one of its files changes
    Watch {
        /// Template path, relative to the store root
        template: String,

        /// Environment parameter visible to env() (KEY=VALUE)
        #[arg(short = 'P', long = "param", value_parser = settings::parse_param)]
        params: Vec<(String, String)>,

        /// Polling interval in milliseconds
        #[arg(long, default_value_t = 500)]
        interval_ms: u64,

        /// Exit after the first recompilation
        #[arg(long)]
        once: bool,

        /// Give up after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ftpl=info,ftpl_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Resolve { template, watched } => commands::resolve::execute(&cli.store, &template, watched),
        Commands::Compile {
            template,
            params,
            flat_output,
        } => commands::compile::execute(&cli.store, &template, params, flat_output),
        Commands::Watch {
            template,
            params,
            interval_ms,
            once,
            timeout,
        } => commands::watch::execute(
            &cli.store,
            commands::watch::WatchArgs {
                template,
                params,
                interval_ms,
                once,
                timeout,
            },
        ),
    }
}
