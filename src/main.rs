// Copyright 2026 Buildsheet Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use buildsheet::cli;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "buildsheet",
    about = "Buildsheet — vehicle configurator catalog harvester",
    version,
    after_help = "Run 'buildsheet <command> --help' for details on each command."
)]
struct Cli {
    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk the configurator and write the deduplicated build catalog
    Harvest {
        /// Override the model listing URL
        #[arg(long)]
        start_url: Option<String>,
        /// Output path for the build table
        #[arg(long, default_value = "builds.csv")]
        out: PathBuf,
    },
    /// Visit each unique summary URL and write the priced spec sheets
    Enrich {
        /// Previously harvested build table
        #[arg(long = "in", default_value = "builds.csv")]
        input: PathBuf,
        /// Output path for the spec table
        #[arg(long, default_value = "specs.csv")]
        out: PathBuf,
    },
    /// Both passes back to back
    Run {
        /// Override the model listing URL
        #[arg(long)]
        start_url: Option<String>,
        /// Output path for the build table
        #[arg(long, default_value = "builds.csv")]
        builds_out: PathBuf,
        /// Output path for the spec table
        #[arg(long, default_value = "specs.csv")]
        specs_out: PathBuf,
    },
    /// Check environment and diagnose issues
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Mirror global flags into the environment so all modules can check them
    if cli.quiet {
        std::env::set_var("BUILDSHEET_QUIET", "1");
    }
    if cli.verbose {
        std::env::set_var("BUILDSHEET_VERBOSE", "1");
    }

    let default_level = if cli.verbose {
        "buildsheet=debug"
    } else {
        "buildsheet=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(default_level.parse().unwrap()),
        )
        .init();

    let result = match cli.command {
        Commands::Harvest { start_url, out } => {
            cli::harvest_cmd::run(start_url.as_deref(), &out).await
        }
        Commands::Enrich { input, out } => cli::enrich_cmd::run(&input, &out).await,
        Commands::Run {
            start_url,
            builds_out,
            specs_out,
        } => cli::run_cmd::run(start_url.as_deref(), &builds_out, &specs_out).await,
        Commands::Doctor => cli::doctor::run().await,
    };

    if let Err(e) = &result {
        if !cli::output::is_quiet() {
            eprintln!("  Error: {e:#}");
        }
        std::process::exit(1);
    }
    result
}
