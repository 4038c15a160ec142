//! CLI for spanstat
//!
//! Talks to a running aggregator over gRPC:
//! - insert: submit events for one origin and trace, or a JSON file of entries
//! - query: print aggregated totals, sorted by event name
//! - delete: remove stored events matching a filter

use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod output;

#[derive(Parser)]
#[command(name = "spanstat")]
#[command(about = "spanstat - trace event aggregation client", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    connection: commands::ConnectionArgs,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit events to the aggregator
    Insert(commands::insert::InsertArgs),

    /// Query aggregated event totals
    Query(commands::query::QueryArgs),

    /// Delete stored events matching a filter
    Delete(commands::delete::DeleteArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Insert(args) => commands::insert::run(&cli.connection, args).await,
        Commands::Query(args) => commands::query::run(&cli.connection, args).await,
        Commands::Delete(args) => commands::delete::run(&cli.connection, args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}
