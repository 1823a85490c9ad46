mod cli;
mod commands;
mod formatting;
mod settings;

use std::process::ExitCode;

use cli::Commands;
use commands::{run_captures, run_compare_images, run_ingest, run_records, run_report};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    run().await
}

async fn run() -> ExitCode {
    let raw_args: Vec<String> = std::env::args().collect();
    let args = cli::parse();
    init_tracing(args.verbose);

    match args.command {
        Commands::Report {
            actual,
            expected,
            reload,
            rgb,
            format,
            output,
        } => {
            run_report(
                &raw_args,
                args.config,
                args.verbose,
                actual,
                expected,
                reload,
                rgb,
                format,
                output,
            )
            .await
        }
        Commands::Ingest { files, format } => run_ingest(args.config, files, format).await,
        Commands::Captures { format } => run_captures(args.config, format).await,
        Commands::Records { at, format, output } => {
            run_records(args.config, at, format, output).await
        }
        Commands::CompareImages {
            actual,
            expected,
            rgb,
            no_artifact,
            format,
            output,
        } => {
            run_compare_images(
                &raw_args,
                args.config,
                actual,
                expected,
                rgb,
                no_artifact,
                format,
                output,
            )
            .await
        }
    }
}

/// Logs go to stderr so JSON on stdout stays parseable. RUST_LOG wins over --verbose.
fn init_tracing(verbose: bool) {
    let log_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.to_string()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}
