//! hcbench - HTTP client benchmark CLI
//!
//! Drives a fixed-duration POST load against one endpoint and records
//! throughput, latency percentiles and client/server resource usage.

use clap::Parser;
use http_client_bench::{
    app::App,
    cli::Cli,
    config::EnvManager,
    error::{AppError, ErrorReporter, Result},
};
use std::process;

#[tokio::main]
async fn main() {
    // Set up better panic handling
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panic: {}", panic_info);
        process::exit(AppError::internal("panic").exit_code());
    }));

    let cli = Cli::parse();
    let reporter = ErrorReporter::new(cli.use_colors(), cli.verbose);

    if let Err(e) = run_application(cli).await {
        reporter.report_error(&e);
        print_error_suggestions(&e);
        process::exit(e.exit_code());
    }
}

async fn run_application(cli: Cli) -> Result<()> {
    App::new(cli)?.run().await
}

/// Print helpful suggestions for common errors
fn print_error_suggestions(error: &AppError) {
    match error {
        AppError::Config(_) => {
            eprintln!();
            eprintln!("{}", EnvManager::display_env_help());
        }
        AppError::Network(_) | AppError::HttpRequest(_) => {
            eprintln!();
            eprintln!("Network troubleshooting:");
            eprintln!("  - Check that SERVER_URL is reachable from this host");
            eprintln!("  - Verify CONTROL_URL when the collector runs elsewhere");
        }
        AppError::Io(_) => {
            eprintln!();
            eprintln!("Check that RESULTS_DIR exists or can be created and is writable");
        }
        _ => {}
    }
}
