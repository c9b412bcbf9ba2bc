//! Dessert Cookbook - Browse dessert recipes from TheMealDB
//!
//! Lists desserts, shows recipes, keeps bookmarks across runs and caches
//! dessert images on disk with a weekly flush.

use std::io;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use dessert_cookbook::app::App;
use dessert_cookbook::cli::{AppConfig, Cli};

/// Logs go to stderr so command output on stdout stays clean
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("dessert_cookbook=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dessert_cookbook=warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    tracing::debug!("dessert-cookbook starting with args: {:?}", cli);

    let config = match AppConfig::from_cli(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut app = match App::open(&config) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut stdout = io::stdout().lock();
    match app.run(&cli.command, &mut stdout).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!(error = ?e, "command failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
