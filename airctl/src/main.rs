//! airctl - Entry Point
//!
//! Logs into the cloud account given on the command line, connects to every
//! air conditioner found and serves their menus until told to quit.

use std::env;

use airctl::app::args::CliArgs;
use airctl::app::options::AppOptions;
use airctl::app::run::run;
use airctl::logs::init_logging;
use airctl::utils::version_info;

use tracing::{error, info};

#[tokio::main]
async fn main() {
    let cli_args = CliArgs::parse(env::args().skip(1));

    // Print version and exit
    if cli_args.flag("version") {
        match serde_json::to_string_pretty(&version_info()) {
            Ok(version) => println!("{}", version),
            Err(e) => eprintln!("Failed to encode version info: {e}"),
        }
        return;
    }

    let mut options = AppOptions::default();
    if let Err(e) = cli_args.apply(&mut options) {
        eprintln!("{e}");
        std::process::exit(2);
    }

    if let Err(e) = init_logging(&options.log) {
        eprintln!("Failed to initialize logging: {e}");
    }

    info!("Running airctl {} with options: {:?}", version_info().version, options);
    if let Err(e) = run(options, cli_args.credentials(), await_shutdown_signal()).await {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {
                        info!("SIGTERM received, shutting down...");
                    }
                    _ = sigint.recv() => {
                        info!("SIGINT received, shutting down...");
                    }
                    _ = tokio::signal::ctrl_c() => {
                        info!("Ctrl+C received, shutting down...");
                    }
                }
                return;
            }
            (Err(e), _) | (_, Err(e)) => {
                error!("Failed to install signal handlers: {e}");
            }
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
    info!("Ctrl+C received, shutting down...");
}
