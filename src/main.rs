//! Mimic CLI entry point.

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use mimic::cli::{commands, handle_error, runtime, Cli, Commands};
use mimic::infrastructure::logging::LoggerImpl;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match runtime::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => handle_error(err, cli.json),
    };

    let _logger = match LoggerImpl::init(&config.logging) {
        Ok(logger) => logger,
        Err(err) => handle_error(err, cli.json),
    };

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            ctrl_c.cancel();
        }
    });

    let result = match cli.command {
        Commands::Run(args) => commands::run::execute(args, config, cli.json, cancel).await,
        Commands::Batch(args) => commands::batch::execute(args, config, cli.json, cancel).await,
        Commands::Sessions(command) => {
            commands::sessions::execute(command, config, cli.json).await
        }
        Commands::Config(command) => commands::config::execute(&command, config, cli.json),
    };

    if let Err(err) = result {
        handle_error(err, cli.json);
    }
}
