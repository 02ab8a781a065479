//! irisbot - party scheduling, 369, memes and a points economy for the iris
//! KakaoTalk bot host.

use clap::Parser;
use std::process::ExitCode;

use irisbot::cli::Commands;
use irisbot::logging;

#[tokio::main]
async fn main() -> ExitCode {
    // Keep the guard alive so the file writer flushes on exit
    let _log_guard = match logging::init() {
        Ok((guard, _dir)) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let args = Commands::parse();

    match args.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
