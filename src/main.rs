use clap::Parser;
use pluvio_coder::cli::{self, Args};
use std::process;

fn main() {
    let args = Args::parse();

    let runtime = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
        eprintln!("Failed to create async runtime: {}", e);
        process::exit(1);
    });

    let result = runtime.block_on(async {
        let shutdown_signal = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("Failed to install CTRL+C signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        };

        tokio::select! {
            result = cli::run(args) => result,
            _ = shutdown_signal => {
                eprintln!("\nReceived CTRL+C, stopping...");
                Err(pluvio_coder::CoderError::processing_interrupted(
                    "Processing interrupted by user",
                )
                .into())
            }
        }
    });

    match result {
        Ok(_stats) => process::exit(0),
        Err(error) => {
            eprintln!("Error: {:#}", error);
            process::exit(1);
        }
    }
}
