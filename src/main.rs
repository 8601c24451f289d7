use clap::Parser;
use crypto_tracker::cli::{Cli, Commands};
use crypto_tracker::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config).unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
        eprintln!("Using default configuration");
        Config::default()
    });

    // Initialize telemetry
    let _telemetry = crypto_tracker::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Watch(args) => {
            tracing::info!("Starting price watch");
            args.execute(&config).await?;
        }
        Commands::Symbols(args) => {
            args.execute(&config).await?;
        }
        Commands::Config => {
            println!("Current configuration:");
            println!("  REST: {}", config.endpoints.rest_url);
            println!("  Stream: {}", config.endpoints.stream_url);
            println!(
                "  Baseline retry: every {}s, max {}",
                config.baseline.retry_delay_secs, config.baseline.max_retries
            );
            println!(
                "  Reconnect: every {}s, max {}",
                config.stream.reconnect_delay_secs, config.stream.max_reconnect_attempts
            );
            println!(
                "  Dispatch: every {}ms, buffer {}",
                config.dispatch.interval_ms, config.dispatch.buffer_capacity
            );
            println!("  Watch: {}", config.watch.symbols.join(", "));
        }
    }

    Ok(())
}
