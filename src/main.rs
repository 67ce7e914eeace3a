//! promgate HTTP server
//!
//! Starts the application and metrics listeners from a TOML configuration.

use clap::Parser;
use promgate::{
    cli::{self, Cli, Command},
    config::Config,
    server, telemetry,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Some(Command::Config { output }) => {
            let template = cli::generate_config_template();
            match output {
                Some(path) => {
                    std::fs::write(&path, template)?;
                    eprintln!("Configuration template written to {}", path);
                }
                None => print!("{}", template),
            }
            Ok(())
        }
        Some(Command::Check) => {
            let config = Config::from_file(&cli.config)?;
            print!("{}", cli::check_summary(&config));
            Ok(())
        }
        None => {
            let config = Config::from_file(&cli.config)?;
            telemetry::init(&config.observability.log_level);

            tracing::info!(
                "Starting promgate server on {}:{}",
                config.server.host,
                config.server.port
            );

            server::serve(config).await?;
            Ok(())
        }
    }
}
