//! Demand forecast - Main Entry Point
//!
//! Prepares leakage-free monthly feature partitions from raw sales tables.

use clap::Parser;
use demand_forecast::cli::{cmd_info, cmd_prepare, cmd_validate_windows, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "demand_forecast=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Prepare {
            sales,
            items,
            stores,
            categories,
            config,
            windows,
            balance,
            output,
            format,
        } => {
            cmd_prepare(
                &sales,
                &items,
                &stores,
                &categories,
                config.as_deref(),
                windows,
                balance,
                &output,
                format,
            )?;
        }
        Commands::ValidateWindows { windows } => {
            cmd_validate_windows(&windows)?;
        }
        Commands::Info { sales } => {
            cmd_info(&sales)?;
        }
    }

    Ok(())
}
