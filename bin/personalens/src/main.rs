mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "personalens")]
#[command(about = "Watch an AI persona browse your website", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the configuration file
    Onboard {
        /// Force overwrite existing configuration
        #[arg(long)]
        force: bool,
    },

    /// List built-in personas and objectives
    Personas,

    /// Start the session server (long-running daemon)
    Serve {
        /// Port to listen on (overrides config transport.port)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (overrides config transport.host)
        #[arg(long)]
        host: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup tracing
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Onboard { force } => {
            commands::onboard::run(force).await?;
        }
        Commands::Personas => {
            commands::personas::run().await?;
        }
        Commands::Serve { port, host } => {
            commands::serve::run(host, port).await?;
        }
    }

    Ok(())
}
