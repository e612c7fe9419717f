use anyhow::Result;
use clap::{Parser, Subcommand};

pub mod chat;
pub mod init;
pub mod metrics;
pub mod serve;
pub mod services;

use crate::core::AppConfig;
use crate::core::logging::init_tracing;

#[derive(Subcommand)]
enum Command {
    /// Create the evaluation database
    Init {},
    /// Run the API server
    Serve {
        /// Set the server host address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Set the server port
        #[arg(long, default_value = "2222")]
        port: String,

        /// Delete all evaluation records before starting
        #[arg(long, action, default_value = "false")]
        reset_eval: bool,

        /// Fetch search service metadata on first use
        #[arg(long, action, default_value = "false")]
        lazy_metadata: bool,
    },
    /// Start an interactive question answering session
    Chat {
        /// Answer with the context filter guardrail
        #[arg(long, action, default_value = "false")]
        filters: bool,

        /// Delete all evaluation records before starting
        #[arg(long, action, default_value = "false")]
        reset_eval: bool,

        /// Fetch search service metadata on first use
        #[arg(long, action, default_value = "false")]
        lazy_metadata: bool,
    },
    /// List the available search services
    Services {},
    /// Print aggregate evaluation metrics
    Metrics {},
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

pub async fn run() -> Result<()> {
    let args = Cli::parse();
    let config = AppConfig::default();

    // Handle each sub command
    match args.command {
        Some(Command::Init {}) => {
            init::run(&config).await?;
        }
        Some(Command::Serve {
            host,
            port,
            reset_eval,
            lazy_metadata,
        }) => {
            let config = config.with_startup_overrides(reset_eval, lazy_metadata);
            serve::run(host, port, config).await?;
        }
        Some(Command::Chat {
            filters,
            reset_eval,
            lazy_metadata,
        }) => {
            init_tracing();
            let config = config.with_startup_overrides(reset_eval, lazy_metadata);
            chat::run(config, filters).await?;
        }
        Some(Command::Services {}) => {
            init_tracing();
            services::run(&config).await?;
        }
        Some(Command::Metrics {}) => {
            init_tracing();
            metrics::run(&config).await?;
        }
        None => {}
    }

    Ok(())
}
