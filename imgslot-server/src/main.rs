mod client;
mod config;
mod server;

use clap::{Parser, Subcommand};
use config::Config;
use server::run_server;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "imgslot")]
#[command(about = "Single-image HTTP store with bearer-gated uploads")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Server {
        /// Path to a YAML configuration file
        #[arg(short, long)]
        config: Option<String>,
    },
    /// Upload an image to a running server
    Push {
        /// Image file to upload
        file: PathBuf,

        /// Server base URL
        #[arg(long, default_value = "http://localhost:8000")]
        server: String,

        /// Bearer secret for the upload
        #[arg(long, env = "API_KEY")]
        api_key: String,
    },
    /// Download the current image from a running server
    Pull {
        /// Where to save the image
        out: PathBuf,

        /// Server base URL
        #[arg(long, default_value = "http://localhost:8000")]
        server: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "imgslot=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Server { config } => {
            let cfg = match Config::load(config.as_deref()) {
                Ok(c) => c,
                Err(e) => {
                    tracing::error!("Failed to load config: {}", e);
                    std::process::exit(1);
                }
            };

            if let Err(e) = run_server(cfg).await {
                tracing::error!("Server error: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Push {
            file,
            server,
            api_key,
        } => match client::push_image(&server, &api_key, &file).await {
            Ok(message) => tracing::info!("Upload succeeded: {}", message),
            Err(e) => {
                tracing::error!("Upload of {:?} failed: {}", file, e);
                std::process::exit(1);
            }
        },
        Commands::Pull { out, server } => match client::pull_image(&server, &out).await {
            Ok(written) => tracing::info!("Saved {} bytes to {:?}", written, out),
            Err(e) => {
                tracing::error!("Download failed: {}", e);
                std::process::exit(1);
            }
        },
    }
}
