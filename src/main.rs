//! logwire
//!
//! Loads the logging configuration, builds the process-wide logger and
//! serves a small HTTP app with request logging installed.
//!
//! ```text
//! config file → ConfigLoader → build_logger → install → HttpServer
//!                                   ↑
//!              ConfigWatcher ── level updates
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;

use logwire::config::watcher::{apply_level_updates, ConfigWatcher};
use logwire::config::ConfigLoader;
use logwire::observability::build_logger;
use logwire::HttpServer;

#[derive(Parser)]
#[command(name = "logwire")]
#[command(about = "Structured logging with file rotation and HTTP request logs", long_about = None)]
struct Cli {
    /// Config file to load instead of searching.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory searched before the working directory.
    #[arg(long)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the demo app with request logging
    Serve {
        #[arg(short, long, default_value = "127.0.0.1:8080")]
        bind: String,

        /// Reload the level when the config file changes
        #[arg(long)]
        watch: bool,
    },
    /// Load and validate the configuration, then print it
    Check,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut loader = ConfigLoader::new();
    if let Some(dir) = &cli.config_dir {
        loader = loader.with_search_path(dir);
    }
    if let Some(file) = &cli.config {
        loader = loader.with_file(file);
    }

    let config_path = match loader.locate() {
        Ok(path) => path,
        Err(e) => {
            eprintln!("Unable to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    let config = match loader.load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Unable to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let (bind, watch) = match cli.command {
        Commands::Check => {
            println!("# {}", config_path.display());
            println!("{}", serde_json::to_string_pretty(&config)?);
            return Ok(());
        }
        Commands::Serve { bind, watch } => (bind, watch),
    };

    let logger = match build_logger(&config) {
        Ok(logger) => logger,
        Err(e) => {
            eprintln!("Unable to build logger: {}", e);
            std::process::exit(1);
        }
    };
    logger.install()?;

    tracing::info!(
        config = %config_path.display(),
        threshold = %logger.level().level(),
        file = ?logger.file_path(),
        "logwire v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    // Keep the watcher alive for the lifetime of the server.
    let _watcher = if watch {
        let (watcher, updates) = ConfigWatcher::new(&config_path);
        tokio::spawn(apply_level_updates(logger.level().clone(), updates));
        Some(watcher.run()?)
    } else {
        None
    };

    let listener = TcpListener::bind(&bind).await?;
    let result = HttpServer::new().run(listener).await;

    tracing::info!("Shutdown complete");
    logger.sync();

    result?;
    Ok(())
}
