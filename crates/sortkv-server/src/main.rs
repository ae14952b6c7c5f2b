//! sortkv server binary
//!
//! Serves the ordered keyspace over the Redis wire protocol.

use clap::Parser;
use sortkv::{Keyspace, MemoryStore, OrderedStore, RedbStore};
use sortkv_server::config::{DEFAULT_MAX_ARGS, DEFAULT_MAX_BULK_LEN};
use sortkv_server::{KvServer, ServerConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "sortkv-server")]
#[command(about = "Ordered key-space server speaking the Redis protocol")]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "127.0.0.1:6380")]
    bind: SocketAddr,

    /// Database file
    #[arg(long, default_value = "./data/sortkv.redb")]
    data_file: PathBuf,

    /// Keep everything in memory (nothing is written to disk)
    #[arg(long, default_value = "false")]
    in_memory: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: Level,

    /// Largest accepted bulk string in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_BULK_LEN)]
    max_bulk_len: usize,

    /// Largest accepted number of arguments per request
    #[arg(long, default_value_t = DEFAULT_MAX_ARGS)]
    max_args: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Setup logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting sortkv server on {}", args.bind);

    let store: Arc<dyn OrderedStore> = if args.in_memory {
        info!("Running in-memory only");
        Arc::new(MemoryStore::new())
    } else {
        info!("Data file: {}", args.data_file.display());
        Arc::new(RedbStore::open(&args.data_file)?)
    };

    let config = ServerConfig::new()
        .with_max_bulk_len(args.max_bulk_len)
        .with_max_args(args.max_args);
    let server = KvServer::new(Keyspace::new(store), config);

    let server_task = tokio::spawn(async move {
        if let Err(e) = server.run(args.bind).await {
            error!("Server error: {}", e);
        }
    });

    // Wait for shutdown signal
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received");
        }
        Err(err) => {
            error!("Unable to listen for shutdown signal: {}", err);
        }
    }

    // Aborting drops the server's connection set, which cancels in-flight scans
    server_task.abort();
    info!("Server shutdown complete");

    Ok(())
}
