//! Bingo coordinator binary.
//!
//! # Usage
//!
//! ```bash
//! bingo-server --bind 0.0.0.0:4700
//!
//! # Verbose relay logging
//! RUST_LOG=bingo_server=debug bingo-server
//! ```

use bingo_server::{CoordinatorConfig, Server, ServerRuntimeConfig};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Bingo session coordinator
#[derive(Parser, Debug)]
#[command(name = "bingo-server")]
#[command(about = "Pairs two players into a bingo session and relays their moves")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0:4700")]
    bind: String,

    /// Maximum concurrent sessions
    #[arg(long, default_value = "10000")]
    max_rooms: usize,

    /// Messages buffered per connection
    #[arg(long, default_value = "256")]
    outbound_queue: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Bingo coordinator starting");
    tracing::info!("Binding to {}", args.bind);

    let config = ServerRuntimeConfig {
        bind_address: args.bind,
        outbound_queue: args.outbound_queue,
        coordinator: CoordinatorConfig { max_rooms: args.max_rooms, ..Default::default() },
    };

    let server = Server::bind(config).await?;

    tracing::info!("Server listening on {}", server.local_addr()?);

    server.run().await?;

    Ok(())
}
