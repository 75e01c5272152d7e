use clap::Parser;
use log::info;
use server::network::{Server, ServerConfig, ServerMessage};
use server::puzzle::LexiconPuzzles;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Directory holding one <LEXICON>.txt word list per lexicon
    #[arg(short, long, default_value = "data")]
    data_dir: PathBuf,

    /// Seconds of silence before a player counts as disconnected
    #[arg(short, long, default_value = "5")]
    timeout_secs: u64,

    /// Maximum number of clients watching matches at once
    #[arg(short, long, default_value = "64")]
    max_subscribers: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let address = format!("{}:{}", args.host, args.port);
    info!("Reading lexicons from {}", args.data_dir.display());

    let config = ServerConfig {
        max_subscribers: args.max_subscribers,
        subscriber_timeout: Duration::from_secs(args.timeout_secs),
    };
    let puzzles = Box::new(LexiconPuzzles::new(args.data_dir));
    let mut server = Server::new(&address, puzzles, config).await?;

    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down gracefully...");
            let _ = shutdown.send(ServerMessage::Shutdown);
        }
    });

    server.run().await?;

    Ok(())
}
