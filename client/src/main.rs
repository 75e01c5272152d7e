use clap::{Parser, Subcommand};
use client::network::Client;
use client::session::{seated_name, Session};
use log::info;
use shared::{Timings, COUNTDOWN_SECONDS, DEFAULT_LEXICON, GAMEOVER_SECONDS, ROUND_SECONDS};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Display name in the match
    #[arg(short = 'n', long)]
    name: String,

    /// Seconds between rounds
    #[arg(long, default_value_t = COUNTDOWN_SECONDS)]
    countdown_secs: u32,

    /// Seconds to solve a puzzle
    #[arg(long, default_value_t = ROUND_SECONDS)]
    round_secs: u32,

    /// Seconds before a finished game restarts
    #[arg(long, default_value_t = GAMEOVER_SECONDS)]
    gameover_secs: u32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show open matches
    List,
    /// Create a match and wait for an opponent
    Create {
        #[arg(short, long, default_value = DEFAULT_LEXICON)]
        lexicon: String,
    },
    /// Join a waiting match by id
    Join { match_id: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let timings = Timings {
        countdown_secs: args.countdown_secs,
        round_secs: args.round_secs,
        gameover_secs: args.gameover_secs,
    };

    info!("Connecting to: {}", args.server);
    let client = Client::new(&args.server).await?;

    let seated = match args.command {
        Command::List => {
            let matches = client.list_matches().await?;
            if matches.is_empty() {
                println!("No open matches.");
            }
            for m in matches {
                let opponent = m.player2_name.as_deref().unwrap_or("-");
                println!(
                    "{}  {}  {} vs {}  {}",
                    m.id, m.lexicon, m.player1_name, opponent, m.status
                );
            }
            return Ok(());
        }
        Command::Create { lexicon } => {
            let created = client.create_match(&args.name, &lexicon).await?;
            println!("Match {} created. Share this id with your opponent.", created.id);
            created
        }
        Command::Join { match_id } => client.join_match(&match_id, &args.name).await?,
    };

    let player_name = seated_name(&seated, &args.name).unwrap_or(args.name.trim());
    client
        .play(&seated.id, Session::new(player_name, timings))
        .await?;

    Ok(())
}
