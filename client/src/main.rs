use clap::Parser;
use client::network::Client;
use log::info;
use shared::Color;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:55556")]
    server: String,

    /// Preferred color (RED, BLUE, GREEN or YELLOW); falls back to the first free one
    #[arg(short = 'c', long)]
    color: Option<Color>,

    /// Client frame period in milliseconds
    #[arg(short = 't', long, default_value = "16")]
    tick_ms: u64,

    /// Chance per frame that the bot clicks one of its balloons
    #[arg(short = 'p', long, default_value = "0.3")]
    pop_chance: f64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    info!("Starting client...");
    let client = Client::connect(
        &args.server,
        args.color,
        Duration::from_millis(args.tick_ms),
        args.pop_chance,
    )
    .await?;

    let final_state = client.run().await?;
    match &final_state.results {
        Some(results) => {
            for entry in &results.scores {
                info!(
                    "Player {} ({}): {}",
                    entry.player_id,
                    entry
                        .color
                        .map(|color| color.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    entry.score
                );
            }
            let won = final_state
                .my_id()
                .is_some_and(|id| results.winners.contains(&id));
            info!("{}", if won { "You win!" } else { "Game over" });
        }
        None => info!("Disconnected before the match ended"),
    }

    Ok(())
}
