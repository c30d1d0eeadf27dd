use clap::Parser;
use log::info;
use server::config::{GameConfig, DEFAULT_ROUND_SECS, DEFAULT_SPAWN_CHANCE, DEFAULT_TICK_MS};
use server::network::Server;
use shared::DEFAULT_PORT;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,
    /// Game loop period in milliseconds
    #[clap(short, long, default_value_t = DEFAULT_TICK_MS)]
    tick_ms: u64,
    /// Chance per tick that a balloon spawns, clamped to 0..=1
    #[clap(short, long, default_value_t = DEFAULT_SPAWN_CHANCE)]
    spawn_chance: f64,
    /// Round length in seconds
    #[clap(short, long, default_value_t = DEFAULT_ROUND_SECS)]
    round_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = GameConfig::new(args.tick_ms, args.spawn_chance, args.round_secs);
    let address = format!("{}:{}", args.host, args.port);

    info!("Starting server on {} with {:?}", address, config);
    let server = Server::new(&address, config).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
