use clap::Parser;
use log::info;
use server::config::Config;
use server::network::Server;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();

    info!("Starting tic-tac-toe server...");
    info!(
        "Game port {}, video port {}, video queue depth {}",
        config.game_port, config.video_port, config.video_queue
    );

    let server = Server::bind(&config).await?;

    tokio::select! {
        _ = server.run() => {}
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Server shutting down");
        }
    }

    Ok(())
}
