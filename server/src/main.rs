use clap::Parser;
use log::{error, info};
use server::config::{Args, ServerConfig};
use server::network::Server;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let config = ServerConfig::try_from(Args::parse())?;

    info!("Starting server...");
    info!(
        "Tick period {}ms, field {}x{}, retention {:?}",
        config.tick_period.as_millis(),
        config.simulation.field_width,
        config.simulation.field_height,
        config.simulation.retention
    );
    if let Some(cap) = config.simulation.max_projectiles_per_player {
        info!("At most {} active projectiles per player", cap);
    }

    let server = Server::bind(config).await?;
    let shutdown = server.shutdown_handle();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, shutting down gracefully...");
                shutdown.shutdown();
            }
            Err(e) => error!("Could not listen for Ctrl+C: {}", e),
        }
    });

    server.run().await;

    Ok(())
}
