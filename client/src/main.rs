use clap::Parser;
use client::config::{Args, ClientConfig};
use client::input::{poll_key_events, IntentTracker};
use client::mirror::EntityMirror;
use client::network;
use client::rendering::Renderer;
use log::{error, info};
use macroquad::prelude::{is_key_pressed, next_frame, Conf, KeyCode};
use shared::Intent;
use std::thread;
use tokio::sync::watch;

fn window_conf() -> Conf {
    let args = Args::parse();

    Conf {
        window_title: "Arcade Client".to_owned(),
        window_width: args.width as i32,
        window_height: args.height as i32,
        window_resizable: false,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    if let Err(e) = run().await {
        error!("Client failed: {}", e);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = ClientConfig::try_from(Args::parse())?;

    info!("Starting client...");
    info!("Connecting to: {}", config.server_addr);
    info!("Controls: arrow keys to move, Space to fire, C for the console, Esc to quit");

    let (intent_tx, intent_rx) = watch::channel(Intent::idle());
    let (mirror_tx, mirror_rx) = watch::channel(EntityMirror::new(config.remote_player_policy));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut renderer = Renderer::new(config.width, config.height);

    // macroquad owns the main thread, so the network runs on its own runtime.
    let runtime = tokio::runtime::Runtime::new()?;
    let network_thread = thread::spawn(move || {
        if let Err(e) = runtime.block_on(network::run(config, intent_rx, mirror_tx, shutdown_rx)) {
            error!("Connection ended: {}", e);
        }
    });

    let mut tracker = IntentTracker::new();

    while !is_key_pressed(KeyCode::Escape) {
        for event in poll_key_events() {
            if tracker.apply(event) {
                intent_tx.send_replace(tracker.intent());
            }
        }

        let mirror = mirror_rx.borrow().clone();
        renderer.render(&mirror, tracker.console_visible());

        next_frame().await;
    }

    shutdown_tx.send_replace(true);
    if network_thread.join().is_err() {
        error!("Network thread panicked");
    }

    Ok(())
}
