//! # Arcade Server Library
//!
//! Authoritative server for the arcade shooter. It accepts TCP connections,
//! runs the shared simulation on a fixed tick and broadcasts every frame to
//! all connected sessions as a newline-delimited text line.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Player movement, collision damping, boundary clamping and projectile
//! lifetime are decided here only. Clients display what the server sends.
//!
//! ### Session Management
//! Every accepted connection gets a sequential id, a welcome line and two
//! tasks: a receive loop that keeps the session's latest intent, and a writer
//! task that drains its outbound queue. A session whose stream closes or
//! whose writes fail is removed from the registry and never reappears in a
//! frame.
//!
//! ### State Broadcasting
//! The broadcast loop ticks on a fixed period, encodes the frame once and
//! offers it to every session without waiting. A congested session loses
//! frames; nobody else notices.
//!
//! ## Module Organization
//!
//! - `config`: command line arguments and validated [`config::ServerConfig`]
//! - `session`: per-connection channels (intent slot, outbound queue)
//! - `session_manager`: the registry shared between tasks
//! - `simulation`: the tick function and its tuning
//! - `network`: accept loop, per-session tasks, broadcast loop, shutdown
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind(ServerConfig::default()).await?;
//!     let shutdown = server.shutdown_handle();
//!
//!     tokio::spawn(async move {
//!         let _ = tokio::signal::ctrl_c().await;
//!         shutdown.shutdown();
//!     });
//!
//!     server.run().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod network;
pub mod session;
pub mod session_manager;
pub mod simulation;
