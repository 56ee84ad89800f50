//! # Arcade Client Library
//!
//! Client side of the arcade shooter. The client never runs physics: it
//! sends its intent on a fixed cadence and displays whatever the server
//! broadcasts.
//!
//! ## Architecture Overview
//!
//! Three activities run at once:
//! - the **input sender** writes the latest [`shared::Intent`] every send period
//! - the **state receiver** decodes broadcast frames and merges them into the
//!   [`mirror::EntityMirror`]
//! - the **presentation loop** (macroquad, on the main thread) turns key
//!   events into intent and draws the mirror
//!
//! The network activities run on a tokio runtime on their own thread. The
//! two sides meet through `watch` channels only: intent flows out of the
//! presentation loop, mirror snapshots flow into it.
//!
//! ## Module Organization
//!
//! - `config`: command line arguments and [`config::ClientConfig`]
//! - `input`: key events to intent, console toggle
//! - `mirror`: entity mirror and the merge rules for incoming frames
//! - `network`: handshake, input sender, state receiver
//! - `rendering`: rectangles for ships and projectiles, connection indicator
//!   and console overlay
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::config::ClientConfig;
//! use client::mirror::EntityMirror;
//! use shared::Intent;
//! use tokio::sync::watch;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::default();
//!     let (_intent_tx, intent_rx) = watch::channel(Intent::idle());
//!     let (mirror_tx, _mirror_rx) =
//!         watch::channel(EntityMirror::new(config.remote_player_policy));
//!     let (_shutdown_tx, shutdown_rx) = watch::channel(false);
//!
//!     client::network::run(config, intent_rx, mirror_tx, shutdown_rx).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod input;
pub mod mirror;
pub mod network;
pub mod rendering;
