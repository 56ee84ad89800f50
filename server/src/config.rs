//! Server configuration: command line parsing and startup validation.

use crate::simulation::{ProjectileRetention, SimulationConfig};
use clap::{Parser, ValueEnum};
use shared::{PLAYER_HEIGHT, PLAYER_WIDTH};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Raised while turning command line arguments into a [`ServerConfig`].
/// Always fatal, and only ever at startup.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid listen address {0:?}")]
    InvalidListenAddress(String),
    #[error("tick period must be greater than zero")]
    ZeroTickPeriod,
    #[error("field {width}x{height} is smaller than a player")]
    FieldTooSmall { width: f32, height: f32 },
    #[error("outbound queue must hold at least one frame")]
    ZeroOutboundQueue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RetentionArg {
    /// Send each projectile once, then remove it
    BroadcastOnce,
    /// Keep simulating projectiles until they leave the field
    UntilOutOfBounds,
}

impl From<RetentionArg> for ProjectileRetention {
    fn from(arg: RetentionArg) -> Self {
        match arg {
            RetentionArg::BroadcastOnce => ProjectileRetention::BroadcastOnce,
            RetentionArg::UntilOutOfBounds => ProjectileRetention::UntilOutOfBounds,
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Address to accept connections on
    #[arg(short = 'a', long, default_value = "0.0.0.0:8888")]
    pub listen: String,

    /// Milliseconds between simulation ticks
    #[arg(short = 't', long, default_value = "50")]
    pub tick_ms: u64,

    /// Playfield width in world units
    #[arg(long, default_value = "800")]
    pub field_width: f32,

    /// Playfield height in world units
    #[arg(long, default_value = "800")]
    pub field_height: f32,

    /// What happens to a projectile after it has been broadcast
    #[arg(long, value_enum, default_value = "broadcast-once")]
    pub retention: RetentionArg,

    /// Maximum active projectiles per player (unlimited when omitted)
    #[arg(long)]
    pub max_projectiles: Option<usize>,

    /// Broadcast frames buffered per session before new frames are dropped
    #[arg(long, default_value = "32")]
    pub outbound_queue: usize,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub tick_period: Duration,
    pub simulation: SimulationConfig,
    pub outbound_queue: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8888)),
            tick_period: Duration::from_millis(50),
            simulation: SimulationConfig::default(),
            outbound_queue: 32,
        }
    }
}

impl TryFrom<Args> for ServerConfig {
    type Error = ConfigError;

    fn try_from(args: Args) -> Result<Self, Self::Error> {
        let listen_addr = args
            .listen
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidListenAddress(args.listen.clone()))?;

        if args.tick_ms == 0 {
            return Err(ConfigError::ZeroTickPeriod);
        }

        if !(args.field_width > PLAYER_WIDTH && args.field_height > PLAYER_HEIGHT) {
            return Err(ConfigError::FieldTooSmall {
                width: args.field_width,
                height: args.field_height,
            });
        }

        if args.outbound_queue == 0 {
            return Err(ConfigError::ZeroOutboundQueue);
        }

        Ok(Self {
            listen_addr,
            tick_period: Duration::from_millis(args.tick_ms),
            simulation: SimulationConfig {
                field_width: args.field_width,
                field_height: args.field_height,
                retention: args.retention.into(),
                max_projectiles_per_player: args.max_projectiles,
                ..SimulationConfig::default()
            },
            outbound_queue: args.outbound_queue,
        })
    }
}
