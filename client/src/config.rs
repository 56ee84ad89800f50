//! Client configuration: command line parsing and startup validation.

use crate::mirror::RemotePlayerPolicy;
use clap::{Parser, ValueEnum};
use shared::{FIELD_HEIGHT, FIELD_WIDTH, PLAYER_HEIGHT, PLAYER_WIDTH};
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;
use thiserror::Error;

/// Raised while turning command line arguments into a [`ClientConfig`].
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("cannot resolve server address {0:?}")]
    InvalidServerAddress(String),
    #[error("send period must be greater than zero")]
    ZeroSendPeriod,
    #[error("window {width}x{height} is smaller than a player")]
    WindowTooSmall { width: f32, height: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RemotePlayersArg {
    /// Forget remote players missing from a frame
    PruneAbsent,
    /// Keep every remote player once seen
    Retain,
}

impl From<RemotePlayersArg> for RemotePlayerPolicy {
    fn from(arg: RemotePlayersArg) -> Self {
        match arg {
            RemotePlayersArg::PruneAbsent => RemotePlayerPolicy::PruneAbsent,
            RemotePlayersArg::Retain => RemotePlayerPolicy::Retain,
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8888")]
    pub server: String,

    /// Milliseconds between intent messages
    #[arg(long, default_value = "200")]
    pub send_ms: u64,

    /// What to do with remote players that are missing from a frame
    #[arg(long, value_enum, default_value = "prune-absent")]
    pub remote_players: RemotePlayersArg,

    /// Window width
    #[arg(short = 'w', long, default_value_t = FIELD_WIDTH)]
    pub width: f32,

    /// Window height (no short flag to avoid conflict with --help)
    #[arg(long, default_value_t = FIELD_HEIGHT)]
    pub height: f32,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_addr: SocketAddr,
    pub send_period: Duration,
    pub remote_player_policy: RemotePlayerPolicy,
    pub width: f32,
    pub height: f32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([127, 0, 0, 1], 8888)),
            send_period: Duration::from_millis(200),
            remote_player_policy: RemotePlayerPolicy::default(),
            width: FIELD_WIDTH,
            height: FIELD_HEIGHT,
        }
    }
}

impl TryFrom<Args> for ClientConfig {
    type Error = ConfigError;

    fn try_from(args: Args) -> Result<Self, Self::Error> {
        // Host names such as "localhost:8888" are accepted, not just literals.
        let server_addr = args
            .server
            .to_socket_addrs()
            .ok()
            .and_then(|mut addrs| addrs.next())
            .ok_or_else(|| ConfigError::InvalidServerAddress(args.server.clone()))?;

        if args.send_ms == 0 {
            return Err(ConfigError::ZeroSendPeriod);
        }

        if !(args.width > PLAYER_WIDTH && args.height > PLAYER_HEIGHT) {
            return Err(ConfigError::WindowTooSmall {
                width: args.width,
                height: args.height,
            });
        }

        Ok(Self {
            server_addr,
            send_period: Duration::from_millis(args.send_ms),
            remote_player_policy: args.remote_players.into(),
            width: args.width,
            height: args.height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["client"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::try_from(parse(&[])).unwrap();
        assert_eq!(config.server_addr, "127.0.0.1:8888".parse().unwrap());
        assert_eq!(config.send_period, Duration::from_millis(200));
        assert_eq!(config.remote_player_policy, RemotePlayerPolicy::PruneAbsent);
        assert_eq!(config.width, 800.0);
        assert_eq!(config.height, 800.0);
    }

    #[test]
    fn test_overrides() {
        let config = ClientConfig::try_from(parse(&[
            "-s",
            "127.0.0.1:9000",
            "--send-ms",
            "50",
            "--remote-players",
            "retain",
        ]))
        .unwrap();

        assert_eq!(config.server_addr.port(), 9000);
        assert_eq!(config.send_period, Duration::from_millis(50));
        assert_eq!(config.remote_player_policy, RemotePlayerPolicy::Retain);
    }

    #[test]
    fn test_rejects_unresolvable_address() {
        let err = ClientConfig::try_from(parse(&["-s", "no port here"])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidServerAddress("no port here".to_string())
        );
    }

    #[test]
    fn test_rejects_zero_send_period() {
        let err = ClientConfig::try_from(parse(&["--send-ms", "0"])).unwrap_err();
        assert_eq!(err, ConfigError::ZeroSendPeriod);
    }

    #[test]
    fn test_rejects_tiny_window() {
        let err = ClientConfig::try_from(parse(&["--height", "20"])).unwrap_err();
        assert!(matches!(err, ConfigError::WindowTooSmall { .. }));
    }
}
