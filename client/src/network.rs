//! Client connection: handshake, then an input sender and a state receiver
//! running side by side until either ends or shutdown is signalled.

use crate::config::ClientConfig;
use crate::mirror::EntityMirror;
use log::{debug, info, warn};
use shared::{decode_broadcast_bytes, decode_welcome, encode_intent, Intent, ProtocolError};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
    #[error("server closed the connection")]
    Closed,
    #[error("handshake failed: {0}")]
    Handshake(#[from] ProtocolError),
}

/// Reads the welcome line and returns the session id it carries.
pub async fn handshake<R>(reader: &mut R) -> Result<u32, ConnectionError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Err(ConnectionError::Closed);
    }

    Ok(decode_welcome(&line)?)
}

/// Writes the current intent every `period`, whether or not it changed.
pub async fn input_sender<W>(
    mut writer: W,
    intent: watch::Receiver<Intent>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), ConnectionError>
where
    W: AsyncWrite + Unpin,
{
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let current = *intent.borrow();
                let line = encode_intent(&current);
                writer.write_all(line.as_bytes()).await?;
                debug!("Sent intent {}", line.trim_end());
            },

            _ = shutdown.changed() => break,
        }
    }

    let _ = writer.shutdown().await;
    Ok(())
}

/// Decodes broadcast lines into the mirror until the stream ends.
///
/// Malformed frames, including ones that are not UTF-8, are skipped. The
/// mirror is marked disconnected when the stream ends or fails.
pub async fn state_receiver<R>(
    mut reader: R,
    mirror: &watch::Sender<EntityMirror>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), ConnectionError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    let mut received: u64 = 0;

    let result = loop {
        tokio::select! {
            read = reader.read_until(b'\n', &mut line) => {
                match read {
                    Ok(0) => break Err(ConnectionError::Closed),
                    Ok(_) => {
                        let decoded = decode_broadcast_bytes(&line);
                        line.clear();

                        match decoded {
                            Ok(frame) => {
                                mirror.send_modify(|m| m.apply_frame(&frame));
                                received += 1;
                                if received % 60 == 0 {
                                    debug!(
                                        "Frame {}: {} players, {} projectile updates",
                                        received,
                                        frame.players.len(),
                                        frame.projectiles.len()
                                    );
                                }
                            }
                            Err(e) => warn!("Skipping broadcast frame: {}", e),
                        }
                    }
                    Err(e) => break Err(ConnectionError::Io(e)),
                }
            },

            _ = shutdown.changed() => break Ok(()),
        }
    };

    mirror.send_modify(EntityMirror::set_disconnected);
    result
}

async fn connect(
    addr: SocketAddr,
) -> Result<(BufReader<OwnedReadHalf>, OwnedWriteHalf, u32), ConnectionError> {
    let stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;

    let (read_half, write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let session_id = handshake(&mut reader).await?;

    Ok((reader, write_half, session_id))
}

/// Connects, performs the handshake and runs both activities.
///
/// Returns when the server goes away, a transport error occurs, or shutdown
/// is signalled. The mirror is left disconnected in every case.
pub async fn run(
    config: ClientConfig,
    intent: watch::Receiver<Intent>,
    mirror: watch::Sender<EntityMirror>,
    shutdown: watch::Receiver<bool>,
) -> Result<(), ConnectionError> {
    info!("Connecting to server at {}...", config.server_addr);

    let mut connecting_shutdown = shutdown.clone();
    let (reader, write_half, session_id) = tokio::select! {
        connected = connect(config.server_addr) => connected?,
        _ = connecting_shutdown.changed() => return Ok(()),
    };

    info!("Connected! Session ID: {}", session_id);
    mirror.send_modify(|m| m.set_local_id(session_id));

    let sender = input_sender(write_half, intent, config.send_period, shutdown.clone());
    let receiver = state_receiver(reader, &mirror, shutdown);

    let result = tokio::select! {
        result = sender => result,
        result = receiver => result,
    };

    mirror.send_modify(EntityMirror::set_disconnected);

    match result {
        Ok(()) => info!("Disconnected"),
        Err(ref e) => warn!("Disconnected: {}", e),
    }
    result
}
