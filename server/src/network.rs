//! Server network layer: accept loop, per-session tasks and the tick loop
//!
//! Task layout:
//! - **Accept loop**: allocates an id, sends the welcome line and registers
//!   the session
//! - **Receive loop** (one per session): decodes intent lines into the
//!   session's intent slot
//! - **Writer task** (one per session): drains the session's outbound queue
//!   onto the socket
//! - **Broadcast loop**: ticks the simulation on a fixed period and offers
//!   the encoded frame to every session
//!
//! Every task holds a clone of the shutdown receiver and exits at its next
//! suspension point once shutdown is signalled.

use crate::config::ServerConfig;
use crate::session::{Frame, Session, SessionIo};
use crate::session_manager::SessionManager;
use crate::simulation::Simulation;
use log::{debug, error, info, warn};
use shared::{decode_intent_bytes, encode_frame, encode_welcome, Intent};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch, Notify, RwLock};
use tokio::time::{interval, MissedTickBehavior};

/// Transport failures. These end the affected session and nothing else.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
    #[error("peer closed the connection")]
    Closed,
    #[error("session {0} is no longer registered")]
    SessionGone(u32),
}

/// Cloneable trigger that stops every server task.
#[derive(Clone)]
pub struct ShutdownHandle(Arc<watch::Sender<bool>>);

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.0.send_replace(true);
    }
}

pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
    sessions: Arc<RwLock<SessionManager>>,
    session_joined: Arc<Notify>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Server {
    /// Binds the configured address. Failing here is fatal for the process.
    pub async fn bind(config: ServerConfig) -> Result<Self, ConnectionError> {
        let listener = TcpListener::bind(config.listen_addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Server {
            listener,
            config,
            sessions: Arc::new(RwLock::new(SessionManager::new())),
            session_joined: Arc::new(Notify::new()),
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(Arc::clone(&self.shutdown_tx))
    }

    /// Runs the accept loop and the broadcast loop until shutdown.
    pub async fn run(self) {
        let broadcaster = tokio::spawn(broadcast_loop(
            Arc::clone(&self.sessions),
            Arc::clone(&self.session_joined),
            self.config.clone(),
            self.shutdown_rx.clone(),
        ));

        let mut shutdown = self.shutdown_rx.clone();
        info!("Server started successfully");

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            tokio::spawn(handle_connection(
                                stream,
                                addr,
                                Arc::clone(&self.sessions),
                                Arc::clone(&self.session_joined),
                                self.config.outbound_queue,
                                self.shutdown_rx.clone(),
                            ));
                        }
                        Err(e) => {
                            error!("Error accepting connection: {}", e);
                            tokio::time::sleep(Duration::from_millis(10)).await;
                        }
                    }
                },

                _ = shutdown.changed() => {
                    info!("Server shutting down");
                    break;
                }
            }
        }

        if let Err(e) = broadcaster.await {
            error!("Broadcast loop panicked: {}", e);
        }
    }
}

/// Handshake for one accepted stream, then hands it to its two tasks.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    sessions: Arc<RwLock<SessionManager>>,
    session_joined: Arc<Notify>,
    queue_len: usize,
    shutdown: watch::Receiver<bool>,
) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!("Could not disable Nagle for {}: {}", addr, e);
    }

    let (read_half, mut write_half) = stream.into_split();
    let id = sessions.write().await.allocate_id();

    if let Err(e) = write_half.write_all(encode_welcome(id).as_bytes()).await {
        warn!("Handshake with {} failed: {}", addr, e);
        return;
    }

    let (session, io) = Session::channel(id, addr, queue_len);
    let SessionIo {
        intent_tx,
        outbound_rx,
    } = io;
    sessions.write().await.add_session(session);
    session_joined.notify_one();

    tokio::spawn(writer_loop(
        id,
        write_half,
        outbound_rx,
        Arc::clone(&sessions),
        shutdown.clone(),
    ));

    match receive_loop(id, BufReader::new(read_half), intent_tx, &sessions, shutdown).await {
        Ok(()) | Err(ConnectionError::SessionGone(_)) => {}
        Err(e) => debug!("Session {} receive loop ended: {}", id, e),
    }
}

async fn remove_session(sessions: &RwLock<SessionManager>, id: u32, cause: &str) {
    if sessions.write().await.remove_session(&id) {
        info!("Session {} removed: {}", id, cause);
    }
}

/// Reads intent lines for one session until the stream ends.
///
/// Malformed lines, including ones that are not UTF-8, are logged and
/// skipped. End of stream and transport
/// errors remove the session. If the session was removed elsewhere, the
/// loop stops without touching the registry again.
pub async fn receive_loop<R>(
    id: u32,
    mut reader: R,
    intent_tx: watch::Sender<Intent>,
    sessions: &RwLock<SessionManager>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), ConnectionError>
where
    R: AsyncBufRead + Unpin,
{
    // Survives cancelled reads: a partial line stays buffered until its newline.
    let mut line = Vec::new();

    let result = loop {
        tokio::select! {
            read = reader.read_until(b'\n', &mut line) => {
                match read {
                    Ok(0) => break Err(ConnectionError::Closed),
                    Ok(_) => {
                        let decoded = decode_intent_bytes(&line);
                        line.clear();

                        match decoded {
                            Ok(intent) => {
                                if intent_tx.send(intent).is_err() {
                                    break Err(ConnectionError::SessionGone(id));
                                }
                            }
                            Err(e) => warn!("Session {}: skipping frame, {}", id, e),
                        }
                    }
                    Err(e) => break Err(ConnectionError::Io(e)),
                }
            },

            _ = intent_tx.closed() => break Err(ConnectionError::SessionGone(id)),

            _ = shutdown.changed() => break Ok(()),
        }
    };

    match &result {
        Err(ConnectionError::Closed) => remove_session(sessions, id, "peer closed").await,
        Err(ConnectionError::Io(e)) => remove_session(sessions, id, &e.to_string()).await,
        _ => {}
    }

    result
}

/// Writes queued frames for one session until its queue closes.
///
/// The queue closes when the session leaves the registry. A failed write
/// removes the session; it is never retried.
pub async fn writer_loop<W>(
    id: u32,
    mut writer: W,
    mut outbound: mpsc::Receiver<Frame>,
    sessions: Arc<RwLock<SessionManager>>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), ConnectionError>
where
    W: AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            frame = outbound.recv() => {
                let Some(frame) = frame else { break };

                if let Err(e) = writer.write_all(frame.as_bytes()).await {
                    remove_session(&sessions, id, &format!("write failed: {}", e)).await;
                    return Err(e.into());
                }
            },

            _ = shutdown.changed() => break,
        }
    }

    let _ = writer.shutdown().await;
    Ok(())
}

/// Fixed-period tick: sync players with the registry, advance the
/// simulation, fan the frame out. Parks while no session is connected.
async fn broadcast_loop(
    sessions: Arc<RwLock<SessionManager>>,
    session_joined: Arc<Notify>,
    config: ServerConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut simulation = Simulation::new(config.simulation.clone());
    let mut ticker = interval(config.tick_period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        if sessions.read().await.is_empty() {
            simulation.sync_players(std::iter::empty());
            debug!("No sessions connected, waiting");

            tokio::select! {
                _ = session_joined.notified() => {},
                _ = shutdown.changed() => break,
            }
            ticker.reset();
            continue;
        }

        tokio::select! {
            _ = ticker.tick() => {},
            _ = shutdown.changed() => break,
        }

        let closed = {
            // The read guard spans sync, tick and fan-out so a removed
            // session's id cannot slip into the frame.
            let sessions = sessions.read().await;
            if sessions.is_empty() {
                continue;
            }

            simulation.sync_players(sessions.ids());
            let frame = simulation.tick(&sessions.latest_intents());
            let line: Frame = Arc::from(encode_frame(&frame));
            sessions.broadcast(&line)
        };

        for id in closed {
            remove_session(&sessions, id, "writer stopped").await;
        }
    }

    debug!("Broadcast loop stopped after {} ticks", simulation.tick);
}
