//! WebSocket frame client for real-time communication with the relay.
//!
//! The frame client manages the WebSocket lifecycle: connection, reconnection
//! with exponential backoff, frame dispatch, and view updates. It is the
//! bridge between the relay's protocol and whatever renders [`ClientView`].
//!
//! One task owns the [`SyncAdapter`]. UI commands arrive on a channel and
//! interleave with socket reads in a single `select!`, so the local store is
//! never locked.
//!
//! ERROR HANDLING
//! ==============
//! Transport failures end the session and re-enter the connect loop after a
//! backoff. Undecodable frames are logged and skipped. A local command that
//! fails in the adapter is logged and nothing is sent. Commands issued while
//! disconnected are applied locally and never sent; the next snapshot
//! supersedes them.

use std::time::Duration;

use canvas::engine::Engine;
use frames::{Color, Message, Point, decode_message, encode_message};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use crate::sync::{ClientView, Identity, SyncAdapter};

pub const INITIAL_BACKOFF: Duration = Duration::from_millis(1000);
pub const MAX_BACKOFF: Duration = Duration::from_millis(10_000);
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

const COMMAND_QUEUE_CAPACITY: usize = 256;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error("frame client has stopped")]
    Closed,
    #[error("timed out waiting for client state")]
    Timeout,
}

#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Relay WebSocket endpoint, e.g. `ws://127.0.0.1:3000/ws`.
    pub url: String,
    pub identity: Identity,
    /// A connection that receives nothing, not even a Ping, for this long is
    /// dropped and re-established.
    pub idle_timeout: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl ClientConfig {
    pub fn new(url: impl Into<String>, identity: Identity) -> Self {
        Self {
            url: url.into(),
            identity,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            initial_backoff: INITIAL_BACKOFF,
            max_backoff: MAX_BACKOFF,
        }
    }
}

/// Requests from the UI to the client task.
#[derive(Clone, Debug, PartialEq)]
enum Command {
    Draw { points: Vec<Point>, color: Color, thickness: f64 },
    Erase(String),
    EraseAt(usize),
    Move { stroke_id: String, dx: f64, dy: f64 },
    MoveAt { index: usize, dx: f64, dy: f64 },
    Clear,
    Chat(String),
    Announce,
    Shutdown,
}

enum SessionEnd {
    Lost,
    Shutdown,
}

// =============================================================================
// HANDLE
// =============================================================================

/// Cheap handle to a running frame client.
#[derive(Clone, Debug)]
pub struct ClientHandle {
    commands: mpsc::Sender<Command>,
    view: watch::Receiver<ClientView>,
}

impl ClientHandle {
    /// Spawn the frame client task on the current runtime.
    #[must_use]
    pub fn spawn(config: ClientConfig) -> (Self, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let (view_tx, view_rx) = watch::channel(ClientView::default());
        let task = tokio::spawn(frame_client_loop(config, command_rx, view_tx));
        (Self { commands: command_tx, view: view_rx }, task)
    }

    /// Latest published view.
    #[must_use]
    pub fn view(&self) -> ClientView {
        self.view.borrow().clone()
    }

    /// A receiver that is notified on every view change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ClientView> {
        self.view.clone()
    }

    /// Wait until the view satisfies `predicate`.
    ///
    /// # Errors
    ///
    /// [`ClientError::Timeout`] if `limit` elapses first,
    /// [`ClientError::Closed`] if the client task stopped.
    pub async fn wait_for(
        &self,
        limit: Duration,
        predicate: impl FnMut(&ClientView) -> bool,
    ) -> Result<ClientView, ClientError> {
        let mut view = self.view.clone();
        let matched = tokio::time::timeout(limit, view.wait_for(predicate))
            .await
            .map_err(|_| ClientError::Timeout)?
            .map_err(|_| ClientError::Closed)?;
        Ok(matched.clone())
    }

    /// # Errors
    ///
    /// [`ClientError::Closed`] if the client task stopped.
    pub async fn draw(&self, points: Vec<Point>, color: Color, thickness: f64) -> Result<(), ClientError> {
        self.send(Command::Draw { points, color, thickness }).await
    }

    /// # Errors
    ///
    /// [`ClientError::Closed`] if the client task stopped.
    pub async fn erase(&self, stroke_id: impl Into<String>) -> Result<(), ClientError> {
        self.send(Command::Erase(stroke_id.into())).await
    }

    /// # Errors
    ///
    /// [`ClientError::Closed`] if the client task stopped.
    pub async fn erase_at(&self, index: usize) -> Result<(), ClientError> {
        self.send(Command::EraseAt(index)).await
    }

    /// # Errors
    ///
    /// [`ClientError::Closed`] if the client task stopped.
    pub async fn move_stroke(&self, stroke_id: impl Into<String>, dx: f64, dy: f64) -> Result<(), ClientError> {
        self.send(Command::Move { stroke_id: stroke_id.into(), dx, dy }).await
    }

    /// # Errors
    ///
    /// [`ClientError::Closed`] if the client task stopped.
    pub async fn move_at(&self, index: usize, dx: f64, dy: f64) -> Result<(), ClientError> {
        self.send(Command::MoveAt { index, dx, dy }).await
    }

    /// # Errors
    ///
    /// [`ClientError::Closed`] if the client task stopped.
    pub async fn clear_board(&self) -> Result<(), ClientError> {
        self.send(Command::Clear).await
    }

    /// # Errors
    ///
    /// [`ClientError::Closed`] if the client task stopped.
    pub async fn send_chat(&self, text: impl Into<String>) -> Result<(), ClientError> {
        self.send(Command::Chat(text.into())).await
    }

    /// # Errors
    ///
    /// [`ClientError::Closed`] if the client task stopped.
    pub async fn announce(&self) -> Result<(), ClientError> {
        self.send(Command::Announce).await
    }

    /// Close the connection and stop the client task.
    ///
    /// # Errors
    ///
    /// [`ClientError::Closed`] if the client task already stopped.
    pub async fn shutdown(&self) -> Result<(), ClientError> {
        self.send(Command::Shutdown).await
    }

    async fn send(&self, command: Command) -> Result<(), ClientError> {
        self.commands.send(command).await.map_err(|_| ClientError::Closed)
    }
}

// =============================================================================
// CONNECTION LOOP
// =============================================================================

/// Main connection loop with reconnect logic.
async fn frame_client_loop(
    config: ClientConfig,
    mut commands: mpsc::Receiver<Command>,
    view: watch::Sender<ClientView>,
) {
    let mut adapter = SyncAdapter::new(config.identity.clone(), Engine::mounted());
    let mut backoff = config.initial_backoff;

    loop {
        adapter.connecting();
        view.send_replace(adapter.view());

        match connect_async(config.url.as_str()).await {
            Ok((mut socket, _)) => {
                info!(url = %config.url, "ws: connected");
                let end = connect_and_run(&mut socket, &config, &mut adapter, &mut commands, &view).await;
                if adapter.status().is_synced() {
                    backoff = config.initial_backoff;
                }
                if let SessionEnd::Shutdown = end {
                    adapter.disconnected();
                    view.send_replace(adapter.view());
                    info!("ws: client shut down");
                    return;
                }
                warn!(url = %config.url, "ws: connection lost");
            }
            Err(e) => warn!(url = %config.url, error = %e, "ws: connect failed"),
        }

        adapter.disconnected();
        view.send_replace(adapter.view());

        if !wait_offline(backoff, &mut adapter, &mut commands, &view).await {
            info!("ws: client shut down");
            return;
        }
        backoff = (backoff * 2).min(config.max_backoff);
    }
}

/// Sleep out the backoff while still serving commands locally. Returns
/// false if the client should stop.
async fn wait_offline(
    backoff: Duration,
    adapter: &mut SyncAdapter,
    commands: &mut mpsc::Receiver<Command>,
    view: &watch::Sender<ClientView>,
) -> bool {
    let sleep = tokio::time::sleep(backoff);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            () = &mut sleep => return true,
            command = commands.recv() => {
                let Some(command) = command else { return false };
                if command == Command::Shutdown {
                    return false;
                }
                if let Some(message) = apply_local(adapter, command) {
                    debug!(kind = %message.kind(), "ws: offline, applied locally only");
                }
                view.send_replace(adapter.view());
            }
        }
    }
}

/// Process one connection until it closes or the client shuts down.
async fn connect_and_run(
    socket: &mut Socket,
    config: &ClientConfig,
    adapter: &mut SyncAdapter,
    commands: &mut mpsc::Receiver<Command>,
    view: &watch::Sender<ClientView>,
) -> SessionEnd {
    let idle = tokio::time::sleep(config.idle_timeout);
    tokio::pin!(idle);

    loop {
        tokio::select! {
            msg = socket.next() => {
                let msg = match msg {
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => {
                        warn!(error = %e, "ws: recv error");
                        return SessionEnd::Lost;
                    }
                    None => return SessionEnd::Lost,
                };
                idle.as_mut().reset(Instant::now() + config.idle_timeout);
                match msg {
                    WsMessage::Text(text) => {
                        dispatch_frame(adapter, text.as_str());
                        view.send_replace(adapter.view());
                    }
                    WsMessage::Ping(_) => {
                        // The pong is queued by the read; push it out now.
                        if let Err(e) = socket.flush().await {
                            warn!(error = %e, "ws: pong flush failed");
                            return SessionEnd::Lost;
                        }
                    }
                    WsMessage::Close(_) => return SessionEnd::Lost,
                    WsMessage::Binary(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => {}
                }
            }
            command = commands.recv() => {
                let Some(command) = command.filter(|c| *c != Command::Shutdown) else {
                    if let Err(e) = socket.close(None).await {
                        debug!(error = %e, "ws: close handshake failed");
                    }
                    return SessionEnd::Shutdown;
                };
                let outbound = apply_local(adapter, command);
                view.send_replace(adapter.view());
                if let Some(message) = outbound {
                    if !send_message(socket, &message).await {
                        return SessionEnd::Lost;
                    }
                }
            }
            () = &mut idle => {
                warn!(idle_secs = config.idle_timeout.as_secs(), "ws: idle timeout");
                return SessionEnd::Lost;
            }
        }
    }
}

/// Decode an incoming frame and hand it to the adapter.
fn dispatch_frame(adapter: &mut SyncAdapter, text: &str) {
    let message = match decode_message(text) {
        Ok(message) => message,
        Err(e) => {
            debug!(error = %e, "ws: undecodable frame skipped");
            return;
        }
    };
    let kind = message.kind();
    if let Err(e) = adapter.apply_remote(message) {
        warn!(%kind, error = %e, "ws: remote frame not applied");
    }
}

/// Run a command through the adapter. Returns the message to send, if any.
fn apply_local(adapter: &mut SyncAdapter, command: Command) -> Option<Message> {
    let result = match command {
        Command::Draw { points, color, thickness } => adapter.draw(points, color, thickness),
        Command::Erase(stroke_id) => adapter.erase(&stroke_id),
        Command::EraseAt(index) => adapter.erase_at(index),
        Command::Move { stroke_id, dx, dy } => adapter.move_stroke(&stroke_id, dx, dy),
        Command::MoveAt { index, dx, dy } => adapter.move_at(index, dx, dy),
        Command::Clear => adapter.clear_board(),
        Command::Chat(text) => Ok(adapter.send_chat(&text)),
        Command::Announce => Ok(adapter.announce()),
        Command::Shutdown => return None,
    };
    match result {
        Ok(message) => Some(message),
        Err(e) => {
            warn!(error = %e, "local operation failed; nothing sent");
            None
        }
    }
}

async fn send_message(socket: &mut Socket, message: &Message) -> bool {
    let text = match encode_message(message) {
        Ok(text) => text,
        Err(e) => {
            warn!(kind = %message.kind(), error = %e, "ws: encode failed; nothing sent");
            return true;
        }
    };
    match socket.send(WsMessage::text(text)).await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "ws: send failed");
            false
        }
    }
}

#[cfg(test)]
#[path = "frame_client_test.rs"]
mod frame_client_test;
