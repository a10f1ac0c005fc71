
use std::time::Duration;

use clap::{Parser, Subcommand};
use client::{ClientConfig, ClientHandle, Identity};
use frames::{ChatEntry, Color, Message, Point, Stroke};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use uuid::Uuid;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("invalid relay URL: {0}")]
    InvalidUrl(String),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("relay returned HTTP {0}")]
    HttpStatus(u16),
    #[error("websocket error: {0}")]
    Ws(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("websocket closed")]
    WsClosed,
    #[error("message decode failed: {0}")]
    Decode(#[from] frames::CodecError),
    #[error("message would be rejected: {0}")]
    Invalid(#[from] frames::ValidationError),
    #[error("timed out waiting for the relay")]
    Timeout,
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("sync client: {0}")]
    Client(#[from] client::ClientError),
    #[error("sync client task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("signal handler: {0}")]
    Signal(std::io::Error),
}

impl From<tokio_tungstenite::tungstenite::Error> for CliError {
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Ws(Box::new(error))
    }
}

#[derive(Parser, Debug)]
#[command(name = "sketchboard", about = "Shared sketch board relay CLI")]
struct Cli {
    #[arg(long, env = "SKETCHBOARD_URL", default_value = "ws://127.0.0.1:3000/ws")]
    url: String,

    /// Defaults to a random UUID.
    #[arg(long, env = "SKETCHBOARD_USER_ID")]
    user_id: Option<String>,

    #[arg(long, env = "SKETCHBOARD_USERNAME", default_value = "anonymous")]
    username: String,

    #[arg(long, default_value_t = 5)]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone)]
struct CliContext {
    url: String,
    user_id: String,
    username: String,
    timeout: Duration,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check `/healthz`.
    Ping,
    /// Print `/api/stats`.
    Stats,
    /// Print the board and chat snapshot a joining client receives.
    Snapshot,
    /// Follow the board live until Ctrl-C.
    Watch,
    /// Announce presence.
    Join,
    /// Send a chat line.
    Chat { text: String },
    /// Draw a stroke through the given `x,y` points.
    Draw {
        #[arg(required = true, value_parser = parse_point)]
        points: Vec<Point>,
        /// `r,g,b[,a]`, each channel in [0, 1].
        #[arg(long, value_parser = parse_color, default_value = "0,0,0,1")]
        color: Color,
        #[arg(long, default_value_t = 2.0)]
        thickness: f64,
    },
    /// Remove a stroke by id.
    Erase { stroke_id: String },
    /// Translate a stroke by id.
    Move {
        stroke_id: String,
        #[arg(long, allow_hyphen_values = true)]
        dx: f64,
        #[arg(long, allow_hyphen_values = true)]
        dy: f64,
    },
    /// Remove every stroke.
    Clear,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let ctx = CliContext {
        url: cli.url,
        user_id: cli.user_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
        username: cli.username,
        timeout: Duration::from_secs(cli.timeout_secs.max(1)),
    };

    match cli.command {
        Command::Ping => run_ping(&ctx).await,
        Command::Stats => run_stats(&ctx).await,
        Command::Snapshot => run_snapshot(&ctx).await,
        Command::Watch => run_watch(&ctx).await,
        Command::Join => send_and_confirm(&ctx, Message::user_join(&ctx.user_id, &ctx.username)).await,
        Command::Chat { text } => send_and_confirm(&ctx, Message::chat(&ctx.user_id, &ctx.username, text)).await,
        Command::Draw { points, color, thickness } => run_draw(&ctx, points, color, thickness).await,
        Command::Erase { stroke_id } => send_and_confirm(&ctx, Message::stroke_remove(stroke_id)).await,
        Command::Move { stroke_id, dx, dy } => send_and_confirm(&ctx, Message::stroke_move(stroke_id, dx, dy)).await,
        Command::Clear => send_and_confirm(&ctx, Message::board_clear(&ctx.user_id)).await,
    }
}

// =============================================================================
// HTTP
// =============================================================================

async fn run_ping(ctx: &CliContext) -> Result<(), CliError> {
    http_get(ctx, "/healthz").await?;
    println!("ok");
    Ok(())
}

async fn run_stats(ctx: &CliContext) -> Result<(), CliError> {
    let body = http_get(ctx, "/api/stats").await?;
    let value = serde_json::from_str::<Value>(&body)?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

async fn http_get(ctx: &CliContext, path: &str) -> Result<String, CliError> {
    let url = format!("{}{path}", http_base(&ctx.url)?);
    let response = reqwest::Client::builder().timeout(ctx.timeout).build()?.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(CliError::HttpStatus(status.as_u16()));
    }
    Ok(response.text().await?)
}

/// `ws://host:port/ws` → `http://host:port`.
fn http_base(ws_url: &str) -> Result<String, CliError> {
    let (scheme, rest) = if let Some(rest) = ws_url.strip_prefix("ws://") {
        ("http", rest)
    } else if let Some(rest) = ws_url.strip_prefix("wss://") {
        ("https", rest)
    } else {
        return Err(CliError::InvalidUrl(ws_url.to_owned()));
    };
    let host = rest.split('/').next().unwrap_or_default();
    if host.is_empty() {
        return Err(CliError::InvalidUrl(ws_url.to_owned()));
    }
    Ok(format!("{scheme}://{host}"))
}

// =============================================================================
// ONE-SHOT WEBSOCKET COMMANDS
// =============================================================================

async fn run_snapshot(ctx: &CliContext) -> Result<(), CliError> {
    let mut stream = connect(ctx).await?;
    let (board, chat) = wait_for_snapshot(&mut stream, ctx.timeout).await?;
    stream.close(None).await?;

    let rendered = serde_json::json!({
        "strokes": board.strokes,
        "users": board.users,
        "chatHistory": chat.chat_history,
    });
    println!("{}", serde_json::to_string_pretty(&rendered)?);
    Ok(())
}

async fn run_draw(ctx: &CliContext, points: Vec<Point>, color: Color, thickness: f64) -> Result<(), CliError> {
    let stroke = Stroke { id: Uuid::new_v4().to_string(), points, color, thickness, user_id: ctx.user_id.clone() };
    stroke.validate()?;
    let stroke_id = stroke.id.clone();
    send_and_confirm(ctx, Message::stroke_add(stroke)).await?;
    println!("{stroke_id}");
    Ok(())
}

/// Connect, wait for the snapshot, send `message`, and wait for the relay to
/// echo it back.
async fn send_and_confirm(ctx: &CliContext, message: Message) -> Result<(), CliError> {
    message.validate()?;
    let mut stream = connect(ctx).await?;
    wait_for_snapshot(&mut stream, ctx.timeout).await?;

    let text = frames::encode_message(&message)?;
    stream.send(WsMessage::Text(text.into())).await?;
    wait_for_echo(&mut stream, &message, ctx.timeout).await?;
    stream.close(None).await?;

    eprintln!("relayed {}", message.kind());
    Ok(())
}

async fn connect(ctx: &CliContext) -> Result<Socket, CliError> {
    let (stream, _) = tokio::time::timeout(ctx.timeout, connect_async(ctx.url.as_str()))
        .await
        .map_err(|_| CliError::Timeout)??;
    Ok(stream)
}

async fn wait_for_snapshot(
    stream: &mut Socket,
    timeout: Duration,
) -> Result<(frames::BoardSync, frames::ChatSync), CliError> {
    let mut board = None;
    loop {
        match recv_next(stream, timeout).await? {
            Message::BoardSync(sync) => board = Some(sync),
            Message::ChatSync(chat) => {
                if let Some(board) = board.take() {
                    return Ok((board, chat));
                }
            }
            _ => {}
        }
    }
}

async fn wait_for_echo(stream: &mut Socket, sent: &Message, timeout: Duration) -> Result<(), CliError> {
    loop {
        if recv_next(stream, timeout).await? == *sent {
            return Ok(());
        }
    }
}

async fn recv_next(stream: &mut Socket, timeout: Duration) -> Result<Message, CliError> {
    let fut = async {
        loop {
            let Some(frame) = stream.next().await else {
                return Err(CliError::WsClosed);
            };
            match frame? {
                WsMessage::Text(text) => return frames::decode_message(text.as_str()).map_err(CliError::from),
                WsMessage::Close(_) => return Err(CliError::WsClosed),
                _ => {}
            }
        }
    };

    tokio::time::timeout(timeout, fut).await.map_err(|_| CliError::Timeout)?
}

// =============================================================================
// WATCH
// =============================================================================

async fn run_watch(ctx: &CliContext) -> Result<(), CliError> {
    let config = ClientConfig::new(ctx.url.clone(), Identity::new(ctx.user_id.clone(), ctx.username.clone()));
    let (handle, task) = ClientHandle::spawn(config);

    handle.wait_for(ctx.timeout, |view| view.status.is_synced()).await?;
    handle.announce().await?;

    let mut views = handle.subscribe();
    let mut printed: Vec<ChatEntry> = Vec::new();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let view = views.borrow_and_update().clone();
        for entry in unseen_chat(&printed, &view.chat) {
            println!("<{}> {}", entry.username, entry.message);
        }
        printed.clone_from(&view.chat);
        eprintln!(
            "{:?}: {} strokes, {} users online",
            view.status,
            view.strokes.len(),
            view.users.len()
        );

        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            signal = &mut ctrl_c => {
                signal.map_err(CliError::Signal)?;
                break;
            }
        }
    }

    if handle.shutdown().await.is_err() {
        tracing::debug!("sync client already stopped");
    }
    task.await?;
    Ok(())
}

/// Lines of `chat` past the longest prefix it shares with what was already
/// printed. A reconnect replaces the whole transcript with `chat:sync`, so
/// the length alone cannot tell which lines are new.
fn unseen_chat<'a>(printed: &[ChatEntry], chat: &'a [ChatEntry]) -> &'a [ChatEntry] {
    let shared = printed.iter().zip(chat).take_while(|(seen, line)| seen == line).count();
    &chat[shared..]
}

// =============================================================================
// ARGUMENT PARSERS
// =============================================================================

fn parse_point(raw: &str) -> Result<Point, String> {
    let (x, y) = raw.split_once(',').ok_or_else(|| format!("expected x,y, got `{raw}`"))?;
    let x = x.trim().parse::<f64>().map_err(|e| format!("x in `{raw}`: {e}"))?;
    let y = y.trim().parse::<f64>().map_err(|e| format!("y in `{raw}`: {e}"))?;
    Ok(Point::new(x, y))
}

fn parse_color(raw: &str) -> Result<Color, String> {
    let channels = raw
        .split(',')
        .map(|c| c.trim().parse::<f64>().map_err(|e| format!("channel `{c}`: {e}")))
        .collect::<Result<Vec<_>, _>>()?;
    let color = match channels.as_slice() {
        [r, g, b] => Color::rgba(*r, *g, *b, 1.0),
        [r, g, b, a] => Color::rgba(*r, *g, *b, *a),
        _ => return Err(format!("expected r,g,b or r,g,b,a, got `{raw}`")),
    };
    color.validate().map_err(|e| e.to_string())?;
    Ok(color)
}
