use std::time::Duration;

use frames::{Color, Message as Frame, Point, Stroke, encode_message};
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::*;
use crate::config::RelayConfig;
use crate::state::AppState;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const CHAT_HI: &str = r#"{"type":"chat:message","payload":{"userId":"u1","username":"A","message":"hi"}}"#;

fn stroke(id: &str) -> Stroke {
    Stroke {
        id: id.to_owned(),
        points: vec![Point::new(0.0, 0.0), Point::new(5.0, 5.0)],
        color: Color::rgba(0.2, 0.4, 0.6, 1.0),
        thickness: 3.0,
        user_id: "u1".to_owned(),
    }
}

fn encode(message: &Frame) -> String {
    encode_message(message).expect("encode")
}

// =============================================================================
// In-process relay
// =============================================================================

async fn spawn_relay(config: RelayConfig) -> (AppState, String) {
    let state = AppState::new(config);
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let app = crate::routes::app(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    (state, format!("ws://{addr}/ws"))
}

async fn connect(url: &str) -> Client {
    let (client, _) = connect_async(url).await.expect("connect");
    client
}

/// Connect and consume the two snapshot frames.
async fn connect_synced(url: &str) -> (Client, Frame, Frame) {
    let mut client = connect(url).await;
    let board = next_frame(&mut client).await;
    let chat = next_frame(&mut client).await;
    assert!(matches!(board, Frame::BoardSync(_)), "first frame should be board:sync, got {board:?}");
    assert!(matches!(chat, Frame::ChatSync(_)), "second frame should be chat:sync, got {chat:?}");
    (client, board, chat)
}

async fn next_text(client: &mut Client) -> String {
    loop {
        let msg = timeout(Duration::from_millis(1000), client.next())
            .await
            .expect("frame receive timed out")
            .expect("stream ended")
            .expect("websocket error");
        if let WsMessage::Text(text) = msg {
            return text.as_str().to_owned();
        }
    }
}

async fn next_frame(client: &mut Client) -> Frame {
    frames::decode_message(&next_text(client).await).expect("relay frames decode")
}

async fn assert_no_text(client: &mut Client) {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(150);
    while let Ok(Some(Ok(msg))) = tokio::time::timeout_at(deadline, client.next()).await {
        assert!(!matches!(msg, WsMessage::Text(_)), "unexpected text frame: {msg:?}");
    }
}

async fn send_text(client: &mut Client, text: &str) {
    client.send(WsMessage::text(text.to_owned())).await.expect("send");
}

// =============================================================================
// Inbound processing (no socket)
// =============================================================================

async fn registered(state: &AppState) -> (Uuid, mpsc::Receiver<Outbound>) {
    let mut relay = state.relay.write().await;
    services::session::register(&mut relay, 16).expect("register")
}

#[tokio::test]
async fn valid_frame_is_applied_and_relayed_verbatim() {
    let state = AppState::new(RelayConfig::default());
    let (session_id, mut rx) = registered(&state).await;
    rx.recv().await.expect("board:sync");
    rx.recv().await.expect("chat:sync");

    // Field order and spacing differ from what the encoder would produce.
    let text = r#"{ "payload": {"stroke": {"userId":"u1","id":"a","thickness":1,"color":{"r":0,"g":0,"b":0,"a":1},"points":[]}}, "type": "stroke:add" }"#;
    let outcome = process_inbound_text(&state, session_id, text).await;

    assert_eq!(outcome, Outcome::Relayed { kind: MessageKind::StrokeAdd, fanout: Fanout { delivered: 1, dropped: 0 } });
    assert_eq!(&*rx.recv().await.expect("echo"), text);
    assert_eq!(state.relay.read().await.board().len(), 1);
}

#[tokio::test]
async fn invalid_frames_are_dropped_without_broadcast() {
    let state = AppState::new(RelayConfig::default());
    let (session_id, mut rx) = registered(&state).await;
    rx.recv().await.expect("board:sync");
    rx.recv().await.expect("chat:sync");

    let cases = [
        ("{not json", DropReason::Malformed),
        (r#"{"type":"cursor:move","payload":{}}"#, DropReason::Malformed),
        (r#"{"type":"stroke:remove","payload":{"strokeId":""}}"#, DropReason::Malformed),
        (r#"{"type":"board:sync","payload":{"strokes":[],"users":[]}}"#, DropReason::RelayOnly),
        (r#"{"type":"chat:sync","payload":{"chatHistory":[]}}"#, DropReason::RelayOnly),
    ];
    for (text, reason) in cases {
        assert_eq!(process_inbound_text(&state, session_id, text).await, Outcome::Dropped(reason), "{text}");
    }
    assert!(rx.try_recv().is_err(), "dropped frames must not be broadcast");
}

#[tokio::test]
async fn duplicate_stroke_add_is_rejected() {
    let state = AppState::new(RelayConfig::default());
    let (session_id, mut rx) = registered(&state).await;
    let text = encode(&Frame::stroke_add(stroke("a")));

    assert!(matches!(process_inbound_text(&state, session_id, &text).await, Outcome::Relayed { .. }));
    assert_eq!(
        process_inbound_text(&state, session_id, &text).await,
        Outcome::Dropped(DropReason::Rejected)
    );

    // board:sync, chat:sync, then exactly one echo.
    for _ in 0..3 {
        rx.recv().await.expect("frame");
    }
    assert!(rx.try_recv().is_err());
    assert_eq!(state.relay.read().await.board().len(), 1);
}

#[tokio::test]
async fn unknown_stroke_remove_is_still_relayed() {
    let state = AppState::new(RelayConfig::default());
    let (session_id, _rx) = registered(&state).await;
    let outcome = process_inbound_text(&state, session_id, &encode(&Frame::stroke_remove("ghost"))).await;
    assert!(matches!(outcome, Outcome::Relayed { kind: MessageKind::StrokeRemove, .. }));
}

// =============================================================================
// End-to-end over real sockets
// =============================================================================

#[tokio::test]
async fn chat_echo_reaches_sender_exactly_once() {
    let (_state, url) = spawn_relay(RelayConfig::default()).await;
    let (mut alice, _, _) = connect_synced(&url).await;

    send_text(&mut alice, CHAT_HI).await;

    assert_eq!(next_text(&mut alice).await, CHAT_HI);
    assert_no_text(&mut alice).await;
}

#[tokio::test]
async fn malformed_frame_keeps_connection_open_and_is_never_broadcast() {
    let (_state, url) = spawn_relay(RelayConfig::default()).await;
    let (mut alice, _, _) = connect_synced(&url).await;
    let (mut bob, _, _) = connect_synced(&url).await;

    send_text(&mut alice, "{not json").await;
    send_text(&mut alice, CHAT_HI).await;

    assert_eq!(next_text(&mut alice).await, CHAT_HI);
    assert_eq!(next_text(&mut bob).await, CHAT_HI);
}

#[tokio::test]
async fn late_joiner_snapshot_matches_relay_state() {
    let (state, url) = spawn_relay(RelayConfig::default()).await;
    let (mut alice, _, _) = connect_synced(&url).await;

    for message in [
        Frame::stroke_add(stroke("a")),
        Frame::stroke_add(stroke("b")),
        Frame::stroke_move("b", 1.0, 2.0),
        Frame::stroke_remove("a"),
        Frame::chat("u1", "A", "one"),
        Frame::chat("u1", "A", "two"),
    ] {
        send_text(&mut alice, &encode(&message)).await;
        next_frame(&mut alice).await;
    }

    let (_bob, board, chat) = connect_synced(&url).await;
    let relay = state.relay.read().await;

    let Frame::BoardSync(board) = board else { panic!("board:sync expected") };
    assert_eq!(board.strokes, relay.board().strokes().to_vec());
    let ids: Vec<_> = board.strokes.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["b"]);
    assert_eq!(board.strokes[0].points[0], Point::new(1.0, 2.0));
    assert!(board.users.is_empty());

    let Frame::ChatSync(chat) = chat else { panic!("chat:sync expected") };
    let lines: Vec<_> = chat.chat_history.iter().map(|e| e.message.as_str()).collect();
    assert_eq!(lines, vec!["one", "two"]);
}

#[tokio::test]
async fn add_then_remove_leaves_late_joiner_empty() {
    let (state, url) = spawn_relay(RelayConfig::default()).await;
    let (mut alice, _, _) = connect_synced(&url).await;

    send_text(&mut alice, r#"{"type":"stroke:add","payload":{"stroke":{"id":"a","points":[{"x":0,"y":0}],"color":{"r":0,"g":0,"b":0,"a":1},"thickness":2,"userId":"u1"}}}"#).await;
    next_frame(&mut alice).await;
    send_text(&mut alice, r#"{"type":"stroke:remove","payload":{"strokeId":"a"}}"#).await;
    next_frame(&mut alice).await;

    assert!(state.relay.read().await.board().is_empty());
    let (_bob, board, _) = connect_synced(&url).await;
    assert_eq!(board, Frame::BoardSync(frames::BoardSync::default()));
}

#[tokio::test]
async fn overflowing_move_is_not_relayed_and_late_joiners_still_sync() {
    let (state, url) = spawn_relay(RelayConfig::default()).await;
    let (mut alice, _, _) = connect_synced(&url).await;

    let mut far = stroke("far");
    far.points = vec![Point::new(1e308, 0.0)];
    send_text(&mut alice, &encode(&Frame::stroke_add(far.clone()))).await;
    next_frame(&mut alice).await;
    send_text(&mut alice, &encode(&Frame::stroke_move("far", 1e308, 0.0))).await;
    assert_no_text(&mut alice).await;

    assert_eq!(state.relay.read().await.board().strokes(), &[far.clone()]);
    let (_bob, board, _) = connect_synced(&url).await;
    assert_eq!(board, Frame::BoardSync(frames::BoardSync { strokes: vec![far], users: Vec::new() }));
}

#[tokio::test]
async fn concurrent_adds_arrive_in_one_order_everywhere() {
    const PER_CLIENT: usize = 10;
    let (state, url) = spawn_relay(RelayConfig::default()).await;
    let (mut alice, _, _) = connect_synced(&url).await;
    let (mut bob, _, _) = connect_synced(&url).await;

    for i in 0..PER_CLIENT {
        send_text(&mut alice, &encode(&Frame::stroke_add(stroke(&format!("a{i}"))))).await;
        send_text(&mut bob, &encode(&Frame::stroke_add(stroke(&format!("b{i}"))))).await;
    }

    let mut seen_by_alice = Vec::new();
    let mut seen_by_bob = Vec::new();
    for _ in 0..PER_CLIENT * 2 {
        if let Frame::StrokeAdd(add) = next_frame(&mut alice).await {
            seen_by_alice.push(add.stroke.id);
        }
        if let Frame::StrokeAdd(add) = next_frame(&mut bob).await {
            seen_by_bob.push(add.stroke.id);
        }
    }

    let relay = state.relay.read().await;
    let relay_order: Vec<_> = relay.board().strokes().iter().map(|s| s.id.clone()).collect();
    assert_eq!(relay_order.len(), PER_CLIENT * 2);
    assert_eq!(seen_by_alice, relay_order);
    assert_eq!(seen_by_bob, relay_order);
}

#[tokio::test]
async fn silent_session_is_evicted_by_heartbeat() {
    let config = RelayConfig {
        heartbeat_interval: Duration::from_millis(100),
        heartbeat_timeout: Duration::from_millis(250),
        ..RelayConfig::default()
    };
    let (state, url) = spawn_relay(config).await;

    // Never polled, so no pong is ever sent back.
    let _silent = connect(&url).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(state.relay.read().await.session_count(), 1);

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(state.relay.read().await.session_count(), 0);
}

#[tokio::test]
async fn teardown_closes_open_connections() {
    let (state, url) = spawn_relay(RelayConfig::default()).await;
    let (mut alice, _, _) = connect_synced(&url).await;

    state.teardown().await;

    let closed = timeout(Duration::from_millis(1000), async {
        loop {
            match alice.next().await {
                None | Some(Err(_) | Ok(WsMessage::Close(_))) => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "connection should close after teardown");
}
