use std::time::Duration;

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt, DuplexStream, duplex},
    time::Instant,
};
use tracing_subscriber::EnvFilter;
use wust_frame::{
    CloseFrame, CloseReason, Config, Event, Message, ServerConn, WebSocketClient,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn pair() -> (ServerConn, WebSocketClient) {
    let (a, b) = duplex(64 * 1024);
    let server = ServerConn::from_stream(a, Config::default(), vec![], Some("echo".into()));
    let client = WebSocketClient::from_stream(b, Config::default(), vec![], Some("echo".into()));
    (server, client)
}

fn server_with_raw_peer() -> (ServerConn, DuplexStream) {
    let (a, b) = duplex(64 * 1024);
    (ServerConn::from_stream(a, Config::default(), vec![], None), b)
}

// a client frame with a fixed mask key
fn masked_frame(first: u8, payload: &[u8]) -> Vec<u8> {
    assert!(payload.len() <= 125);
    let key = [0x11, 0x22, 0x33, 0x44];
    #[allow(clippy::cast_possible_truncation)]
    let mut out = vec![first, 0x80 | payload.len() as u8];
    out.extend_from_slice(&key);
    out.extend(payload.iter().enumerate().map(|(i, b)| b ^ key[i % 4]));
    out
}

async fn read_to_end(peer: &mut DuplexStream) -> Vec<u8> {
    let mut out = Vec::new();
    peer.read_to_end(&mut out).await.unwrap();
    out
}

fn close_reason(event: Option<Event>) -> CloseReason {
    match event {
        Some(Event::Close(CloseFrame { reason, .. })) => reason,
        other => panic!("expected close event, got {other:?}"),
    }
}

#[tokio::test]
async fn messages_flow_both_ways() {
    init_tracing();
    let (mut server, mut client) = pair();
    assert_eq!(server.protocol(), Some("echo"));

    client.send_text("hello from wust-frame!");
    let Some(Event::Message(msg)) = server.recv().await else {
        panic!("expected message");
    };
    assert_eq!(msg.as_str(), Some("hello from wust-frame!"));

    server.send_binary(vec![1, 2, 3]);
    let Some(Event::Message(msg)) = client.recv().await else {
        panic!("expected message");
    };
    assert_eq!(msg, Message::Binary(vec![1, 2, 3]));
}

#[tokio::test]
async fn large_messages_are_fragmented_and_reassembled() {
    init_tracing();
    let (mut server, client) = pair();

    #[allow(clippy::cast_possible_truncation)]
    let payload: Vec<u8> = (0..200_000).map(|i| (i % 251) as u8).collect();
    client.send_binary(payload.clone());

    let Some(Event::Message(Message::Binary(got))) = server.recv().await else {
        panic!("expected binary message");
    };
    assert_eq!(got, payload);
}

#[tokio::test]
async fn close_handshake_emits_one_close_per_side() {
    init_tracing();
    let (mut server, mut client) = pair();

    client.close();
    assert_eq!(close_reason(server.recv().await), CloseReason::Normal);
    assert!(server.recv().await.is_none());

    assert_eq!(close_reason(client.recv().await), CloseReason::Normal);
    assert!(client.recv().await.is_none());
}

#[tokio::test]
async fn dropping_the_handle_closes_gracefully() {
    init_tracing();
    let (mut server, client) = pair();
    drop(client);
    assert_eq!(close_reason(server.recv().await), CloseReason::Normal);
}

#[tokio::test(start_paused = true)]
async fn close_times_out_when_peer_never_answers() {
    init_tracing();
    let (mut server, mut peer) = server_with_raw_peer();

    let start = Instant::now();
    server.close();
    assert_eq!(close_reason(server.recv().await), CloseReason::Normal);
    assert!(start.elapsed() >= Duration::from_millis(5000));

    // exactly one Close(1000), then EOF
    assert_eq!(read_to_end(&mut peer).await, [0x88, 0x02, 0x03, 0xE8]);
}

#[tokio::test]
async fn remote_close_is_echoed() {
    init_tracing();
    let (mut server, mut peer) = server_with_raw_peer();

    let mut payload = 1001u16.to_be_bytes().to_vec();
    payload.extend_from_slice(b"bye");
    peer.write_all(&masked_frame(0x88, &payload)).await.unwrap();

    assert_eq!(close_reason(server.recv().await), CloseReason::GoingAway);
    assert_eq!(read_to_end(&mut peer).await, [0x88, 0x02, 0x03, 0xE8]);
}

#[tokio::test]
async fn unregistered_close_code_is_echoed_and_reported() {
    init_tracing();
    let (mut server, mut peer) = server_with_raw_peer();

    peer.write_all(&masked_frame(0x88, &1012u16.to_be_bytes()))
        .await
        .unwrap();

    assert_eq!(close_reason(server.recv().await), CloseReason::Other(1012));
    assert_eq!(read_to_end(&mut peer).await, [0x88, 0x02, 0x03, 0xE8]);
}

#[tokio::test]
async fn ping_is_answered_with_empty_pong() {
    init_tracing();
    let (_server, mut peer) = server_with_raw_peer();

    peer.write_all(&masked_frame(0x89, b"ping")).await.unwrap();
    let mut pong = [0u8; 2];
    peer.read_exact(&mut pong).await.unwrap();
    assert_eq!(pong, [0x8A, 0x00]);
}

#[tokio::test]
async fn unmasked_client_frame_is_a_protocol_error() {
    init_tracing();
    let (mut server, mut peer) = server_with_raw_peer();

    peer.write_all(&[0x81, 0x01, b'x']).await.unwrap();

    assert_eq!(close_reason(server.recv().await), CloseReason::ProtocolError);
    let sent = read_to_end(&mut peer).await;
    assert_eq!(&sent[..4], &[0x88, sent[1], 0x03, 0xEA]);
    assert_eq!(sent.len(), 2 + sent[1] as usize);
}

#[tokio::test]
async fn interleaved_start_frames_are_rejected() {
    init_tracing();
    let (mut server, mut peer) = server_with_raw_peer();

    peer.write_all(&masked_frame(0x01, b"a")).await.unwrap();
    peer.write_all(&masked_frame(0x81, b"b")).await.unwrap();

    // no message, straight to the close
    assert_eq!(close_reason(server.recv().await), CloseReason::ProtocolError);
}

#[tokio::test]
async fn oversize_frame_header_is_rejected() {
    init_tracing();
    let (mut server, mut peer) = server_with_raw_peer();

    let mut header = vec![0x82, 0x80 | 127];
    header.extend_from_slice(&70_000u64.to_be_bytes());
    peer.write_all(&header).await.unwrap();

    assert_eq!(
        close_reason(server.recv().await),
        CloseReason::MessageTooLarge
    );
    let sent = read_to_end(&mut peer).await;
    assert_eq!(&sent[2..4], &[0x03, 0xEC]);
}

#[tokio::test]
async fn peer_disconnect_is_an_abnormal_close() {
    init_tracing();
    let (mut server, peer) = server_with_raw_peer();
    drop(peer);

    assert_eq!(close_reason(server.recv().await), CloseReason::Abnormal);
    assert!(server.recv().await.is_none());
}

#[tokio::test]
async fn sends_after_close_are_ignored() {
    init_tracing();
    let (mut server, mut peer) = server_with_raw_peer();

    server.close();
    server.send_text("too late");
    server.ping();

    let mut close = [0u8; 4];
    peer.read_exact(&mut close).await.unwrap();
    assert_eq!(close, [0x88, 0x02, 0x03, 0xE8]);

    // acknowledge; nothing else was written
    let ack = masked_frame(0x88, &1000u16.to_be_bytes());
    peer.write_all(&ack).await.unwrap();
    assert!(read_to_end(&mut peer).await.is_empty());
    assert_eq!(close_reason(server.recv().await), CloseReason::Normal);
}
