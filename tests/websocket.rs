/*
 * websocket.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * WebSocket client tests against a loopback echo server assembled from the
 * library's own handshake and frame codec.
 */

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use ragnatela::ws::frame::{opcodes, FrameParser, WsFrame};
use ragnatela::ws::handshake;
use ragnatela::ws::WsClient;
use ragnatela::RequestParser;

struct EchoServerOptions {
    /// Subprotocol to select in the 101 response.
    select_protocol: Option<&'static str>,
    /// Send a ping with this payload right after the handshake.
    ping: Option<&'static [u8]>,
    /// Initiate the close handshake from the server side.
    close_first: bool,
}

impl Default for EchoServerOptions {
    fn default() -> Self {
        Self {
            select_protocol: None,
            ping: None,
            close_first: false,
        }
    }
}

/// Accept one connection, perform the server side of the handshake, then
/// echo data frames (unmasked, as a server must send them).
async fn echo_server(listener: TcpListener, options: EchoServerOptions) {
    let (mut stream, _) = listener.accept().await.unwrap();

    let request = read_upgrade_request(&mut stream).await;
    let key = request.header("Sec-WebSocket-Key").to_string();
    assert_eq!(request.header("Upgrade"), "websocket");
    assert_eq!(request.header("Sec-WebSocket-Version"), "13");

    let mut head = format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {}\r\n",
        handshake::accept_for_key(&key)
    );
    if let Some(protocol) = options.select_protocol {
        head.push_str(&format!("Sec-WebSocket-Protocol: {}\r\n", protocol));
    }
    head.push_str("\r\n");
    stream.write_all(head.as_bytes()).await.unwrap();

    if let Some(payload) = options.ping {
        write_frame(&mut stream, WsFrame::ping(payload.to_vec())).await;
    }
    if options.close_first {
        write_frame(&mut stream, WsFrame::close(Some(1000), "bye")).await;
    }

    let mut parser = FrameParser::new(false);
    let mut pending = BytesMut::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = match stream.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        pending.extend_from_slice(&buf[..n]);

        while let Some(frame) = parser.receive(&mut pending).unwrap() {
            // Client-to-server frames must be masked (RFC 6455 §5.1).
            assert!(frame.masked(), "client frame was not masked");

            match frame.opcode {
                opcodes::TEXT | opcodes::BINARY => {
                    write_frame(&mut stream, WsFrame::new(frame.opcode, frame.payload)).await;
                }
                opcodes::CLOSE => {
                    if !options.close_first {
                        let echo = WsFrame::close(frame.close_status(), "");
                        write_frame(&mut stream, echo).await;
                    }
                    let _ = stream.shutdown().await;
                    return;
                }
                opcodes::PONG => {
                    // Recorded implicitly: reaching here means it parsed.
                    assert_eq!(frame.payload, options.ping.unwrap_or_default());
                }
                _ => {}
            }
        }
    }
}

async fn read_upgrade_request(stream: &mut TcpStream) -> ragnatela::Request {
    let mut parser = RequestParser::new(None);
    parser.init();
    let mut buf = [0u8; 4096];
    loop {
        let n = stream.read(&mut buf).await.unwrap();
        assert!(n > 0, "client closed during handshake");
        parser.parse(&buf[..n]).unwrap();
        if parser.finished() {
            return parser.take_request();
        }
    }
}

async fn write_frame(stream: &mut TcpStream, frame: WsFrame) {
    let mut wire = BytesMut::new();
    frame.encode(&mut wire).unwrap();
    stream.write_all(&wire).await.unwrap();
}

async fn start_echo(options: EchoServerOptions) -> (tokio::task::JoinHandle<()>, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://127.0.0.1:{}/chat", listener.local_addr().unwrap().port());
    let handle = tokio::spawn(echo_server(listener, options));
    (handle, url)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn echo_roundtrip_and_close_handshake() {
    let (server, url) = start_echo(EchoServerOptions::default()).await;

    let mut client = WsClient::connect(&url).await.unwrap();

    client.send_text("Hello").await.unwrap();
    let frame = client.receive().await.unwrap().expect("echo frame");
    assert!(frame.fin);
    assert_eq!(frame.opcode, opcodes::TEXT);
    assert!(!frame.masked(), "server frames must be unmasked");
    assert_eq!(frame.payload, b"Hello");

    client.send_close(Some(1000), "").await.unwrap();
    assert!(client.close_sent());
    assert!(!client.is_closed(), "close handshake not complete yet");

    let frame = client.receive().await.unwrap().expect("close echo");
    assert_eq!(frame.opcode, opcodes::CLOSE);
    assert_eq!(frame.close_status(), Some(1000));
    assert!(client.close_received());
    assert!(client.is_closed(), "closed after both close frames");

    assert!(client.receive().await.unwrap().is_none());

    server.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn binary_payload_survives_masking() {
    let (server, url) = start_echo(EchoServerOptions::default()).await;

    let mut client = WsClient::connect(&url).await.unwrap();
    let payload: Vec<u8> = (0u16..300).map(|i| (i % 251) as u8).collect();
    client.send_binary(payload.clone()).await.unwrap();

    let frame = client.receive().await.unwrap().expect("echo frame");
    assert_eq!(frame.opcode, opcodes::BINARY);
    assert_eq!(frame.payload, payload);

    client.send_close(Some(1000), "").await.unwrap();
    let _ = client.receive().await;
    server.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn ping_gets_an_automatic_pong() {
    let (server, url) = start_echo(EchoServerOptions {
        ping: Some(b"hi there"),
        ..EchoServerOptions::default()
    })
    .await;

    let mut client = WsClient::connect(&url).await.unwrap();

    // The ping is delivered to the caller and ponged automatically; the
    // server asserts on the pong payload.
    let frame = client.receive().await.unwrap().expect("ping frame");
    assert_eq!(frame.opcode, opcodes::PING);
    assert_eq!(frame.payload, b"hi there");

    client.send_close(Some(1000), "").await.unwrap();
    let _ = client.receive().await;
    server.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn server_initiated_close_is_answered() {
    let (server, url) = start_echo(EchoServerOptions {
        close_first: true,
        ..EchoServerOptions::default()
    })
    .await;

    let mut client = WsClient::connect(&url).await.unwrap();

    let frame = client.receive().await.unwrap().expect("server close");
    assert_eq!(frame.opcode, opcodes::CLOSE);
    assert_eq!(frame.close_status(), Some(1000));
    assert!(client.close_sent(), "close echoed automatically");
    assert!(client.is_closed());

    server.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn subprotocol_selection_verified() {
    let (server, url) = start_echo(EchoServerOptions {
        select_protocol: Some("echo"),
        ..EchoServerOptions::default()
    })
    .await;
    let mut client = WsClient::connect_with(&url, &["echo", "chat"], Default::default())
        .await
        .unwrap();
    client.send_close(Some(1000), "").await.unwrap();
    let _ = client.receive().await;
    server.await.unwrap();

    // A selection the client never asked for fails the handshake.
    let (server, url) = start_echo(EchoServerOptions {
        select_protocol: Some("bogus"),
        ..EchoServerOptions::default()
    })
    .await;
    let err = WsClient::connect_with(&url, &["echo"], Default::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ragnatela::ErrorKind::Handshake);
    server.abort();
}
