/*
 * client_server.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * End-to-end tests: a real server on an ephemeral port driven by a real
 * client session over loopback TCP.
 */

use std::sync::Arc;
use std::time::{Duration, Instant};

use ragnatela::{
    ClientSession, ErrorKind, FormPart, IpProtocol, Request, RequestBuilder, Response,
    ResponseBuilder, Result, Server, View,
};

/// Echoes method, path, query pairs, and body so the client can assert on
/// what the server saw.
struct EchoView;

impl View for EchoView {
    fn handle(&self, request: Request) -> Result<Response> {
        let query: Vec<String> = request
            .url()
            .query()
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        let body = format!(
            "method={};path={};query={};accept={};data={}",
            request.method(),
            request.url().path(),
            query.join(","),
            request.header("Accept"),
            String::from_utf8_lossy(request.body().data()),
        );
        ResponseBuilder::new().ok().body(body).utf8().media_type("text/plain").build()
    }
}

/// Sleeps on the worker thread; used by the timeout and cancel tests.
struct SleepView;

impl View for SleepView {
    fn handle(&self, request: Request) -> Result<Response> {
        let seconds: u64 = request.args().first().and_then(|a| a.parse().ok()).unwrap_or(1);
        std::thread::sleep(Duration::from_secs(seconds));
        ResponseBuilder::new().ok().body("slept").build()
    }
}

/// Reports the parts of a multipart upload.
struct UploadView;

impl View for UploadView {
    fn handle(&self, request: Request) -> Result<Response> {
        let parts: Vec<String> = request
            .form_parts()
            .iter()
            .map(|p| {
                format!(
                    "{}:{}:{}",
                    p.name(),
                    p.file_name(),
                    String::from_utf8_lossy(p.data())
                )
            })
            .collect();
        ResponseBuilder::new().ok().body(parts.join("|")).build()
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

async fn start_server() -> (Arc<Server>, String) {
    init_tracing();
    let mut server = Server::new(IpProtocol::V4, 0);
    server.route("/echo", Arc::new(EchoView), &["GET", "POST", "PUT", "DELETE"]);
    server
        .route_regex("/sleep/(\\d+)", Arc::new(SleepView), &["GET"])
        .unwrap();
    server.route("/upload", Arc::new(UploadView), &["POST"]);

    let server = Arc::new(server);
    server.start(2).await.unwrap();
    let addr = server.local_addr().unwrap();
    (server, format!("http://127.0.0.1:{}", addr.port()))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn get_echoes_query_and_headers() {
    let (server, base) = start_server().await;
    let session = ClientSession::new();

    let request = RequestBuilder::new()
        .get(format!("{}/echo", base))
        .query("k1", "v1")
        .query("k2", "v2")
        .header("Accept", "application/json")
        .build()
        .unwrap();
    let response = session.send(request, false).await.unwrap();

    assert_eq!(response.status(), 200);
    let text = response.text();
    assert!(text.contains("query=k1=v1,k2=v2"), "{}", text);
    assert!(text.contains("accept=application/json"), "{}", text);

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn post_echoes_body_verbatim() {
    let (server, base) = start_server().await;
    let session = ClientSession::new();

    let body = "{'name'='Adam','age'=20}";
    let request = RequestBuilder::new()
        .post(format!("{}/echo", base))
        .body(body)
        .json()
        .build()
        .unwrap();
    let response = session.send(request, false).await.unwrap();

    assert_eq!(response.status(), 200);
    assert!(response.text().contains(&format!("data={}", body)));

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn keep_alive_reuses_one_connection() {
    let (server, base) = start_server().await;
    let session = ClientSession::new();

    for _ in 0..4 {
        let request = RequestBuilder::new()
            .get(format!("{}/echo", base))
            .build()
            .unwrap();
        let response = session.send(request, false).await.unwrap();
        assert_eq!(response.status(), 200);
    }

    assert_eq!(session.connect_count(), 1, "keep-alive should reuse the connection");
    assert_eq!(session.idle_connections(), 1);

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn connection_close_is_honored() {
    let (server, base) = start_server().await;
    let session = ClientSession::new();

    let request = RequestBuilder::new()
        .get(format!("{}/echo", base))
        .keep_alive(false)
        .build()
        .unwrap();
    let response = session.send(request, false).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.header("Connection"), "Close");
    assert_eq!(session.idle_connections(), 0);

    // The next request needs a fresh connection.
    let request = RequestBuilder::new()
        .get(format!("{}/echo", base))
        .build()
        .unwrap();
    session.send(request, false).await.unwrap();
    assert_eq!(session.connect_count(), 2);

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn read_timeout_reported_with_timeout_flag() {
    let (server, base) = start_server().await;
    let mut session = ClientSession::new();
    session.set_read_timeout(Duration::from_secs(1));

    let request = RequestBuilder::new()
        .get(format!("{}/sleep/3", base))
        .build()
        .unwrap();
    let started = Instant::now();
    let err = session.send(request, false).await.unwrap_err();
    let elapsed = started.elapsed();

    assert_eq!(err.kind(), ErrorKind::SocketRead);
    assert!(err.is_timeout());
    assert!(elapsed >= Duration::from_millis(900), "{:?}", elapsed);
    assert!(elapsed < Duration::from_secs(2), "{:?}", elapsed);
    assert_eq!(session.idle_connections(), 0);

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancel_aborts_the_request_in_flight() {
    let (server, base) = start_server().await;
    let session = Arc::new(ClientSession::new());

    let sender = {
        let session = session.clone();
        let url = format!("{}/sleep/3", base);
        tokio::spawn(async move {
            let request = RequestBuilder::new().get(url).build().unwrap();
            session.send(request, false).await
        })
    };

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(session.cancel());

    let started = Instant::now();
    let err = sender.await.unwrap().unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(err.kind(), ErrorKind::SocketRead);
    assert!(!err.is_timeout());
    assert_eq!(session.idle_connections(), 0);

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn regex_route_passes_captures_as_args() {
    let (server, base) = start_server().await;
    let session = ClientSession::new();

    // SleepView sleeps for its first positional arg.
    let request = RequestBuilder::new()
        .get(format!("{}/sleep/0", base))
        .build()
        .unwrap();
    let response = session.send(request, false).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text(), "slept");

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn multipart_upload_arrives_as_parts() {
    let (server, base) = start_server().await;
    let session = ClientSession::new();

    let request = RequestBuilder::new()
        .post(format!("{}/upload", base))
        .form_part(FormPart::new("note", b"{quick note}".to_vec(), "text/plain"))
        .form_part(FormPart::new("tag", b"v1".to_vec(), ""))
        .build()
        .unwrap();
    let response = session.send(request, false).await.unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.text(), "note::{quick note}|tag::v1");

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn streamed_response_can_be_moved_to_a_path() {
    let (server, base) = start_server().await;
    let session = ClientSession::new();

    let request = RequestBuilder::new()
        .post(format!("{}/echo", base))
        .body("stream me to disk")
        .build()
        .unwrap();
    let mut response = session.send(request, true).await.unwrap();
    assert_eq!(response.status(), 200);

    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("response.txt");
    let temp_path = {
        let file = response.body_mut().as_file_mut().expect("streamed body");
        let temp_path = file.path().to_path_buf();
        file.move_to(&target).unwrap();
        temp_path
    };

    assert!(!temp_path.exists(), "temp file should be gone after move");
    let saved = std::fs::read_to_string(&target).unwrap();
    assert!(saved.contains("data=stream me to disk"));

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn static_files_served_and_traversal_rejected() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let dir = tempfile::tempdir().unwrap();
    let docs = dir.path().join("docs");
    std::fs::create_dir(&docs).unwrap();
    std::fs::write(docs.join("hello.txt"), "static hello").unwrap();
    std::fs::write(dir.path().join("secret.txt"), "hidden").unwrap();

    let mut server = Server::new(IpProtocol::V4, 0);
    server.set_doc_root(&docs);
    let server = Arc::new(server);
    server.start(1).await.unwrap();
    let port = server.local_addr().unwrap().port();
    let base = format!("http://127.0.0.1:{}", port);

    let session = ClientSession::new();

    let ok = RequestBuilder::new()
        .get(format!("{}/hello.txt", base))
        .build()
        .unwrap();
    let response = session.send(ok, false).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.header("Content-Type"), "text/plain");
    assert_eq!(response.text(), "static hello");

    let missing = RequestBuilder::new()
        .get(format!("{}/nope.txt", base))
        .build()
        .unwrap();
    assert_eq!(session.send(missing, false).await.unwrap().status(), 404);

    // Traversal outside the doc root, sent raw so no client-side cleanup
    // interferes.
    let mut raw = tokio::net::TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    raw.write_all(b"GET /../secret.txt HTTP/1.1\r\nHost: x\r\nConnection: Close\r\n\r\n")
        .await
        .unwrap();
    let mut reply = Vec::new();
    raw.read_to_end(&mut reply).await.unwrap();
    let reply = String::from_utf8_lossy(&reply);
    assert!(reply.starts_with("HTTP/1.1 404 Not Found"), "{}", reply);
    assert!(!reply.contains("hidden"), "{}", reply);

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unrouted_request_gets_400_and_close() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let (server, base) = start_server().await;
    let port: u16 = base.rsplit(':').next().unwrap().parse().unwrap();

    let mut raw = tokio::net::TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    raw.write_all(b"GET /no/such/route HTTP/1.1\r\nHost: x\r\n\r\n")
        .await
        .unwrap();

    let mut reply = Vec::new();
    raw.read_to_end(&mut reply).await.unwrap();
    let reply = String::from_utf8_lossy(&reply);
    assert!(reply.starts_with("HTTP/1.1 400 Bad Request"), "{}", reply);
    assert!(reply.contains("Connection: Close"), "{}", reply);
    assert!(reply.contains("Content-Length: 0"), "{}", reply);

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn gzip_response_is_transparent_to_the_caller() {
    struct GzipView;

    impl View for GzipView {
        fn handle(&self, request: Request) -> Result<Response> {
            assert!(request.accept_encoding_gzip());
            ResponseBuilder::new()
                .ok()
                .body("compressible ".repeat(500))
                .gzip(true)
                .build()
        }
    }

    init_tracing();
    let mut server = Server::new(IpProtocol::V4, 0);
    server.route("/big", Arc::new(GzipView), &["GET"]);
    let server = Arc::new(server);
    server.start(1).await.unwrap();
    let base = format!("http://127.0.0.1:{}", server.local_addr().unwrap().port());

    let mut session = ClientSession::new();
    session.accept_gzip(true);

    let request = RequestBuilder::new()
        .get(format!("{}/big", base))
        .build()
        .unwrap();
    let response = session.send(request, false).await.unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.header("Content-Encoding"), "gzip");
    // The declared length is the compressed size; the body arrives decoded.
    assert!(response.content_length().unwrap() < 500 * 13);
    assert_eq!(response.text(), "compressible ".repeat(500));

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn gzip_request_body_is_decoded_by_the_server() {
    let (server, base) = start_server().await;
    let session = ClientSession::new();

    let text = "upload data ".repeat(300);
    let request = RequestBuilder::new()
        .post(format!("{}/echo", base))
        .body(text.clone())
        .gzip(true)
        .build()
        .unwrap();
    let response = session.send(request, false).await.unwrap();

    assert_eq!(response.status(), 200);
    assert!(response.text().contains(&format!("data={}", text)));

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn progress_callback_reports_both_directions() {
    use std::sync::atomic::{AtomicUsize, Ordering};

    let (server, base) = start_server().await;

    let reads = Arc::new(AtomicUsize::new(0));
    let writes = Arc::new(AtomicUsize::new(0));
    let mut session = ClientSession::new();
    {
        let reads = reads.clone();
        let writes = writes.clone();
        session.set_progress_callback(Arc::new(move |current, total, is_read| {
            if is_read {
                reads.fetch_max(current, Ordering::Relaxed);
            } else {
                writes.fetch_max(current, Ordering::Relaxed);
                assert_eq!(total, Some(9));
            }
        }));
    }

    let request = RequestBuilder::new()
        .post(format!("{}/echo", base))
        .body("nine char")
        .build()
        .unwrap();
    let response = session.send(request, false).await.unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(writes.load(Ordering::Relaxed), 9);
    assert!(reads.load(Ordering::Relaxed) > 0);

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn server_can_be_restarted() {
    let (server, _) = start_server().await;
    server.stop().await;
    assert!(!server.is_running());

    server.start(1).await.unwrap();
    assert!(server.is_running());
    let base = format!("http://127.0.0.1:{}", server.local_addr().unwrap().port());

    let session = ClientSession::new();
    let request = RequestBuilder::new()
        .get(format!("{}/echo", base))
        .build()
        .unwrap();
    assert_eq!(session.send(request, false).await.unwrap().status(), 200);

    server.stop().await;
}
