//! Shared utilities for the integration tests.

#![allow(dead_code)]

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::Request;
use axum::http::HeaderMap;
use axum::response::Response;
use bearer_proxy::relay::RelayOptions;
use bearer_proxy::{HttpServer, ProxyConfig, Shutdown};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

pub const SECRET: &str = "test-secret";

/// A client that never routes through an environment proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .build()
        .unwrap()
}

/// An address nothing is listening on.
pub fn closed_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

/// Start the proxy in-process on an ephemeral port.
pub async fn start_proxy(target: &str, relay: RelayOptions) -> (SocketAddr, Shutdown) {
    let config = ProxyConfig::new(target, SECRET).unwrap().shared();
    let server = HttpServer::with_client(config, client(), relay);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });

    (addr, shutdown)
}

/// Serve `app` on an ephemeral port.
pub async fn start_upstream(app: axum::Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// What an upstream saw of one request.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Upstream that records every request and answers `200 ok\n`.
pub async fn start_recording_upstream() -> (SocketAddr, Arc<Mutex<Vec<Recorded>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();

    let app = axum::Router::new().fallback(move |request: Request| {
        let log = log.clone();
        async move {
            let (parts, body) = request.into_parts();
            let body = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();
            log.lock().unwrap().push(Recorded {
                method: parts.method.to_string(),
                path_and_query: parts
                    .uri
                    .path_and_query()
                    .map(|pq| pq.as_str().to_string())
                    .unwrap_or_default(),
                headers: parts.headers,
                body,
            });
            "ok\n"
        }
    });

    (start_upstream(app).await, seen)
}

/// Upstream whose single response body is fed by the returned sender.
///
/// Each `send` becomes one body chunk; dropping the sender ends the body.
/// `send` fails once the upstream has dropped the body.
pub async fn start_streaming_upstream() -> (SocketAddr, mpsc::UnboundedSender<Bytes>) {
    let (tx, rx) = mpsc::unbounded_channel::<Bytes>();
    let rx = Arc::new(Mutex::new(Some(rx)));

    let app = axum::Router::new().fallback(move || {
        let rx = rx.lock().unwrap().take();
        async move {
            let Some(rx) = rx else {
                return Response::builder().status(409).body(Body::empty()).unwrap();
            };
            let chunks = futures_util::stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|chunk| (Ok::<_, io::Error>(chunk), rx))
            });
            Response::builder()
                .header("content-type", "text/event-stream")
                .body(Body::from_stream(chunks))
                .unwrap()
        }
    });

    (start_upstream(app).await, tx)
}

/// Start a raw TCP backend that writes `head` and `body` verbatim, then closes.
pub async fn start_raw_backend(head: &'static str, body: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        // Drain the request head so closing does not reset the connection.
                        let mut request = Vec::new();
                        let mut buf = [0u8; 1024];
                        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                            match socket.read(&mut buf).await {
                                Ok(0) | Err(_) => return,
                                Ok(n) => request.extend_from_slice(&buf[..n]),
                            }
                        }

                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            head,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Read from `response` until the buffered bytes end with a newline.
pub async fn next_line(response: &mut reqwest::Response) -> String {
    let mut line = Vec::new();
    let read = async {
        while !line.ends_with(b"\n") {
            match response.chunk().await.unwrap() {
                Some(chunk) => line.extend_from_slice(&chunk),
                None => break,
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(5), read)
        .await
        .expect("line was not flushed to the client");
    String::from_utf8(line).unwrap()
}
