//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with a single catch-all handler
//! - Own the upstream HTTP client (shared, pooled by reqwest)
//! - Wrap every request in a span carrying a generated request id
//! - Serve until the shutdown signal fires

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::config::{ProxyConfig, Settings};
use crate::http::request::build_outbound;
use crate::lifecycle::shutdown;
use crate::observability::metrics;
use crate::relay::{self, ChannelSink, RelayOptions};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ProxyConfig>,
    pub client: reqwest::Client,
    pub relay: RelayOptions,
}

/// Knobs that shape the upstream client and the body relay.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServerOptions {
    /// Bound on connection establishment only. `None` waits indefinitely.
    pub connect_timeout: Option<Duration>,
    /// Grace period for open streams once shutdown starts. `None` uses
    /// [`DEFAULT_DRAIN_TIMEOUT`].
    pub drain_timeout: Option<Duration>,
    pub relay: RelayOptions,
}

impl ServerOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            connect_timeout: settings.upstream.connect_timeout_secs.map(Duration::from_secs),
            drain_timeout: Some(Duration::from_secs(settings.listener.drain_timeout_secs)),
            relay: RelayOptions {
                max_line_bytes: settings.relay.max_line_bytes,
            },
        }
    }
}

/// How long open streams may keep running after shutdown is requested.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP server for the bearer proxy.
pub struct HttpServer {
    router: Router,
    config: Arc<ProxyConfig>,
    drain_timeout: Duration,
}

impl HttpServer {
    /// Create a server with its own upstream client.
    pub fn new(config: Arc<ProxyConfig>, options: ServerOptions) -> Result<Self, reqwest::Error> {
        let client = upstream_client(&options).build()?;
        let server = Self::with_client(config, client, options.relay);
        Ok(match options.drain_timeout {
            Some(timeout) => server.with_drain_timeout(timeout),
            None => server,
        })
    }

    /// Create a server around an existing client.
    pub fn with_client(config: Arc<ProxyConfig>, client: reqwest::Client, relay: RelayOptions) -> Self {
        let state = AppState {
            config: config.clone(),
            client,
            relay,
        };

        Self {
            router: Self::build_router(state),
            config,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }

    /// Replace the grace period given to open streams on shutdown.
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let client = request
                    .extensions()
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.to_string())
                    .unwrap_or_default();
                tracing::info_span!(
                    "request",
                    request_id = %Uuid::new_v4(),
                    method = %request.method(),
                    path = %request.uri().path(),
                    client = %client,
                )
            }))
    }

    /// The router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server on `listener` until `stop` fires.
    ///
    /// New connections are refused as soon as `stop` fires. Open streams get
    /// the drain timeout to finish; after that the server returns anyway.
    pub async fn run(
        self,
        listener: TcpListener,
        stop: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.target,
            "HTTP server starting"
        );

        let drain = stop.resubscribe();
        let drain_timeout = self.drain_timeout;
        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        let serve = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown::wait(stop))
            .into_future();

        tokio::select! {
            result = serve => result?,
            _ = async {
                shutdown::wait(drain).await;
                tokio::time::sleep(drain_timeout).await;
            } => {
                tracing::warn!(
                    drain_timeout_secs = drain_timeout.as_secs_f64(),
                    "Drain timeout elapsed, closing open streams"
                );
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Client settings for talking to the upstream.
///
/// No request or read timeout is set, and redirects are relayed to the
/// client instead of being followed.
pub fn upstream_client(options: &ServerOptions) -> reqwest::ClientBuilder {
    let builder = reqwest::Client::builder().redirect(reqwest::redirect::Policy::none());
    match options.connect_timeout {
        Some(timeout) => builder.connect_timeout(timeout),
        None => builder,
    }
}

/// Catch-all handler: every method and path goes upstream.
async fn proxy_handler(State(state): State<AppState>, request: Request) -> Response {
    let start_time = Instant::now();
    let method = request.method().to_string();

    tracing::debug!("Proxying request");

    let result = match build_outbound(request, &state.config) {
        Ok(outbound) => relay::relay(&state.client, outbound, ChannelSink::default(), state.relay).await,
        Err(e) => Err(e),
    };

    let response = match result {
        Ok(response) => response,
        Err(e) => e.into_response(),
    };

    metrics::record_request(&method, response.status().as_u16(), start_time);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Request as HttpRequest, StatusCode};
    use tower::ServiceExt;

    fn server(target: &str) -> HttpServer {
        let config = ProxyConfig::new(target, "abc").unwrap().shared();
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        HttpServer::with_client(config, client, RelayOptions::default())
    }

    #[test]
    fn options_follow_settings() {
        let mut settings = Settings::default();
        assert!(ServerOptions::from_settings(&settings).connect_timeout.is_none());

        settings.upstream.connect_timeout_secs = Some(5);
        settings.relay.max_line_bytes = Some(64);
        settings.listener.drain_timeout_secs = 2;
        let options = ServerOptions::from_settings(&settings);
        assert_eq!(options.connect_timeout, Some(Duration::from_secs(5)));
        assert_eq!(options.drain_timeout, Some(Duration::from_secs(2)));
        assert_eq!(options.relay.max_line_bytes, Some(64));
    }

    #[test]
    fn default_client_builds() {
        let config = ProxyConfig::new("https://api.example.com", "abc").unwrap().shared();
        let server = HttpServer::new(config, ServerOptions::default()).unwrap();
        assert_eq!(server.drain_timeout, DEFAULT_DRAIN_TIMEOUT);
    }

    #[tokio::test]
    async fn unreachable_upstream_is_bad_gateway() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let request = HttpRequest::builder()
            .method("POST")
            .uri("/v1/chat/completions")
            .body(Body::from("{}"))
            .unwrap();

        let response = server(&format!("http://{}", addr))
            .router()
            .oneshot(request)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap().to_lowercase();
        assert!(body.contains("connection refused"));
    }

    #[tokio::test]
    async fn root_path_is_routed() {
        let upstream = axum::Router::new().route("/", any(|| async { "root\n" }));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, upstream).await;
        });

        let request = HttpRequest::builder().uri("/").body(Body::empty()).unwrap();
        let response = server(&format!("http://{}", addr))
            .router()
            .oneshot(request)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"root\n");
    }
}
