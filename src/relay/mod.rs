//! Streaming relay subsystem.
//!
//! # Data Flow
//! ```text
//! reqwest::Request
//!     → client.execute()            (no timeout; failure → 502, nothing written yet)
//!     → ClientSink::into_streaming  (capability check; failure → 500, upstream released)
//!     → http::response::relay_head  (status + every header value, exactly once)
//!     → spawned copy task:
//!         scanner.rs (one line at a time)
//!         → writer.rs (write line + "\n", flush)
//!         → repeat until EOF, upstream error or client disconnect
//! ```
//!
//! # Design Decisions
//! - The response head is returned before any body byte is read
//! - Bodiless responses keep their `Content-Length`; streamed ones are re-framed
//! - Lines are never coalesced: one flush per line, in upstream order
//! - The upstream body is owned by the copy task and dropped on every exit
//! - No retries anywhere

pub mod scanner;
pub mod writer;

use axum::body::Body;
use axum::http::{Method, StatusCode};
use axum::response::Response;
use tracing::Instrument;

use crate::http::error::{ProxyError, RelayStage};
use crate::http::response::{relay_head, Framing};
use crate::observability::metrics;

pub use scanner::{LineScanner, Segment};
pub use writer::{ChannelSink, ChannelWriter, ClientSink, FlushableWriter};

/// Tuning for the body copy.
#[derive(Debug, Clone, Copy, Default)]
pub struct RelayOptions {
    /// Flush an unterminated line once it reaches this many bytes.
    pub max_line_bytes: Option<usize>,
}

/// Totals for one completed body copy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyStats {
    pub segments: u64,
    pub bytes: u64,
}

/// Send `outbound`, then stream the upstream response into `sink`.
///
/// Returns the client response once the upstream head has arrived; the body
/// keeps flowing from a background task. Responses that carry no body (HEAD,
/// 1xx, 204, 304) are answered with the head alone.
pub async fn relay<S: ClientSink>(
    client: &reqwest::Client,
    outbound: reqwest::Request,
    sink: S,
    options: RelayOptions,
) -> Result<Response, ProxyError> {
    let method = outbound.method().clone();
    let upstream = match client.execute(outbound).await {
        Ok(response) => response,
        Err(e) => {
            metrics::record_upstream_error();
            return Err(ProxyError::upstream(&e));
        }
    };
    let status = upstream.status();

    let Some((mut writer, body)) = sink.into_streaming() else {
        drop(upstream);
        return Err(ProxyError::StreamingUnsupported);
    };

    if !has_body(&method, status) {
        tracing::debug!(status = status.as_u16(), "Upstream responded without a body");
        return Ok(relay_head(status, upstream.headers(), Body::empty(), Framing::Preserve));
    }

    let response = relay_head(status, upstream.headers(), body, Framing::Reframe);
    let mut scanner = LineScanner::new(Box::pin(upstream.bytes_stream()), options.max_line_bytes);

    tracing::debug!(status = status.as_u16(), "Upstream responded, streaming body");

    tokio::spawn(
        async move {
            let mut stats = CopyStats::default();
            let result = copy_lines(&mut scanner, &mut writer, &mut stats).await;
            metrics::record_relayed(stats.segments);

            match result {
                Ok(()) => {
                    tracing::debug!(
                        segments = stats.segments,
                        bytes = stats.bytes,
                        "Relay complete"
                    );
                }
                Err(ProxyError::RelayInterrupted { stage, source }) => {
                    metrics::record_interrupted(stage);
                    tracing::warn!(
                        stage = %stage,
                        segments = stats.segments,
                        error = %source,
                        "Relay interrupted"
                    );
                    if stage == RelayStage::ReadingUpstream {
                        writer.abort(source).await;
                    }
                }
                Err(e) => tracing::error!(error = %e, "Relay failed"),
            }
        }
        .instrument(tracing::Span::current()),
    );

    Ok(response)
}

/// Whether a response to `method` with `status` can carry a body at all.
pub fn has_body(method: &Method, status: StatusCode) -> bool {
    *method != Method::HEAD
        && !status.is_informational()
        && status != StatusCode::NO_CONTENT
        && status != StatusCode::NOT_MODIFIED
}

/// Relay every segment from `scanner` to `writer`, flushing after each one.
///
/// `stats` counts what reached the client, including when the copy fails.
pub async fn copy_lines<St, E, W>(
    scanner: &mut LineScanner<St>,
    writer: &mut W,
    stats: &mut CopyStats,
) -> Result<(), ProxyError>
where
    St: futures_util::Stream<Item = Result<bytes::Bytes, E>> + Unpin,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
    W: FlushableWriter,
{
    while let Some(segment) = scanner.next_segment().await {
        let segment = segment.map_err(|source| ProxyError::RelayInterrupted {
            stage: RelayStage::ReadingUpstream,
            source,
        })?;

        let written = write_segment(writer, &segment).map_err(to_client_error)?;
        writer.flush().await.map_err(to_client_error)?;

        stats.segments += 1;
        stats.bytes += written as u64;
    }

    Ok(())
}

fn write_segment<W: FlushableWriter>(writer: &mut W, segment: &Segment) -> std::io::Result<usize> {
    match segment {
        Segment::Line(line) => {
            writer.write(line)?;
            writer.write(b"\n")?;
            Ok(line.len() + 1)
        }
        Segment::Partial(head) => {
            writer.write(head)?;
            Ok(head.len())
        }
    }
}

fn to_client_error(source: std::io::Error) -> ProxyError {
    ProxyError::RelayInterrupted {
        stage: RelayStage::WritingClient,
        source,
    }
}
