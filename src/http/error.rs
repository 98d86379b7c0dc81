//! Per-request errors and their client-facing status codes.

use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Which side of the body copy failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayStage {
    /// Reading the next line from the upstream body.
    ReadingUpstream,
    /// Writing or flushing a line to the client.
    WritingClient,
}

impl RelayStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadingUpstream => "reading_upstream",
            Self::WritingClient => "writing_client",
        }
    }
}

impl fmt::Display for RelayStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors a single proxied request can end in.
///
/// None of these affect other in-flight requests.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The outbound request could not be formed. No upstream call was made.
    #[error("failed to build upstream request: {0}")]
    RequestConstruction(String),

    /// Connecting to or talking to the upstream failed before a response head
    /// arrived. Carries the whole error-source chain as text.
    #[error("{0}")]
    UpstreamUnreachable(String),

    /// The client sink cannot flush incrementally.
    #[error("Streaming not supported")]
    StreamingUnsupported,

    /// The body copy stopped after status and headers were committed.
    #[error("relay interrupted while {stage}: {source}")]
    RelayInterrupted {
        stage: RelayStage,
        #[source]
        source: std::io::Error,
    },
}

impl ProxyError {
    /// Build an [`ProxyError::UpstreamUnreachable`] from a client error,
    /// keeping the text of every underlying cause.
    pub fn upstream(err: &(dyn std::error::Error + 'static)) -> Self {
        Self::UpstreamUnreachable(error_chain(err))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::UpstreamUnreachable(_) => StatusCode::BAD_GATEWAY,
            Self::RequestConstruction(_)
            | Self::StreamingUnsupported
            | Self::RelayInterrupted { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::error!(error = %self, status = status.as_u16(), "Proxy error");
        (status, format!("{}\n", self)).into_response()
    }
}

/// Join an error and all of its sources with `": "`, skipping causes whose
/// text is already part of the message.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
