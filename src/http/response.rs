//! Response head relay.
//!
//! # Responsibilities
//! - Copy the upstream status code to the client response
//! - Copy every upstream header value, duplicates included, in order
//!
//! # Design Decisions
//! - A streamed body is re-framed, since a body without a final newline gains
//!   one: `Content-Length` is dropped
//! - A bodiless response (HEAD, 204, 304) keeps `Content-Length` untouched
//! - `Transfer-Encoding` is hop-by-hop and never copied
//! - Headers are appended, never inserted, so repeated keys survive

use axum::body::Body;
use axum::http::header::{HeaderMap, HeaderName, CONTENT_LENGTH, TRANSFER_ENCODING};
use axum::http::StatusCode;
use axum::response::Response;

/// What happens to the upstream's framing headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// The body is relayed as a fresh stream.
    Reframe,
    /// No body follows; the upstream's `Content-Length` still describes the resource.
    Preserve,
}

/// Build the client response head from the upstream one, around `body`.
pub fn relay_head(status: StatusCode, upstream: &HeaderMap, body: Body, framing: Framing) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = status;

    let headers = response.headers_mut();
    for (name, value) in upstream.iter() {
        if is_dropped(name, framing) {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }

    response
}

fn is_dropped(name: &HeaderName, framing: Framing) -> bool {
    *name == TRANSFER_ENCODING || (*name == CONTENT_LENGTH && framing == Framing::Reframe)
}
