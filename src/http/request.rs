//! Outbound request construction.
//!
//! # Responsibilities
//! - Point the inbound path and query at the fixed upstream base
//! - Copy every inbound header, then override `Host` and `Authorization`
//! - Pass the body stream through unread
//!
//! # Design Decisions
//! - The base URL's own path and query are discarded, never joined
//! - `Authorization` is replaced, never merged: clients cannot choose the credential
//! - The inbound header map is cloned, so the outbound copy can be mutated freely

use axum::body::{Body, HttpBody};
use axum::extract::Request;
use axum::http::header::{HeaderValue, AUTHORIZATION, HOST};
use url::Url;

use crate::config::ProxyConfig;
use crate::http::error::ProxyError;

/// Derive the upstream request for one inbound request.
pub fn build_outbound(request: Request, config: &ProxyConfig) -> Result<reqwest::Request, ProxyError> {
    let (parts, body) = request.into_parts();

    let url = outbound_url(&config.target, parts.uri.path(), parts.uri.query())?;

    let mut headers = parts.headers.clone();
    let host = HeaderValue::from_str(&authority(&url))
        .map_err(|e| ProxyError::RequestConstruction(format!("invalid host header: {}", e)))?;
    headers.insert(HOST, host);

    let bearer = config
        .secret
        .bearer_header()
        .map_err(|e| ProxyError::RequestConstruction(format!("invalid authorization header: {}", e)))?;
    headers.insert(AUTHORIZATION, bearer);

    let mut outbound = reqwest::Request::new(parts.method, url);
    *outbound.headers_mut() = headers;
    if !body.is_end_stream() {
        *outbound.body_mut() = Some(stream_body(body));
    }

    Ok(outbound)
}

/// `target` with its path and query replaced by the inbound ones.
pub fn outbound_url(target: &Url, path: &str, query: Option<&str>) -> Result<Url, ProxyError> {
    if target.cannot_be_a_base() {
        return Err(ProxyError::RequestConstruction(format!(
            "target {} cannot carry a path",
            target
        )));
    }

    let mut url = target.clone();
    url.set_fragment(None);
    url.set_path(path);
    url.set_query(query);

    // Round-trip through the URI parser the client will use.
    url.as_str()
        .parse::<axum::http::Uri>()
        .map_err(|e| ProxyError::RequestConstruction(format!("invalid upstream URL {}: {}", url, e)))?;

    Ok(url)
}

/// `host[:port]` as it belongs in a `Host` header. Default ports are omitted.
pub fn authority(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

fn stream_body(body: Body) -> reqwest::Body {
    reqwest::Body::wrap_stream(body.into_data_stream())
}
