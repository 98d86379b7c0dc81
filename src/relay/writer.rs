//! Client-facing body sinks.
//!
//! # Responsibilities
//! - Define the flushable writer the line relay writes through
//! - Let a sink declare whether it can flush incrementally
//! - Provide the production sink: a bounded channel feeding the response body
//!
//! # Design Decisions
//! - `write` only buffers; nothing reaches the client until `flush`
//! - A flush waits for channel capacity, so a slow client slows the upstream read
//! - A dropped response body (client gone) turns the next flush into an error

use std::future::Future;
use std::io;

use axum::body::Body;
use bytes::{Bytes, BytesMut};
use tokio::sync::mpsc;

/// Frames queued between the relay task and the response body.
pub const DEFAULT_CAPACITY: usize = 1;

/// A writer that can push buffered bytes to the client on demand.
pub trait FlushableWriter: Send {
    /// Buffer `buf` for the client.
    fn write(&mut self, buf: &[u8]) -> io::Result<()>;

    /// Hand everything buffered so far to the transport.
    fn flush(&mut self) -> impl Future<Output = io::Result<()>> + Send;

    /// End the body with an error so the client sees a broken transfer
    /// rather than a clean end of stream. No-op by default.
    fn abort(&mut self, _error: io::Error) -> impl Future<Output = ()> + Send {
        async {}
    }
}

/// The client side of a relayed response.
pub trait ClientSink {
    type Writer: FlushableWriter + 'static;

    /// Capability query: the writer plus the body it feeds, or `None` when
    /// this sink can only deliver a fully buffered body.
    fn into_streaming(self) -> Option<(Self::Writer, Body)>;
}

/// Sink backed by a bounded channel that becomes the response body.
#[derive(Debug, Clone, Copy)]
pub struct ChannelSink {
    capacity: usize,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
        }
    }
}

impl Default for ChannelSink {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ClientSink for ChannelSink {
    type Writer = ChannelWriter;

    fn into_streaming(self) -> Option<(ChannelWriter, Body)> {
        let (tx, rx) = mpsc::channel::<io::Result<Bytes>>(self.capacity);
        let frames = futures_util::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|frame| (frame, rx))
        });

        let writer = ChannelWriter {
            tx,
            pending: BytesMut::new(),
        };
        Some((writer, Body::from_stream(frames)))
    }
}

/// Writer half of a [`ChannelSink`]. Each flush becomes one body frame.
#[derive(Debug)]
pub struct ChannelWriter {
    tx: mpsc::Sender<io::Result<Bytes>>,
    pending: BytesMut,
}

impl FlushableWriter for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        if self.tx.is_closed() {
            return Err(client_gone());
        }
        self.pending.extend_from_slice(buf);
        Ok(())
    }

    async fn flush(&mut self) -> io::Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let frame = self.pending.split().freeze();
        self.tx.send(Ok(frame)).await.map_err(|_| client_gone())
    }

    async fn abort(&mut self, error: io::Error) {
        self.pending.clear();
        let _ = self.tx.send(Err(error)).await;
    }
}

fn client_gone() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "client disconnected")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn nothing_is_sent_before_flush() {
        let (mut writer, body) = ChannelSink::new(4).into_streaming().unwrap();
        writer.write(b"data: 1").unwrap();
        writer.write(b"\n").unwrap();
        drop(writer);

        // Dropped before flushing: the buffered bytes never become a frame.
        let bytes = to_bytes(body, usize::MAX).await.unwrap();
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn each_flush_is_one_frame() {
        use futures_util::StreamExt;

        let (mut writer, body) = ChannelSink::new(4).into_streaming().unwrap();
        writer.write(b"data: 1").unwrap();
        writer.write(b"\n").unwrap();
        writer.flush().await.unwrap();
        writer.write(b"data: 2\n").unwrap();
        writer.flush().await.unwrap();
        drop(writer);

        let frames: Vec<Bytes> = body
            .into_data_stream()
            .map(|frame| frame.unwrap())
            .collect()
            .await;
        assert_eq!(frames, vec![Bytes::from("data: 1\n"), Bytes::from("data: 2\n")]);
    }

    #[tokio::test]
    async fn flush_fails_once_body_is_dropped() {
        let (mut writer, body) = ChannelSink::default().into_streaming().unwrap();
        drop(body);

        let err = match writer.write(b"late\n") {
            Err(e) => e,
            Ok(()) => writer.flush().await.unwrap_err(),
        };
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[tokio::test]
    async fn abort_surfaces_as_body_error() {
        let (mut writer, body) = ChannelSink::new(4).into_streaming().unwrap();
        writer.write(b"partial\n").unwrap();
        writer.flush().await.unwrap();
        writer
            .abort(io::Error::new(io::ErrorKind::ConnectionReset, "upstream reset"))
            .await;
        drop(writer);

        assert!(to_bytes(body, usize::MAX).await.is_err());
    }

    #[tokio::test]
    async fn empty_flush_sends_nothing() {
        let (mut writer, body) = ChannelSink::new(4).into_streaming().unwrap();
        writer.flush().await.unwrap();
        drop(writer);

        let bytes = to_bytes(body, usize::MAX).await.unwrap();
        assert!(bytes.is_empty());
    }
}
