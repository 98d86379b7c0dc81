//! Newline-delimited scanning of the upstream body.
//!
//! `\n` is the only delimiter. It is stripped from each [`Segment::Line`] and
//! restored by the writer; `\r` and every other byte pass through untouched.

use std::io;

use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};

/// One unit the relay writes and flushes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// A complete line without its `\n`. The final unterminated bytes of a
    /// body are also reported as a line, so they gain a trailing newline.
    Line(Bytes),
    /// The head of a line that outgrew the configured cap, relayed verbatim.
    Partial(Bytes),
}

/// Splits a byte stream into lines without ever holding more than one line.
pub struct LineScanner<S> {
    stream: S,
    buffer: BytesMut,
    /// Prefix of `buffer` already known to hold no newline.
    searched: usize,
    max_line_bytes: Option<usize>,
    exhausted: bool,
    /// Read error held back until the buffered tail has been handed out.
    failure: Option<io::Error>,
}

impl<S, E> LineScanner<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    /// `max_line_bytes` of `None` buffers a line until newline or EOF.
    pub fn new(stream: S, max_line_bytes: Option<usize>) -> Self {
        Self {
            stream,
            buffer: BytesMut::new(),
            searched: 0,
            max_line_bytes,
            exhausted: false,
            failure: None,
        }
    }

    /// Next segment, `None` at end of body.
    ///
    /// On a read error the unterminated tail, if any, is returned as a final
    /// line, then the error once; the scanner is exhausted afterwards.
    pub async fn next_segment(&mut self) -> Option<io::Result<Segment>> {
        loop {
            if let Some(offset) = self.buffer[self.searched..].iter().position(|b| *b == b'\n') {
                let end = self.searched + offset;

                if let Some(max) = self.max_line_bytes.filter(|max| end > *max) {
                    let head = self.buffer.split_to(max);
                    self.searched = end - max;
                    return Some(Ok(Segment::Partial(head.freeze())));
                }

                let mut line = self.buffer.split_to(end + 1);
                line.truncate(end);
                self.searched = 0;
                return Some(Ok(Segment::Line(line.freeze())));
            }
            self.searched = self.buffer.len();

            if let Some(max) = self.max_line_bytes {
                if self.buffer.len() >= max {
                    let head = self.buffer.split_to(max);
                    self.searched = self.buffer.len();
                    return Some(Ok(Segment::Partial(head.freeze())));
                }
            }

            if self.exhausted {
                if self.buffer.is_empty() {
                    return self.failure.take().map(Err);
                }
                self.searched = 0;
                return Some(Ok(Segment::Line(self.buffer.split().freeze())));
            }

            match self.stream.next().await {
                Some(Ok(chunk)) => self.buffer.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    self.exhausted = true;
                    self.failure = Some(io::Error::other(e));
                }
                None => self.exhausted = true,
            }
        }
    }
}
