//! Stream adapters that cut a provider's byte stream into protocol frames.
//!
//! Two framings are needed: Server-Sent Events (frames end with a blank line)
//! and newline-delimited JSON (frames end with a line break). Both share the
//! same buffering logic so frames and multi-byte characters split across
//! network reads are reassembled before decoding. Carriage returns are dropped
//! on input, so CRLF line endings frame the same way as LF.

use futures_util::{Stream, StreamExt};
use memchr::memmem;
use std::collections::VecDeque;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use crate::Error;

/// Upper bound on buffered bytes still waiting for a frame separator.
const MAX_BUFFERED_BYTES: usize = 1_000_000;

/// Turns one complete frame of text into a protocol value.
pub trait FrameDecoder {
    type Frame;

    /// Byte sequence that terminates a frame.
    const SEPARATOR: &'static [u8];

    /// Decode a frame; `None` means the frame carries nothing (comments, blank lines).
    fn decode(text: &str) -> Option<Self::Frame>;
}

/// A Server-Sent Events (SSE) event.
#[derive(Debug, Clone, PartialEq)]
pub struct SseEvent {
    /// Event type (optional).
    pub event_type: Option<String>,
    /// Event data, multiple `data:` lines joined with `\n`.
    pub data: String,
}

impl SseEvent {
    /// Check if this is the OpenAI end-of-stream sentinel.
    pub fn is_done(&self) -> bool {
        self.data.trim() == "[DONE]"
    }
}

/// Decoder for `text/event-stream` bodies.
pub struct SseDecoder;

impl FrameDecoder for SseDecoder {
    type Frame = SseEvent;

    const SEPARATOR: &'static [u8] = b"\n\n";

    fn decode(text: &str) -> Option<SseEvent> {
        let mut event_type = None;
        let mut data_lines = Vec::new();

        for line in text.lines() {
            // Only trim the end to preserve intentional leading spaces
            let line = line.trim_end();
            if line.is_empty() || line.starts_with(':') {
                continue;
            }

            if let Some((field, value)) = line.split_once(':') {
                let value = value.strip_prefix(' ').unwrap_or(value);
                match field {
                    "event" => event_type = Some(value.to_string()),
                    "data" => data_lines.push(value.to_string()),
                    _ => {}
                }
            }
        }

        if data_lines.is_empty() {
            return None;
        }

        Some(SseEvent {
            event_type,
            data: data_lines.join("\n"),
        })
    }
}

/// Decoder for newline-delimited JSON bodies; yields each non-blank line.
pub struct LineDecoder;

impl FrameDecoder for LineDecoder {
    type Frame = String;

    const SEPARATOR: &'static [u8] = b"\n";

    fn decode(text: &str) -> Option<String> {
        let line = text.trim_end_matches('\r').trim();
        if line.is_empty() {
            None
        } else {
            Some(line.to_string())
        }
    }
}

/// A stream adapter that yields decoded frames from a byte stream.
pub struct FrameStream<S, D: FrameDecoder> {
    inner: S,
    buffer: Vec<u8>,
    frames: VecDeque<D::Frame>,
    finished: bool,
    _decoder: PhantomData<fn() -> D>,
}

impl<S, D: FrameDecoder> FrameStream<S, D> {
    pub fn new(stream: S) -> Self {
        Self {
            inner: stream,
            buffer: Vec::new(),
            frames: VecDeque::new(),
            finished: false,
            _decoder: PhantomData,
        }
    }

    /// Move every complete frame out of the buffer.
    fn drain_frames(&mut self) -> Result<(), Error> {
        let finder = memmem::Finder::new(D::SEPARATOR);
        let mut start = 0;

        while let Some(pos) = finder.find(&self.buffer[start..]) {
            let end = start + pos;
            let text = std::str::from_utf8(&self.buffer[start..end])
                .map_err(|e| Error::transport("stream", format!("invalid UTF-8 in frame: {e}")))?;
            if let Some(frame) = D::decode(text) {
                self.frames.push_back(frame);
            }
            start = end + D::SEPARATOR.len();
        }

        if start > 0 {
            self.buffer.drain(..start);
        }
        Ok(())
    }

    /// Decode whatever is left once the underlying stream has ended.
    fn take_tail(&mut self) -> Option<D::Frame> {
        let tail = std::mem::take(&mut self.buffer);
        let text = std::str::from_utf8(&tail).ok()?;
        let text = text.trim();
        if text.is_empty() {
            None
        } else {
            D::decode(text)
        }
    }
}

impl<S, D, E> Stream for FrameStream<S, D>
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Unpin,
    D: FrameDecoder,
    D::Frame: Unpin,
    E: std::fmt::Display,
{
    type Item = Result<D::Frame, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(frame) = self.frames.pop_front() {
                return Poll::Ready(Some(Ok(frame)));
            }
            if self.finished {
                return Poll::Ready(None);
            }

            let chunk = match ready!(self.inner.poll_next_unpin(cx)) {
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => {
                    return Poll::Ready(Some(Err(Error::transport(
                        "stream",
                        format!("read failed: {e}"),
                    ))));
                }
                None => {
                    self.finished = true;
                    return Poll::Ready(self.take_tail().map(Ok));
                }
            };

            // CR only ever terminates lines in either framing, so CRLF bodies
            // split on the same separators as LF ones.
            self.buffer.extend(chunk.iter().copied().filter(|&b| b != b'\r'));
            if let Err(e) = self.drain_frames() {
                return Poll::Ready(Some(Err(e)));
            }

            // Only bytes still waiting for a separator count against the bound.
            if self.buffer.len() > MAX_BUFFERED_BYTES {
                self.buffer.clear();
                return Poll::Ready(Some(Err(Error::transport(
                    "stream",
                    "frame buffer exceeded maximum size",
                ))));
            }
        }
    }
}

/// Extension trait to add framing to byte streams.
pub trait FramedExt: Stream + Sized {
    /// Parse this byte stream as SSE events.
    fn sse_events(self) -> FrameStream<Self, SseDecoder> {
        FrameStream::new(self)
    }

    /// Parse this byte stream as newline-delimited lines.
    fn json_lines(self) -> FrameStream<Self, LineDecoder> {
        FrameStream::new(self)
    }
}

impl<S: Stream> FramedExt for S {}
