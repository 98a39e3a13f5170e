//! Incremental decoding of streaming completion bodies.
//!
//! The decoder consumes the response body as it arrives, splits it on
//! provider chunk boundaries (SSE `data:` frames or bare newline-delimited
//! JSON events) and yields text fragments in arrival order. Exactly one
//! terminal token (`done == true`) ends the sequence; nothing is delivered
//! after it.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures::{stream, Stream, StreamExt};
use serde::Deserialize;

use crate::error::{truncate_snippet, ClientError};
use crate::response::{first_candidate_text, Candidate};
use crate::transport;

/// An incremental text fragment. `done` marks the single terminal event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamToken {
    pub text: String,
    pub done: bool,
}

type BoxedByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ClientError>> + Send>>;
type TokenItem = Result<StreamToken, ClientError>;

/// A finite, non-restartable sequence of [`StreamToken`]s.
///
/// Dropping the stream aborts the request and releases the connection;
/// [`CompletionStream::cancel`] additionally surfaces a `Cancelled` error
/// on the next poll.
pub struct CompletionStream {
    inner: Pin<Box<dyn Stream<Item = TokenItem> + Send>>,
    cancelled: Arc<AtomicBool>,
}

impl CompletionStream {
    pub(crate) fn new(response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let body = response.bytes_stream().map(|item| item.map_err(transport::classify));
        Self::from_byte_stream(status, body)
    }

    fn from_byte_stream<S>(status: u16, body: S) -> Self
    where
        S: Stream<Item = Result<Bytes, ClientError>> + Send + 'static,
    {
        let cancelled = Arc::new(AtomicBool::new(false));
        let inner = decode_frames(status, Box::pin(body), cancelled.clone());
        Self {
            inner: Box::pin(inner),
            cancelled,
        }
    }

    /// Stop delivery. The next poll yields `Cancelled`, then the stream ends.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

impl Stream for CompletionStream {
    type Item = TokenItem;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

struct DecodeState {
    body: BoxedByteStream,
    bytes: BytesMut,
    buffer: String,
    pending: VecDeque<StreamToken>,
    failure: Option<ClientError>,
    status: u16,
    finished: bool,
    cancelled: Arc<AtomicBool>,
}

fn decode_frames(
    status: u16,
    body: BoxedByteStream,
    cancelled: Arc<AtomicBool>,
) -> impl Stream<Item = TokenItem> + Send {
    let state = DecodeState {
        body,
        bytes: BytesMut::new(),
        buffer: String::new(),
        pending: VecDeque::new(),
        failure: None,
        status,
        finished: false,
        cancelled,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if st.finished {
                return None;
            }
            if st.cancelled.load(Ordering::SeqCst) {
                st.finished = true;
                return Some((Err(ClientError::Cancelled), st));
            }
            if let Some(token) = st.pending.pop_front() {
                if token.done {
                    st.finished = true;
                    st.pending.clear();
                }
                return Some((Ok(token), st));
            }
            // Tokens decoded before a failure are delivered first; the
            // error surfaces once they are drained.
            if let Some(err) = st.failure.take() {
                st.finished = true;
                return Some((Err(err), st));
            }
            match st.body.next().await {
                Some(Ok(chunk)) => {
                    st.bytes.extend_from_slice(&chunk);
                    drain_utf8(&mut st.bytes, &mut st.buffer);
                    let (frames, remainder) = consume_frames(&st.buffer, false);
                    st.buffer = remainder;
                    if let Err(err) = enqueue(&mut st.pending, &frames, st.status) {
                        st.failure = Some(err);
                    }
                }
                Some(Err(err)) => {
                    // Transport failure mid-stream surfaces as an error
                    // instead of silently truncating the sequence.
                    st.failure = Some(err);
                }
                None => {
                    // Incomplete trailing bytes at end of body are junk.
                    st.buffer.push_str(&String::from_utf8_lossy(&st.bytes));
                    st.bytes.clear();
                    let (frames, _) = consume_frames(&st.buffer, true);
                    st.buffer.clear();
                    if let Err(err) = enqueue(&mut st.pending, &frames, st.status) {
                        st.failure = Some(err);
                    } else if st.pending.back().map(|t| t.done) != Some(true) {
                        // Connection close is a valid termination; synthesize
                        // the terminal event if the provider sent none.
                        st.pending.push_back(StreamToken {
                            text: String::new(),
                            done: true,
                        });
                    }
                }
            }
        }
    })
}

/// Move the valid UTF-8 prefix of `bytes` into `out`, leaving any
/// incomplete trailing multi-byte sequence buffered for the next chunk.
/// Invalid sequences inside the prefix become replacement characters.
fn drain_utf8(bytes: &mut BytesMut, out: &mut String) {
    loop {
        match std::str::from_utf8(bytes) {
            Ok(valid) => {
                out.push_str(valid);
                bytes.clear();
                return;
            }
            Err(err) => {
                let prefix = bytes.split_to(err.valid_up_to());
                out.push_str(&String::from_utf8_lossy(&prefix));
                match err.error_len() {
                    Some(len) => {
                        let _ = bytes.split_to(len);
                        out.push('\u{FFFD}');
                    }
                    None => return,
                }
            }
        }
    }
}

fn enqueue(
    pending: &mut VecDeque<StreamToken>,
    frames: &[String],
    status: u16,
) -> Result<(), ClientError> {
    for frame in frames {
        match decode_frame(frame, status)? {
            Some(token) => {
                let terminal = token.done;
                pending.push_back(token);
                if terminal {
                    break;
                }
            }
            None => continue,
        }
    }
    Ok(())
}

/// Split complete frames out of the buffer, returning the unconsumed tail.
///
/// Handles SSE `data:` framing and bare NDJSON lines; SSE comments and
/// blank separator lines are skipped. With `flush` set the trailing
/// partial line is consumed too (end of body).
fn consume_frames(buffer: &str, flush: bool) -> (Vec<String>, String) {
    let mut frames = Vec::new();
    let mut rest = buffer;

    while let Some(idx) = rest.find('\n') {
        let line = &rest[..idx];
        rest = &rest[idx + 1..];
        if let Some(frame) = frame_from_line(line) {
            frames.push(frame);
        }
    }

    if flush {
        if let Some(frame) = frame_from_line(rest) {
            frames.push(frame);
        }
        return (frames, String::new());
    }

    (frames, rest.to_string())
}

fn frame_from_line(line: &str) -> Option<String> {
    let line = line.trim_end_matches('\r');
    if line.is_empty() || line.starts_with(':') {
        return None;
    }
    let payload = line.strip_prefix("data:").map(str::trim).unwrap_or(line.trim());
    if payload.is_empty() {
        return None;
    }
    Some(payload.to_string())
}

/// Known streaming frame shapes, tried in declaration order.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StreamFrame {
    Marked {
        #[serde(default)]
        text: Option<String>,
        done: bool,
    },
    Flat {
        text: String,
    },
    Candidates {
        candidates: Vec<Candidate>,
    },
}

const DONE_MARKER: &str = "[DONE]";

fn decode_frame(frame: &str, status: u16) -> Result<Option<StreamToken>, ClientError> {
    if frame == DONE_MARKER {
        return Ok(Some(StreamToken {
            text: String::new(),
            done: true,
        }));
    }
    match serde_json::from_str::<StreamFrame>(frame) {
        Ok(StreamFrame::Marked { text, done }) => Ok(Some(StreamToken {
            text: text.unwrap_or_default(),
            done,
        })),
        Ok(StreamFrame::Flat { text }) => Ok(Some(StreamToken { text, done: false })),
        Ok(StreamFrame::Candidates { candidates }) => {
            // Chunks carrying only finish metadata have no text part.
            Ok(first_candidate_text(&candidates).map(|text| StreamToken { text, done: false }))
        }
        Err(_) => Err(ClientError::MalformedResponse {
            status,
            snippet: truncate_snippet(frame),
        }),
    }
}
