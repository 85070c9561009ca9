//! Stream normalizer: turns the upstream `data:` line stream into answer text.
//!
//! Lines are buffered across chunk boundaries (as raw bytes, so split UTF-8
//! sequences survive too). Lines that are not events, or whose payload does not
//! carry a string `delta`, are skipped without failing the response.

use std::collections::VecDeque;
use std::fmt::Display;
use std::time::Duration;

use bytes::Bytes;
use futures::{stream, Stream, StreamExt};
use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::LlmError;

/// Marker that opens every payload-carrying line.
pub const EVENT_PREFIX: &str = "data:";
/// Field inside the payload object holding the incremental text.
pub const DELTA_FIELD: &str = "delta";

/// Outcome of decoding one line of the upstream stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// Not an event line (blank, comment, keep-alive, `event:` etc).
    Ignored,
    /// Marker present but the payload is not valid JSON.
    Malformed,
    /// Valid JSON that is not an object.
    NotObject,
    /// Object without a usable `delta` field.
    MissingDelta,
    /// `delta` present but not a string.
    WrongType,
    Delta(String),
}

/// Decodes a single line (without its trailing `\n`).
pub fn decode_line(line: &str) -> LineEvent {
    let line = line.trim_end_matches('\r');
    let Some(payload) = line.strip_prefix(EVENT_PREFIX) else {
        return LineEvent::Ignored;
    };

    let value: Value = match serde_json::from_str(payload.trim()) {
        Ok(value) => value,
        Err(_) => return LineEvent::Malformed,
    };

    let Value::Object(mut fields) = value else {
        return LineEvent::NotObject;
    };

    match fields.remove(DELTA_FIELD) {
        None | Some(Value::Null) => LineEvent::MissingDelta,
        Some(Value::String(delta)) => LineEvent::Delta(delta),
        Some(_) => LineEvent::WrongType,
    }
}

/// Longest line kept while waiting for its newline. Anything longer is
/// discarded up to the next newline.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Incremental line decoder. Feed it chunks in arrival order; it yields the
/// non-empty deltas of every line completed so far.
#[derive(Debug, Default)]
pub struct DeltaDecoder {
    buf: Vec<u8>,
    /// Bytes of `buf` already known to contain no newline.
    scanned: usize,
    /// Set while skipping the remainder of an oversized line.
    discarding: bool,
}

impl DeltaDecoder {
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut deltas = Vec::new();

        while let Some(offset) = self.buf[self.scanned..].iter().position(|b| *b == b'\n') {
            let pos = self.scanned + offset;
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            self.scanned = 0;
            if std::mem::take(&mut self.discarding) {
                continue;
            }
            if let Some(delta) = decode_bytes(&line[..pos]) {
                deltas.push(delta);
            }
        }
        self.scanned = self.buf.len();

        if self.buf.len() > MAX_LINE_BYTES {
            warn!("Dropping stream line longer than {} bytes", MAX_LINE_BYTES);
            self.buf.clear();
            self.scanned = 0;
            self.discarding = true;
        }
        deltas
    }

    /// Decodes whatever unterminated fragment is left at end-of-stream.
    pub fn finish(self) -> Option<String> {
        if self.buf.is_empty() || self.discarding {
            return None;
        }
        decode_bytes(&self.buf)
    }
}

fn decode_bytes(bytes: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(bytes);
    match decode_line(&line) {
        LineEvent::Delta(delta) if delta.is_empty() => None,
        LineEvent::Delta(delta) => Some(delta),
        LineEvent::Ignored => {
            trace!("Skipping non-event line ({} bytes)", bytes.len());
            None
        }
        other => {
            debug!("Skipping stream line: {:?}", other);
            None
        }
    }
}

struct DeltaState<S> {
    inner: std::pin::Pin<Box<S>>,
    decoder: Option<DeltaDecoder>,
    pending: VecDeque<String>,
}

/// Adapts a chunked byte stream into a stream of deltas, in arrival order.
///
/// A transport error ends the stream after yielding `StreamInterrupted`.
pub fn deltas<S, E>(body: S) -> impl Stream<Item = Result<String, LlmError>>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Display,
{
    let state = DeltaState {
        inner: Box::pin(body),
        decoder: Some(DeltaDecoder::default()),
        pending: VecDeque::new(),
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(delta) = state.pending.pop_front() {
                return Some((Ok(delta), state));
            }

            let decoder = state.decoder.as_mut()?;
            match state.inner.next().await {
                Some(Ok(chunk)) => state.pending.extend(decoder.push_chunk(&chunk)),
                Some(Err(e)) => {
                    state.decoder = None;
                    return Some((Err(LlmError::StreamInterrupted(e.to_string())), state));
                }
                None => {
                    if let Some(delta) = state.decoder.take().and_then(DeltaDecoder::finish) {
                        state.pending.push_back(delta);
                    }
                }
            }
        }
    })
}

/// Consumes a response body to completion under a deadline and an optional
/// cancellation token.
#[derive(Debug, Clone)]
pub struct StreamNormalizer {
    deadline: Duration,
    cancellation: Option<CancellationToken>,
}

impl StreamNormalizer {
    pub fn new(deadline: Duration) -> Self {
        Self {
            deadline,
            cancellation: None,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Relays deltas as they arrive. The stream ends with a `Timeout` or
    /// `Cancelled` item when the deadline passes or the token fires first.
    pub fn relay<S, E>(&self, body: S) -> impl Stream<Item = Result<String, LlmError>>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Display,
    {
        let deadline = self.deadline;
        let until = Instant::now() + deadline;
        let token = self
            .cancellation
            .clone()
            .unwrap_or_else(CancellationToken::new);
        let inner = Box::pin(deltas(body));

        stream::unfold(Some(inner), move |state| {
            let token = token.clone();
            async move {
                let mut inner = state?;
                let next = tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(LlmError::Cancelled),
                    next = tokio::time::timeout_at(until, inner.next()) => {
                        next.map_err(|_| LlmError::Timeout(deadline))
                    }
                };

                match next {
                    Ok(Some(item)) => {
                        let ended = item.is_err();
                        Some((item, (!ended).then_some(inner)))
                    }
                    Ok(None) => None,
                    Err(e) => Some((Err(e), None)),
                }
            }
        })
    }

    /// Reads the stream exactly once and returns the concatenated deltas.
    /// A stream with no recognizable events yields an empty string.
    pub async fn collect<S, E>(&self, body: S) -> Result<String, LlmError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Display,
    {
        let mut deltas = std::pin::pin!(self.relay(body));
        let mut answer = String::new();
        let mut count = 0usize;

        while let Some(delta) = deltas.next().await {
            answer.push_str(&delta?);
            count += 1;
        }

        debug!(
            "Stream complete: {} deltas, {} bytes accumulated",
            count,
            answer.len()
        );
        Ok(answer)
    }
}
