//! Line-oriented decoder for streamed completion bodies
//!
//! Chunks arrive with arbitrary boundaries. Text is buffered until a line
//! terminator shows up, every terminated line is decoded, and the partial
//! segment after the last terminator stays buffered for the next chunk.

use crate::protocol::StreamFrame;
use bytes::Bytes;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use std::collections::VecDeque;
use std::fmt;
use tracing::{debug, warn};

/// Prefix carried by every payload line
pub const DATA_PREFIX: &str = "data:";

/// Sentinel some services send after the last frame
pub const DONE_SENTINEL: &str = "[DONE]";

/// Event-stream fields that never carry a frame
const IGNORED_FIELDS: [&str; 3] = ["event:", "id:", "retry:"];

/// Lazily decoded sequence of frames
pub type FrameStream = BoxStream<'static, StreamFrame>;

/// Incremental decoder over text chunks
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: String,
    pending: Option<String>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return the frames completed by it
    ///
    /// Nothing is parsed until the buffer holds a line terminator.
    pub fn push(&mut self, chunk: &str) -> Vec<StreamFrame> {
        self.buffer.push_str(chunk);

        let Some(last) = self.buffer.rfind('\n') else {
            return Vec::new();
        };
        let tail = self.buffer.split_off(last + 1);
        let terminated = std::mem::replace(&mut self.buffer, tail);

        terminated
            .lines()
            .filter_map(|line| self.decode_line(line))
            .collect()
    }

    /// Flush the unterminated tail once the source is exhausted
    pub fn finish(&mut self) -> Vec<StreamFrame> {
        let tail = std::mem::take(&mut self.buffer);
        let frame = self.decode_line(&tail);

        if let Some(held) = self.pending.take() {
            debug!(bytes = held.len(), "Dropping unparsed stream fragment at end of stream");
        }

        frame.into_iter().collect()
    }

    /// Bytes buffered but not yet terminated
    pub fn buffered(&self) -> &str {
        &self.buffer
    }

    fn decode_line(&mut self, raw: &str) -> Option<StreamFrame> {
        let line = raw.trim();
        if line.is_empty() || line.starts_with(':') {
            return None;
        }
        if IGNORED_FIELDS.iter().any(|field| line.starts_with(field)) {
            return None;
        }

        let payload = line
            .strip_prefix(DATA_PREFIX)
            .map(str::trim_start)
            .unwrap_or(line);
        if payload == DONE_SENTINEL {
            return None;
        }

        self.decode_payload(payload)
    }

    /// Parse a payload, giving a previously failed line one retry
    fn decode_payload(&mut self, payload: &str) -> Option<StreamFrame> {
        if let Some(held) = self.pending.take() {
            let joined = format!("{}{}", held, payload);
            match serde_json::from_str::<StreamFrame>(&joined) {
                Ok(frame) => return Some(frame),
                Err(e) => debug!(
                    error = %e,
                    bytes = held.len(),
                    "Retry with held fragment failed; dropping it"
                ),
            }
        }

        match serde_json::from_str::<StreamFrame>(payload) {
            Ok(frame) => Some(frame),
            Err(e) => {
                warn!(error = %e, "Failed to parse stream frame; holding it for one retry");
                self.pending = Some(payload.to_string());
                None
            }
        }
    }
}

/// Decode a complete body in one call
pub fn decode_lines(text: &str) -> Vec<StreamFrame> {
    let mut decoder = FrameDecoder::new();
    let mut frames = decoder.push(text);
    frames.extend(decoder.finish());
    frames
}

/// Decode a byte stream into a lazy frame sequence
///
/// The sequence ends when the source completes, flushing any buffered tail.
/// A source error ends it early without a final frame.
pub fn decode_stream<S, E>(source: S) -> FrameStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    let state = DecodeState {
        source: Box::pin(source),
        decoder: FrameDecoder::new(),
        carry: Utf8Carry::default(),
        ready: VecDeque::new(),
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(frame) = state.ready.pop_front() {
                return Some((frame, state));
            }
            if state.done {
                return None;
            }

            match state.source.next().await {
                Some(Ok(chunk)) => {
                    let text = state.carry.decode(&chunk);
                    let frames = state.decoder.push(&text);
                    state.ready.extend(frames);
                }
                Some(Err(e)) => {
                    warn!(error = %e, "Stream transport failed; ending frame sequence");
                    state.done = true;
                }
                None => {
                    let rest = state.carry.finish();
                    let mut frames = state.decoder.push(&rest);
                    frames.extend(state.decoder.finish());
                    state.ready.extend(frames);
                    state.done = true;
                }
            }
        }
    })
    .boxed()
}

struct DecodeState<S> {
    source: std::pin::Pin<Box<S>>,
    decoder: FrameDecoder,
    carry: Utf8Carry,
    ready: VecDeque<StreamFrame>,
    done: bool,
}

/// Holds the bytes of a code point split across chunks
#[derive(Debug, Default)]
struct Utf8Carry {
    partial: Vec<u8>,
}

impl Utf8Carry {
    fn decode(&mut self, chunk: &[u8]) -> String {
        self.partial.extend_from_slice(chunk);
        let keep = incomplete_suffix_len(&self.partial);
        let rest = self.partial.split_off(self.partial.len() - keep);
        let text = String::from_utf8_lossy(&self.partial).into_owned();
        self.partial = rest;
        text
    }

    fn finish(&mut self) -> String {
        let text = String::from_utf8_lossy(&self.partial).into_owned();
        self.partial.clear();
        text
    }
}

/// Length of a trailing multi-byte sequence that is still missing bytes
fn incomplete_suffix_len(bytes: &[u8]) -> usize {
    for back in 1..=bytes.len().min(3) {
        let byte = bytes[bytes.len() - back];
        if byte & 0xC0 == 0x80 {
            continue;
        }
        let width = match byte {
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => 1,
        };
        return if width > back { back } else { 0 };
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_line(content: &str) -> String {
        format!(
            "data: {{\"id\":\"c1\",\"object\":\"chat.completion.chunk\",\"created\":1,\"model\":\"m\",\"choices\":[{{\"index\":0,\"delta\":{{\"content\":\"{}\"}},\"finish_reason\":null}}]}}\n",
            content
        )
    }

    #[test]
    fn test_unterminated_chunk_not_parsed() {
        let mut decoder = FrameDecoder::new();
        let line = frame_line("hi");
        let body = line.trim_end();

        assert!(decoder.push(body).is_empty());
        assert_eq!(decoder.buffered(), body);

        let frames = decoder.push("\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].content(), Some("hi"));
        assert!(decoder.buffered().is_empty());
    }

    #[test]
    fn test_partial_tail_retained() {
        let mut decoder = FrameDecoder::new();
        let first = frame_line("a");
        let second = frame_line("b");
        let (head, tail) = second.split_at(20);

        let frames = decoder.push(&format!("{}{}", first, head));
        assert_eq!(frames.len(), 1);
        assert_eq!(decoder.buffered(), head);

        let frames = decoder.push(tail);
        assert_eq!(frames[0].content(), Some("b"));
    }

    #[test]
    fn test_done_and_comments_ignored() {
        let body = format!(": keep-alive\n{}\nevent: message\ndata: [DONE]\n", frame_line("x"));
        let frames = decode_lines(&body);
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn test_crlf_terminators() {
        let body = frame_line("x").replace('\n', "\r\n");
        assert_eq!(decode_lines(&body).len(), 1);
    }

    #[test]
    fn test_failed_line_retried_with_next() {
        let line = frame_line("joined");
        let payload = line.trim_end().trim_start_matches("data: ");
        let (front, back) = payload.split_at(30);
        let body = format!("data: {}\n{}\n", front, back);

        let frames = decode_lines(&body);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].content(), Some("joined"));
    }

    #[test]
    fn test_failed_retry_drops_held_text() {
        let body = format!("data: {{broken\ndata: also broken\n{}", frame_line("ok"));
        let frames = decode_lines(&body);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].content(), Some("ok"));
    }

    #[test]
    fn test_finish_flushes_tail() {
        let mut decoder = FrameDecoder::new();
        let line = frame_line("end");
        assert!(decoder.push(line.trim_end()).is_empty());
        let frames = decoder.finish();
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn test_incomplete_suffix_len() {
        let snowman = "☃".as_bytes();
        assert_eq!(incomplete_suffix_len(b"abc"), 0);
        assert_eq!(incomplete_suffix_len(snowman), 0);
        assert_eq!(incomplete_suffix_len(&snowman[..1]), 1);
        assert_eq!(incomplete_suffix_len(&snowman[..2]), 2);
    }

    #[test]
    fn test_utf8_carry_across_chunks() {
        let mut carry = Utf8Carry::default();
        let bytes = "é☃".as_bytes();
        let mut text = carry.decode(&bytes[..1]);
        text.push_str(&carry.decode(&bytes[1..3]));
        text.push_str(&carry.decode(&bytes[3..]));
        text.push_str(&carry.finish());
        assert_eq!(text, "é☃");
    }

    #[test]
    fn test_decode_stream_splits_code_points() {
        let body = frame_line("héllo");
        let bytes = body.as_bytes();
        let split = body.find('é').unwrap() + 1;
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::copy_from_slice(&bytes[..split])),
            Ok(Bytes::copy_from_slice(&bytes[split..])),
        ];

        let frames: Vec<StreamFrame> =
            tokio_test::block_on(decode_stream(stream::iter(chunks)).collect());
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].content(), Some("héllo"));
    }

    #[test]
    fn test_decode_stream_ends_on_source_error() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from(frame_line("first"))),
            Err(std::io::Error::other("reset")),
            Ok(Bytes::from(frame_line("never"))),
        ];
        let frames: Vec<StreamFrame> =
            tokio_test::block_on(decode_stream(stream::iter(chunks)).collect());
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].content(), Some("first"));
    }
}
