//! Server-sent-events framing for the streaming responses body.
//!
//! Frames are blocks separated by a blank line. The decoder works on raw
//! bytes and only ever splits at the ASCII separator, so a multi-byte
//! character cut in half by the transport is carried over intact to the
//! next chunk.

use std::collections::VecDeque;

use futures_util::{stream, Stream, StreamExt};
use memchr::memmem;

/// Event name assigned to frames without an `event:` line.
pub const DEFAULT_EVENT_NAME: &str = "message";

const BLOCK_SEPARATOR: &[u8] = b"\n\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: String,
    /// All `data:` lines of the block, trimmed and joined with `\n`.
    pub data: String,
}

impl SseFrame {
    /// True when the frame named its event instead of taking the default.
    pub fn has_explicit_event(&self) -> bool {
        self.event != DEFAULT_EVENT_NAME
    }
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    scanned: usize,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every frame it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        // CR never appears unescaped inside JSON payloads, so dropping it
        // folds CRLF framing into LF framing without tracking chunk edges.
        self.buffer
            .extend(chunk.iter().copied().filter(|byte| *byte != b'\r'));

        let mut frames = Vec::new();
        let mut consumed = 0;
        let mut search_from = self.scanned;
        let finder = memmem::Finder::new(BLOCK_SEPARATOR);

        while let Some(offset) = finder.find(&self.buffer[search_from..]) {
            let block_end = search_from + offset;
            if let Some(frame) = parse_block(&self.buffer[consumed..block_end]) {
                frames.push(frame);
            }
            consumed = block_end + BLOCK_SEPARATOR.len();
            search_from = consumed;
        }

        if consumed > 0 {
            self.buffer.drain(..consumed);
        }
        // A separator may straddle the next chunk boundary.
        self.scanned = self.buffer.len().saturating_sub(BLOCK_SEPARATOR.len() - 1);
        frames
    }

    /// Flush whatever remains once the transport reports end of stream.
    pub fn finish(&mut self) -> Option<SseFrame> {
        let rest = std::mem::take(&mut self.buffer);
        self.scanned = 0;
        if rest.iter().all(u8::is_ascii_whitespace) {
            return None;
        }
        parse_block(&rest)
    }

    pub fn has_pending(&self) -> bool {
        !self.buffer.is_empty()
    }
}

fn parse_block(block: &[u8]) -> Option<SseFrame> {
    let text = String::from_utf8_lossy(block);
    let mut event: Option<&str> = None;
    let mut data_lines: Vec<&str> = Vec::new();

    for line in text.split('\n').map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(name) = line.strip_prefix("event:") {
            event = Some(name.trim());
        } else if let Some(data) = line.strip_prefix("data:") {
            data_lines.push(data.trim());
        }
    }

    if data_lines.is_empty() {
        return None;
    }

    Some(SseFrame {
        event: event
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_EVENT_NAME)
            .to_string(),
        data: data_lines.join("\n"),
    })
}

struct FrameStreamState<S> {
    body: S,
    decoder: SseDecoder,
    pending: VecDeque<SseFrame>,
    finished: bool,
}

/// Lazily decode a chunked byte stream into frames.
///
/// Frames come out in wire order. A transport error is yielded once and ends
/// the sequence; a clean end flushes the decoder's remainder first.
pub fn decode_frames<S, B, E>(body: S) -> impl Stream<Item = Result<SseFrame, E>>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
{
    let state = FrameStreamState {
        body,
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(frame) = state.pending.pop_front() {
                return Some((Ok(frame), state));
            }
            if state.finished {
                return None;
            }
            match state.body.next().await {
                Some(Ok(chunk)) => {
                    let frames = state.decoder.push(chunk.as_ref());
                    state.pending.extend(frames);
                }
                Some(Err(err)) => {
                    state.finished = true;
                    return Some((Err(err), state));
                }
                None => {
                    state.finished = true;
                    let rest = state.decoder.finish();
                    state.pending.extend(rest);
                }
            }
        }
    })
}
