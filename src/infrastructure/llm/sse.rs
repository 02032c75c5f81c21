//! Server-sent events decoding

use std::collections::VecDeque;

use futures::stream::{self, BoxStream};
use futures::StreamExt;

use super::http_client::{ByteStream, HttpError};

struct SseState {
    bytes: ByteStream,
    buffer: Vec<u8>,
    pending: VecDeque<String>,
    finished: bool,
}

impl SseState {
    fn take_line(&mut self, line: &[u8]) {
        let line = String::from_utf8_lossy(line);
        let line = line.trim_end_matches(['\r', '\n']);

        if let Some(data) = line.strip_prefix("data:") {
            self.pending.push_back(data.trim_start().to_string());
        }
    }

    fn drain_lines(&mut self) {
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.take_line(&line);
        }
    }
}

/// Decode a byte stream into the payloads of its `data:` lines.
///
/// Lines may span chunk boundaries; comments, event names and blank
/// separators are dropped.
pub fn sse_data(bytes: ByteStream) -> BoxStream<'static, Result<String, HttpError>> {
    let state = SseState {
        bytes,
        buffer: Vec::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(data) = state.pending.pop_front() {
                return Some((Ok(data), state));
            }

            if state.finished {
                return None;
            }

            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    state.buffer.extend_from_slice(&chunk);
                    state.drain_lines();
                }
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(e), state));
                }
                None => {
                    state.finished = true;
                    let rest = std::mem::take(&mut state.buffer);
                    state.take_line(&rest);
                }
            }
        }
    })
    .boxed()
}
