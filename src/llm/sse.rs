//! Server-Sent Events decoding for streaming provider replies

use std::collections::VecDeque;
use std::time::Duration;

use futures_util::stream::{self, BoxStream, StreamExt};

use super::types::{CompletionStream, LlmError, StreamEvent};

/// Splits a byte stream into `data:` payloads.
///
/// Bytes are buffered until a full line is available so multi-byte
/// characters split across network chunks decode correctly.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning every complete `data:` payload
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);

            if let Some(data) = line.strip_prefix("data:") {
                let data = data.trim_start();
                if !data.is_empty() {
                    payloads.push(data.to_string());
                }
            }
        }
        payloads
    }
}

struct SseState<F> {
    bytes: BoxStream<'static, Result<Vec<u8>, LlmError>>,
    decoder: SseDecoder,
    pending: VecDeque<Result<StreamEvent, LlmError>>,
    parse: F,
    finished: bool,
}

/// Turn a streaming HTTP response into provider-neutral events.
///
/// `parse` maps one `data:` payload to zero or more events. The stream ends
/// after `StreamEvent::Done` or the first error; a body that closes before
/// `Done` yields a `MalformedResponse` error so a truncated answer is never
/// mistaken for a complete one.
pub fn event_stream<F>(response: reqwest::Response, timeout: Duration, parse: F) -> CompletionStream
where
    F: FnMut(&str) -> Result<Vec<StreamEvent>, LlmError> + Send + 'static,
{
    let bytes = response
        .bytes_stream()
        .map(move |chunk| {
            chunk
                .map(|b| b.to_vec())
                .map_err(|e| LlmError::from_reqwest(e, timeout))
        })
        .boxed();

    decode_events(bytes, parse)
}

/// Decode an already-mapped byte stream
pub fn decode_events<F>(bytes: BoxStream<'static, Result<Vec<u8>, LlmError>>, parse: F) -> CompletionStream
where
    F: FnMut(&str) -> Result<Vec<StreamEvent>, LlmError> + Send + 'static,
{
    let state = SseState {
        bytes,
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        parse,
        finished: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(item) = st.pending.pop_front() {
                if item.is_err() {
                    st.finished = true;
                    st.pending.clear();
                }
                return Some((item, st));
            }
            if st.finished {
                return None;
            }

            match st.bytes.next().await {
                Some(Ok(chunk)) => {
                    for payload in st.decoder.push(&chunk) {
                        match (st.parse)(&payload) {
                            Ok(events) => {
                                for event in events {
                                    let done = event == StreamEvent::Done;
                                    st.pending.push_back(Ok(event));
                                    if done {
                                        st.finished = true;
                                        break;
                                    }
                                }
                            }
                            Err(e) => {
                                st.pending.push_back(Err(e));
                                break;
                            }
                        }
                        if st.finished {
                            break;
                        }
                    }
                }
                Some(Err(e)) => st.pending.push_back(Err(e)),
                None => {
                    st.pending.push_back(Err(LlmError::MalformedResponse(
                        "stream closed before completion".to_string(),
                    )));
                }
            }
        }
    })
    .boxed()
}
