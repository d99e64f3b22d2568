//! Buffered decoder for the backend's `text/event-stream` responses
//!
//! The server emits `data:<json>\n\n` events (no space after the colon).
//! Network chunks split events arbitrarily, and because the payloads are
//! Japanese text, multi-byte UTF-8 sequences routinely land on chunk
//! boundaries; both kinds of split are buffered until the next chunk
//! completes them.

/// Buffered SSE decoder yielding the `data` payload of each complete event
#[derive(Debug, Default)]
pub struct SseDecoder {
    /// Decoded text not yet forming a complete event
    buffer: String,
    /// Trailing bytes of an in-progress UTF-8 sequence
    pending_utf8: Vec<u8>,
}

impl SseDecoder {
    /// Create a new decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one network chunk, returning the data payloads of every event it
    /// completes. Incomplete events and incomplete UTF-8 sequences are
    /// buffered for the next call.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        let text = self.decode_chunk(chunk);
        self.buffer.push_str(&text);

        let mut payloads = Vec::new();
        while let Some(event) = self.next_event() {
            if let Some(data) = Self::parse_data(&event) {
                payloads.push(data);
            }
        }
        payloads
    }

    /// Decode the chunk as UTF-8, carrying an incomplete trailing sequence
    /// over to the next call
    fn decode_chunk(&mut self, chunk: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.pending_utf8);
        bytes.extend_from_slice(chunk);

        match std::str::from_utf8(&bytes) {
            Ok(text) => text.to_owned(),
            Err(e) if e.error_len().is_none() => {
                // The tail is the start of a multi-byte character whose
                // remaining bytes are still in flight.
                let tail = bytes[e.valid_up_to()..].to_vec();
                let head = String::from_utf8_lossy(&bytes[..e.valid_up_to()]).into_owned();
                self.pending_utf8 = tail;
                head
            }
            Err(_) => {
                tracing::warn!("invalid UTF-8 in event stream, replacing bad bytes");
                String::from_utf8_lossy(&bytes).into_owned()
            }
        }
    }

    /// Drain and return the next complete event, if one is buffered.
    /// Events end with a blank line: `\n\n` or `\r\n\r\n`.
    fn next_event(&mut self) -> Option<String> {
        let (end, delimiter_len) = match (self.buffer.find("\r\n\r\n"), self.buffer.find("\n\n")) {
            (Some(crlf), Some(lf)) if crlf < lf => (crlf, 4),
            (Some(crlf), None) => (crlf, 4),
            (_, Some(lf)) => (lf, 2),
            (None, None) => return None,
        };
        let event: String = self.buffer.drain(..end).collect();
        self.buffer.drain(..delimiter_len);
        Some(event)
    }

    /// Extract the joined `data` field of one event; events without data
    /// (comments, keep-alives) yield nothing
    fn parse_data(event: &str) -> Option<String> {
        let mut data_lines: Vec<&str> = Vec::new();
        for line in event.lines() {
            if let Some(value) = line.strip_prefix("data:") {
                // At most one leading space is stripped per the SSE spec;
                // this server emits none at all.
                data_lines.push(value.strip_prefix(' ').unwrap_or(value));
            }
            // event:, id:, retry: and comment lines are irrelevant here.
        }
        if data_lines.is_empty() {
            None
        } else {
            Some(data_lines.join("\n"))
        }
    }

    /// Drop all buffered state
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.pending_utf8.clear();
    }

    /// Whether an incomplete event or UTF-8 sequence is buffered
    pub fn has_pending(&self) -> bool {
        !self.buffer.is_empty() || !self.pending_utf8.is_empty()
    }
}
