//! Splits the raw byte stream into complete JSON messages.
//!
//! The kiosk writes bare JSON objects with no length prefix or newline
//! contract, and the kernel is free to split or coalesce them arbitrarily.
//! Incoming bytes are accumulated until a balanced top-level object is seen.

use tracing::warn;

enum Scan {
    /// The object is still open; wait for more bytes.
    NeedMore,
    /// A balanced object ends at this buffer index (exclusive).
    Complete(usize),
}

/// Accumulates stream bytes and yields one complete JSON object at a time.
#[derive(Debug)]
pub(crate) struct FrameBuffer {
    buf: Vec<u8>,
    /// Scan resume point; everything before it has already been walked.
    pos: usize,
    depth: u32,
    in_string: bool,
    escaped: bool,
    max_frame_bytes: usize,
}

impl FrameBuffer {
    pub(crate) fn new(max_frame_bytes: usize) -> Self {
        Self {
            buf: Vec::new(),
            pos: 0,
            depth: 0,
            in_string: false,
            escaped: false,
            max_frame_bytes,
        }
    }

    /// Appends freshly received bytes and returns every frame they complete.
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        self.buf.extend_from_slice(bytes);
        let mut frames = Vec::new();

        loop {
            if self.depth == 0 && !self.align_to_object_start() {
                break;
            }

            match self.scan() {
                Scan::NeedMore => {
                    if self.buf.len() > self.max_frame_bytes {
                        warn!(
                            limit = self.max_frame_bytes,
                            "incoming message exceeds frame limit, discarding"
                        );
                        self.reset();
                    }
                    break;
                }
                Scan::Complete(end) => {
                    if end > self.max_frame_bytes {
                        warn!(
                            size = end,
                            limit = self.max_frame_bytes,
                            "incoming message exceeds frame limit, discarding"
                        );
                        self.buf.drain(..end);
                    } else {
                        frames.push(self.buf.drain(..end).collect());
                    }
                    self.pos = 0;
                }
            }
        }

        frames
    }

    /// Drops whitespace and stray bytes so the buffer starts at `{`.
    /// Returns false when no object start is buffered yet.
    fn align_to_object_start(&mut self) -> bool {
        let ws = self
            .buf
            .iter()
            .take_while(|b| b.is_ascii_whitespace())
            .count();
        self.buf.drain(..ws);

        if !self.buf.is_empty() && self.buf[0] != b'{' {
            let skipped = self
                .buf
                .iter()
                .position(|&b| b == b'{')
                .unwrap_or(self.buf.len());
            warn!(skipped, "discarding bytes outside any JSON frame");
            self.buf.drain(..skipped);
        }

        self.pos = 0;
        !self.buf.is_empty()
    }

    fn scan(&mut self) -> Scan {
        while self.pos < self.buf.len() {
            let byte = self.buf[self.pos];
            self.pos += 1;

            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if byte == b'\\' {
                    self.escaped = true;
                } else if byte == b'"' {
                    self.in_string = false;
                }
                continue;
            }

            match byte {
                b'"' => self.in_string = true,
                b'{' => self.depth += 1,
                b'}' => {
                    self.depth -= 1;
                    if self.depth == 0 {
                        return Scan::Complete(self.pos);
                    }
                }
                _ => {}
            }
        }

        Scan::NeedMore
    }

    fn reset(&mut self) {
        self.buf.clear();
        self.pos = 0;
        self.depth = 0;
        self.in_string = false;
        self.escaped = false;
    }
}
