//! Pending-bytes buffer that turns arbitrary chunks into complete lines.

/// Default cap for a single buffered line.
pub const DEFAULT_MAX_LINE_BYTES: usize = 8 * 1024 * 1024;

/// Splits incoming chunks on `\n`, keeping the trailing partial line
/// until more bytes arrive.
///
/// Works on raw bytes so a multi-byte character split across chunks is
/// reassembled before anyone decodes it.
#[derive(Debug)]
pub struct LineBuffer {
    pending: Vec<u8>,
    max_line_bytes: usize,
    discarding: bool,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE_BYTES)
    }
}

impl LineBuffer {
    pub fn new(max_line_bytes: usize) -> Self {
        Self {
            pending: Vec::new(),
            max_line_bytes,
            discarding: false,
        }
    }

    /// Feed a chunk, returning every line it completes (without `\n`).
    ///
    /// A line longer than `max_line_bytes` is dropped whole.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        let mut lines = Vec::new();
        let mut rest = chunk;

        while let Some(pos) = rest.iter().position(|b| *b == b'\n') {
            let (head, tail) = rest.split_at(pos);
            rest = &tail[1..];

            if self.discarding {
                self.discarding = false;
                continue;
            }
            self.pending.extend_from_slice(head);
            if self.pending.len() > self.max_line_bytes {
                tracing::debug!(len = self.pending.len(), "dropping oversized line");
                self.pending.clear();
                continue;
            }
            lines.push(std::mem::take(&mut self.pending));
        }

        if !self.discarding {
            self.pending.extend_from_slice(rest);
            if self.pending.len() > self.max_line_bytes {
                tracing::warn!(
                    len = self.pending.len(),
                    max = self.max_line_bytes,
                    "line exceeds buffer cap, discarding until next newline"
                );
                self.pending.clear();
                self.discarding = true;
            }
        }

        lines
    }

    /// Take whatever remains once the source is exhausted.
    pub fn finish(&mut self) -> Option<Vec<u8>> {
        if std::mem::take(&mut self.discarding) || self.pending.is_empty() {
            self.pending.clear();
            return None;
        }
        Some(std::mem::take(&mut self.pending))
    }

    /// Bytes currently held back waiting for a newline.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
