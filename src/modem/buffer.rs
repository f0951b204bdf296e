use std::borrow::Cow;

/// Accumulates raw serial bytes for one exchange with the modem.
pub struct ResponseBuffer {
    raw: Vec<u8>,
    max_buffer_size: usize,
}

impl ResponseBuffer {
    pub fn new() -> Self {
        Self::with_max_size(4096)
    }

    pub fn with_max_size(size: usize) -> Self {
        Self {
            raw: Vec::new(),
            max_buffer_size: size,
        }
    }

    pub fn push(&mut self, data: &[u8]) {
        self.raw.extend_from_slice(data);

        // Prevent unbounded growth, keeping only the most recent bytes.
        if self.raw.len() > self.max_buffer_size {
            let keep_from = self.raw.len() - self.max_buffer_size;
            self.raw.drain(..keep_from);
        }
    }

    /// Lossy text view, invalid UTF-8 is replaced rather than rejected.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.raw)
    }

    /// Non-empty trimmed lines, treating any run of CR/LF as one separator.
    pub fn lines(&self) -> Vec<String> {
        self.text()
            .split(['\r', '\n'])
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// A '>' data prompt at the start of a line.
    pub fn has_prompt(&self) -> bool {
        self.text()
            .split(['\r', '\n'])
            .any(|line| line.trim_start().starts_with('>'))
    }
}
