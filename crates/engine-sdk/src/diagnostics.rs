//! Per-call diagnostics sink.
//!
//! Engines write warnings and incidental output here instead of stdout. The
//! host opens one sink per contained call, forwards its contents to the log
//! once the call ends, and never lets any of it reach the response body.

use std::fmt;
use std::io;
use std::sync::Arc;

use parking_lot::Mutex;

/// Severity of a captured diagnostic line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Debug,
    Notice,
    Warning,
}

/// A single captured diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub level: Level,
    pub message: String,
}

#[derive(Debug, Default)]
struct Buffer {
    entries: Vec<Entry>,
    bytes: usize,
    dropped: usize,
    /// Partial line accumulated through the `io::Write`/`fmt::Write` impls.
    pending: String,
}

/// Shared, size-capped diagnostics buffer.
///
/// Cloning is cheap; all clones write into the same buffer. Entries beyond
/// the byte cap are counted but not stored.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    inner: Arc<Mutex<Buffer>>,
    max_bytes: usize,
}

impl Diagnostics {
    /// Create an empty sink holding at most `max_bytes` of message text.
    pub fn new(max_bytes: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Buffer::default())),
            max_bytes,
        }
    }

    /// Record a diagnostic at the given level.
    pub fn push(&self, level: Level, message: impl Into<String>) {
        let message = message.into();
        let mut buf = self.inner.lock();
        Self::store(&mut buf, self.max_bytes, level, message);
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.push(Level::Debug, message);
    }

    pub fn notice(&self, message: impl Into<String>) {
        self.push(Level::Notice, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.push(Level::Warning, message);
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of entries discarded because the cap was reached.
    pub fn dropped(&self) -> usize {
        self.inner.lock().dropped
    }

    /// Take every captured entry, leaving the sink empty.
    ///
    /// A trailing partial line written through `io::Write` is flushed as a
    /// notice first.
    pub fn drain(&self) -> (Vec<Entry>, usize) {
        let mut buf = self.inner.lock();
        if !buf.pending.is_empty() {
            let line = std::mem::take(&mut buf.pending);
            Self::store(&mut buf, self.max_bytes, Level::Notice, line);
        }
        let entries = std::mem::take(&mut buf.entries);
        let dropped = std::mem::take(&mut buf.dropped);
        buf.bytes = 0;
        (entries, dropped)
    }

    fn store(buf: &mut Buffer, max_bytes: usize, level: Level, message: String) {
        if buf.bytes + message.len() > max_bytes {
            buf.dropped += 1;
            return;
        }
        buf.bytes += message.len();
        buf.entries.push(Entry { level, message });
    }

    fn write_text(&self, text: &str) {
        let mut buf = self.inner.lock();
        buf.pending.push_str(text);
        while let Some(pos) = buf.pending.find('\n') {
            let line: String = buf.pending.drain(..=pos).collect();
            let line = line.trim_end_matches(['\r', '\n']).to_string();
            if !line.is_empty() {
                Self::store(&mut buf, self.max_bytes, Level::Notice, line);
            }
        }
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new(64 * 1024)
    }
}

/// Lets engines `write!` stray output into the sink.
impl io::Write for Diagnostics {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.write_text(&String::from_utf8_lossy(data));
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl fmt::Write for Diagnostics {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write_text(s);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn clones_share_buffer() {
        let sink = Diagnostics::new(1024);
        let clone = sink.clone();
        clone.warn("undefined index: q");
        sink.notice("deprecated call");

        let (entries, dropped) = sink.drain();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].level, Level::Warning);
        assert_eq!(dropped, 0);
        assert!(sink.is_empty());
    }

    #[test]
    fn cap_drops_and_counts() {
        let sink = Diagnostics::new(10);
        sink.warn("12345");
        sink.warn("67890");
        sink.warn("overflow");

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.dropped(), 1);
    }

    #[test]
    fn io_write_splits_lines() {
        let mut sink = Diagnostics::new(1024);
        write!(sink, "first line\nsecond ").unwrap();
        writeln!(sink, "half").unwrap();
        write!(sink, "trailing").unwrap();

        let (entries, _) = sink.drain();
        let messages: Vec<_> = entries.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["first line", "second half", "trailing"]);
    }
}
