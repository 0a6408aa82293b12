//! Call-scoped trace collection.
//!
//! A [`TraceCollector`] is created per match computation and threaded
//! explicitly through the call chain, so concurrent calls sharing worker
//! threads can never observe each other's trace lines. Lines are built
//! lazily; a disabled collector costs one branch per note.

#[derive(Debug, Default)]
pub struct TraceCollector {
    enabled: bool,
    lines: Vec<String>,
}

impl TraceCollector {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            lines: Vec::new(),
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record a line; the closure only runs when tracing is enabled
    pub fn note<F>(&mut self, line: F)
    where
        F: FnOnce() -> String,
    {
        if self.enabled {
            self.lines.push(line());
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Consume the collector, yielding the ordered lines
    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}
