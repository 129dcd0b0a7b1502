use crate::error::Result;
use crate::process::{LogLine, LogSink};
use async_trait::async_trait;
use std::sync::{Mutex as StdMutex, MutexGuard};
use std::time::Duration;

/// Log sink that keeps every relayed line in memory
#[derive(Debug, Default)]
pub struct MemoryLogSink {
    lines: StdMutex<Vec<LogLine>>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<LogLine>> {
        self.lines.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn lines(&self) -> Vec<LogLine> {
        self.lock().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.lock().iter().map(|l| l.message.clone()).collect()
    }

    pub fn count_matching(&self, needle: &str) -> usize {
        self.lock()
            .iter()
            .filter(|l| l.message.contains(needle))
            .count()
    }

    /// Poll until a line containing `needle` shows up or `timeout` passes
    pub async fn wait_for_message(&self, needle: &str, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.count_matching(needle) > 0 {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

#[async_trait]
impl LogSink for MemoryLogSink {
    async fn write_line(&self, line: LogLine) -> Result<()> {
        self.lock().push(line);
        Ok(())
    }
}
