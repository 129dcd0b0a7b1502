
use crate::error::{Result, SupervisorError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Upper bound for a single read from a child's output pipe
pub const MAX_LOG_CHUNK_LEN: usize = 16 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl std::fmt::Display for OutputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputStream::Stdout => write!(f, "stdout"),
            OutputStream::Stderr => write!(f, "stderr"),
        }
    }
}

/// One line (or chunk) of child output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub component: String,
    pub stream: OutputStream,
    pub message: String,
}

impl LogLine {
    pub fn new(component: &str, stream: OutputStream, message: &str) -> Self {
        Self {
            component: component.to_string(),
            stream,
            message: message.to_string(),
        }
    }
}

/// Destination for relayed child output
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LogSink: Send + Sync {
    async fn write_line(&self, line: LogLine) -> Result<()>;
}

/// Forwards child output into the tracing pipeline
#[derive(Debug, Default, Clone)]
pub struct TracingLogSink;

#[async_trait]
impl LogSink for TracingLogSink {
    async fn write_line(&self, line: LogLine) -> Result<()> {
        info!(
            target: "child_output",
            component = %line.component,
            stream = %line.stream,
            "{}",
            line.message
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub stream: OutputStream,
    pub component: String,
    pub message: String,
}

/// Appends child output as JSON lines to `<dir>/<component>.log`
pub struct FileLogSink {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileLogSink {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            write_lock: Mutex::new(()),
        }
    }

    pub fn log_file_path(&self, component: &str) -> PathBuf {
        self.dir.join(format!("{component}.log"))
    }

    /// Read entries back, keeping only the last `max_lines` if given
    pub async fn read_logs(&self, component: &str, max_lines: Option<usize>) -> Result<Vec<LogEntry>> {
        let path = self.log_file_path(component);
        let file = match File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(SupervisorError::IoError(e)),
        };

        let mut lines = BufReader::new(file).lines();
        let mut entries = Vec::new();
        while let Some(line) = lines.next_line().await? {
            if let Ok(entry) = serde_json::from_str::<LogEntry>(line.trim()) {
                entries.push(entry);
            }
        }

        if let Some(max) = max_lines {
            if entries.len() > max {
                entries.drain(..entries.len() - max);
            }
        }

        Ok(entries)
    }
}

#[async_trait]
impl LogSink for FileLogSink {
    async fn write_line(&self, line: LogLine) -> Result<()> {
        let entry = LogEntry {
            timestamp: Utc::now(),
            stream: line.stream,
            component: line.component,
            message: line.message,
        };
        let json_line = serde_json::to_string(&entry).map_err(|e| {
            SupervisorError::SerializationError(format!("Failed to serialize log entry: {e}"))
        })?;

        let _guard = self.write_lock.lock().await;
        tokio::fs::create_dir_all(&self.dir).await?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_file_path(&entry.component))
            .await?;
        file.write_all(format!("{json_line}\n").as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Relay `stream` into `sink` until EOF.
///
/// Reads at most [`MAX_LOG_CHUNK_LEN`] bytes at a time. Complete lines are
/// emitted one by one; a full buffer without a newline is emitted as is.
pub async fn relay_output<R>(
    mut stream: R,
    component: String,
    kind: OutputStream,
    sink: Arc<dyn LogSink>,
) where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; MAX_LOG_CHUNK_LEN];
    let mut filled = 0;

    loop {
        let n = match stream.read(&mut buf[filled..]).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                warn!(component = %component, stream = %kind, "Failed to read output: {}", e);
                break;
            }
        };
        filled += n;

        let mut start = 0;
        while let Some(pos) = buf[start..filled].iter().position(|b| *b == b'\n') {
            emit(&*sink, &component, kind, &buf[start..start + pos]).await;
            start += pos + 1;
        }

        if start == 0 && filled == buf.len() {
            emit(&*sink, &component, kind, &buf[..filled]).await;
            filled = 0;
        } else if start > 0 {
            buf.copy_within(start..filled, 0);
            filled -= start;
        }
    }

    if filled > 0 {
        emit(&*sink, &component, kind, &buf[..filled]).await;
    }
}

async fn emit(sink: &dyn LogSink, component: &str, kind: OutputStream, raw: &[u8]) {
    let text = String::from_utf8_lossy(raw);
    let message = text.trim_end_matches('\r');
    if message.is_empty() {
        return;
    }

    if let Err(e) = sink.write_line(LogLine::new(component, kind, message)).await {
        warn!(component = %component, stream = %kind, "Failed to relay output: {}", e);
    }
}
