use crate::error::{Result, SupervisorError};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Mode for runtime-owned PID files
pub const PID_FILE_MODE: u32 = 0o644;

/// `<run-dir>/<component>.pid`, holding the decimal PID of the supervised
/// child followed by a newline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn new(run_dir: &Path, component: &str) -> Self {
        Self {
            path: run_dir.join(format!("{component}.pid")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored PID. A missing file yields `None`; anything that is
    /// not a positive decimal integer is an error.
    pub async fn read(&self) -> Result<Option<u32>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SupervisorError::PidFileError(format!(
                    "failed to read PID file {}: {e}",
                    self.path.display()
                )));
            }
        };

        parse_pid(&content)
            .map(Some)
            .map_err(|reason| {
                SupervisorError::PidFileError(format!(
                    "failed to parse PID file {}: {reason}",
                    self.path.display()
                ))
            })
    }

    pub async fn write(&self, pid: u32) -> Result<()> {
        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(PID_FILE_MODE);

        let mut file = options.open(&self.path).await?;
        file.write_all(format!("{pid}\n").as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Remove the file; a file that is already gone is fine.
    pub async fn remove(&self) {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => debug!("Removed PID file {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove PID file {}: {}", self.path.display(), e),
        }
    }
}

fn parse_pid(content: &str) -> std::result::Result<u32, String> {
    let value = content.strip_suffix('\n').unwrap_or(content);
    let pid: u32 = value
        .parse()
        .map_err(|e| format!("{value:?} is not a decimal PID: {e}"))?;
    if pid == 0 {
        return Err("PID 0 does not identify a single process".to_string());
    }
    Ok(pid)
}
