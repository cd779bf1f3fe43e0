//! Child output capture.
//!
//! Reader tasks drain the child's stdout/stderr pipes line by line and funnel
//! them through a channel into a single writer task that owns the log file
//! handles. With merge_logs set, stderr lines share the stdout destination.

use std::path::Path;

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::ProcessSpec;
use crate::errors::{ProcessError, ProcessResult};

/// Output stream a captured line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSource {
    Stdout,
    Stderr,
}

/// One line of child output
#[derive(Debug, Clone)]
pub struct OutputLine {
    pub source: LogSource,
    pub line: String,
}

/// Routes captured child output into the declared log files
pub struct OutputWriter {
    sender: mpsc::UnboundedSender<OutputLine>,
    writer_task: JoinHandle<()>,
}

impl OutputWriter {
    /// Open the declared log files (append mode, parent directories created)
    /// and start the writer task.
    pub async fn open(spec: &ProcessSpec) -> ProcessResult<Self> {
        let out_file = match &spec.out_file {
            Some(path) => Some(open_log_file(&spec.name, path).await?),
            None => None,
        };
        // With merged logs stderr shares the stdout destination
        let err_file = if spec.merge_logs {
            None
        } else {
            match &spec.error_file {
                Some(path) => Some(open_log_file(&spec.name, path).await?),
                None => None,
            }
        };

        let merge = spec.merge_logs;
        let name = spec.name.clone();
        let (sender, mut receiver) = mpsc::unbounded_channel::<OutputLine>();

        let writer_task = tokio::spawn(async move {
            let mut out_file = out_file;
            let mut err_file = err_file;

            while let Some(entry) = receiver.recv().await {
                let target = match entry.source {
                    LogSource::Stdout => out_file.as_mut(),
                    LogSource::Stderr if merge => out_file.as_mut(),
                    LogSource::Stderr => err_file.as_mut(),
                };

                let Some(file) = target else { continue };
                if let Err(e) = write_line(file, &entry.line).await {
                    warn!("Failed to write log line for {}: {}", name, e);
                }
            }
        });

        Ok(Self {
            sender,
            writer_task,
        })
    }

    /// Spawn a reader task draining one child pipe into the writer
    pub fn spawn_reader<R>(&self, source: LogSource, stream: R) -> JoinHandle<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let sender = self.sender.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stream).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if sender.send(OutputLine { source, line }).is_err() {
                    break;
                }
            }
        })
    }

    /// Close the channel and wait for the writer to drain remaining lines.
    ///
    /// Reader tasks hold sender clones, so the writer only finishes once
    /// every pipe has hit end of file.
    pub async fn finish(self) {
        drop(self.sender);
        if let Err(e) = self.writer_task.await {
            debug!("Log writer task ended abnormally: {}", e);
        }
    }
}

async fn open_log_file(name: &str, path: &Path) -> ProcessResult<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                ProcessError::log_setup(name, path.display().to_string(), e.to_string())
            })?;
        }
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| ProcessError::log_setup(name, path.display().to_string(), e.to_string()))
}

async fn write_line(file: &mut File, line: &str) -> std::io::Result<()> {
    file.write_all(line.as_bytes()).await?;
    file.write_all(b"\n").await?;
    // The child runs unbuffered; keep its log file just as current
    file.flush().await
}
