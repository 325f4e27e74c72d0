//! Chat log sink: receives finalized lines for append-only persistence.
//!
//! The relay never waits on the log. [`ChatLog::append`] is synchronous
//! and must return immediately, because sessions call it while holding
//! the roster lock (so the log order matches what clients saw).

use std::path::Path;

use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

/// Somewhere finalized chat lines go.
pub trait ChatLog: Send + Sync + 'static {
    /// Records one line. Must not block.
    fn append(&self, line: &str);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullChatLog;

impl ChatLog for NullChatLog {
    fn append(&self, _line: &str) {}
}

/// Appends lines to a file from a background task.
///
/// Lines are queued on a channel and written in order; a write failure is
/// logged and stops the writer, after which lines are dropped.
#[derive(Debug, Clone)]
pub struct FileChatLog {
    tx: mpsc::UnboundedSender<String>,
}

impl FileChatLog {
    /// Opens (or creates) `path` for appending and starts the writer task.
    pub async fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        tracing::info!(path = %path.display(), "chat log opened");

        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        tokio::spawn(async move {
            while let Some(mut line) = rx.recv().await {
                line.push('\n');
                if let Err(e) = write_line(&mut file, &line).await {
                    tracing::error!(path = %path.display(), error = %e, "chat log write failed");
                    break;
                }
            }
        });

        Ok(Self { tx })
    }
}

async fn write_line(file: &mut tokio::fs::File, line: &str) -> std::io::Result<()> {
    file.write_all(line.as_bytes()).await?;
    file.flush().await
}

impl ChatLog for FileChatLog {
    fn append(&self, line: &str) {
        if self.tx.send(line.to_string()).is_err() {
            tracing::debug!("chat log closed, dropping line");
        }
    }
}
