//! Streaming HTTP downloader
//!
//! Downloads one URL into one file. The destination is owned by a [`PartialFile`] guard for
//! the whole transfer and deleted unless the body was written completely, whether the
//! transfer fails, is cancelled, or the future is simply dropped. A later run therefore never
//! finds a truncated file that looks complete.

use crate::config::HttpConfig;
use crate::error::{DownloadError, Error, Result};
use crate::utils::{ensure_dir, format_size};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use reqwest::header::ACCEPT_ENCODING;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Whether transfer progress is drawn on the terminal
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgressMode {
    /// No output (feed fetches, tests)
    Hidden,
    /// Single progress line on stdout, redrawn in place after every chunk
    Terminal,
}

/// Cumulative transfer state used to render the progress line
#[derive(Clone, Debug)]
pub struct TransferProgress {
    started: Option<Instant>,
    downloaded: u64,
    total: Option<u64>,
}

impl TransferProgress {
    /// Start tracking a transfer; `total` comes from `Content-Length` when known
    pub fn new(total: Option<u64>) -> Self {
        Self {
            started: None,
            downloaded: 0,
            total,
        }
    }

    /// Account for a written chunk; the clock starts at the first chunk
    pub fn record(&mut self, bytes: u64, now: Instant) {
        self.started.get_or_insert(now);
        self.downloaded += bytes;
    }

    /// Bytes written so far
    pub fn downloaded(&self) -> u64 {
        self.downloaded
    }

    /// Percentage complete, `None` when the total size is unknown
    pub fn percent(&self) -> Option<f64> {
        match self.total {
            Some(0) => Some(100.0),
            Some(total) => Some(self.downloaded.min(total) as f64 * 100.0 / total as f64),
            None => None,
        }
    }

    /// Average rate in bytes per second since the first chunk
    pub fn rate(&self, now: Instant) -> u64 {
        let Some(started) = self.started else {
            return 0;
        };
        let elapsed = now.saturating_duration_since(started).as_secs_f64();
        if elapsed <= 0.0 {
            return 0;
        }
        (self.downloaded as f64 / elapsed) as u64
    }

    /// Progress line, e.g. `  41.20%   412.0 KB / 1000.0 KB   80.0 KB/s`
    pub fn render(&self, now: Instant) -> String {
        match (self.total, self.percent()) {
            (Some(total), Some(percent)) => format!(
                "  {:.2}%   {} / {}   {}/s",
                percent,
                format_size(self.downloaded.min(total)),
                format_size(total),
                format_size(self.rate(now)),
            ),
            _ => format!("  ???%   {} / ???", format_size(self.downloaded)),
        }
    }
}

/// Deletes the file at `path` on drop unless [`commit`](Self::commit) was called
#[derive(Debug)]
pub struct PartialFile {
    path: PathBuf,
    armed: bool,
}

impl PartialFile {
    /// Take ownership of `path` for the duration of a write
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            armed: true,
        }
    }

    /// The write completed; keep the file
    pub fn commit(mut self) {
        self.armed = false;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = ?self.path, "removed partial file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = ?self.path, error = %e, "failed to remove partial file"),
        }
    }
}

/// Clears the progress line however the transfer ends
struct ProgressLine(ProgressBar);

impl ProgressLine {
    fn new(mode: ProgressMode) -> Self {
        let bar = match mode {
            ProgressMode::Hidden => ProgressBar::hidden(),
            ProgressMode::Terminal => {
                let bar = ProgressBar::with_draw_target(None, ProgressDrawTarget::stdout());
                bar.set_style(
                    ProgressStyle::with_template("{msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                bar
            }
        };
        Self(bar)
    }

    fn update(&self, progress: &TransferProgress) {
        if !self.0.is_hidden() {
            self.0.set_message(progress.render(Instant::now()));
        }
    }
}

impl Drop for ProgressLine {
    fn drop(&mut self) {
        self.0.finish_and_clear();
    }
}

/// Sequential HTTP downloader shared by the feed fetcher and the episode loop
#[derive(Clone, Debug)]
pub struct Downloader {
    client: reqwest::Client,
    chunk_size: usize,
}

impl Downloader {
    /// Build the HTTP client
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(http: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(http.connect_timeout)
            .user_agent(http.user_agent.as_str())
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            chunk_size: http.chunk_size.max(1),
        })
    }

    /// Stream `url` into `dest`, replacing any existing file
    ///
    /// Returns the number of bytes written. On HTTP error status nothing is written and an
    /// existing file at `dest` is left alone. Once the body starts, any failure or a
    /// cancellation of `cancel` removes `dest` before returning.
    ///
    /// # Errors
    /// - [`DownloadError::HttpStatus`] for 4xx/5xx responses
    /// - [`DownloadError::Stream`] if the body breaks off
    /// - [`Error::Interrupted`] when `cancel` fires
    /// - [`Error::Network`] / [`Error::Io`] for connection and disk failures
    pub async fn download(
        &self,
        url: &str,
        dest: &Path,
        mode: ProgressMode,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        let request = self.client.get(url).header(ACCEPT_ENCODING, "").send();
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(interrupted()),
            response = request => response?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            }
            .into());
        }

        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            ensure_dir(parent).await?;
        }

        // declared before the file so the handle is closed before the guard deletes it
        let guard = PartialFile::new(dest);
        let mut file = tokio::fs::File::create(dest).await?;
        let mut progress = TransferProgress::new(response.content_length());
        let line = ProgressLine::new(mode);
        line.update(&progress);

        let mut stream = response.bytes_stream();
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(url, ?dest, "download interrupted");
                    return Err(interrupted());
                }
                next = stream.next() => next,
            };
            let Some(chunk) = next else { break };
            let chunk = chunk.map_err(|e| DownloadError::Stream {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

            for piece in chunk.chunks(self.chunk_size) {
                file.write_all(piece).await?;
                progress.record(piece.len() as u64, Instant::now());
                line.update(&progress);
            }
        }

        file.flush().await?;
        drop(file);
        guard.commit();

        debug!(url, ?dest, bytes = progress.downloaded(), "download complete");
        Ok(progress.downloaded())
    }
}

fn interrupted() -> Error {
    Error::Interrupted {
        signal: "cancelled".to_string(),
    }
}
