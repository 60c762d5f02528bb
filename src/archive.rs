//! Secondary archival source
//!
//! Fan-made legacy episodes are not in the feed; they are pulled from a video playlist
//! by an external extraction tool. The core only needs the list of files the tool
//! produced, so the tool sits behind [`ArchiveSource`].

use crate::config::ArchiveConfig;
use crate::error::{Error, Result};
use crate::post_process::relative_media_path;
use crate::utils::ensure_dir;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// A source that materialises media files into a directory
#[async_trait]
pub trait ArchiveSource: Send + Sync {
    /// Fetch everything into `target_dir` and return the produced files, in order
    ///
    /// Stops early with [`Error::Interrupted`] when `cancel` fires.
    async fn fetch(&self, target_dir: &Path, cancel: &CancellationToken) -> Result<Vec<PathBuf>>;

    /// Short name used in logs
    fn name(&self) -> &'static str;
}

/// Audio extraction through the `yt-dlp` binary
#[derive(Clone, Debug)]
pub struct YtDlpSource {
    binary_path: PathBuf,
    url: String,
    ogg: bool,
}

impl YtDlpSource {
    /// Create a source with an explicit binary path
    pub fn new(binary_path: PathBuf, url: impl Into<String>, ogg: bool) -> Self {
        Self {
            binary_path,
            url: url.into(),
            ogg,
        }
    }

    /// Look the configured tool up in PATH
    ///
    /// # Errors
    /// Returns [`Error::NotSupported`] if the binary cannot be found
    pub fn from_config(config: &ArchiveConfig) -> Result<Self> {
        let binary_path = which::which(&config.tool).map_err(|_| {
            Error::NotSupported(format!(
                "'{}' is required to download legacy episodes, install it and make sure it is in PATH",
                config.tool
            ))
        })?;
        Ok(Self::new(binary_path, config.url.as_str(), config.ogg))
    }

    /// Extension the extracted audio ends up with
    pub fn expected_extension(&self) -> &'static str {
        if self.ogg { "ogg" } else { "opus" }
    }

    fn codec(&self) -> &'static str {
        if self.ogg { "vorbis" } else { "opus" }
    }

    fn args(&self) -> Vec<String> {
        vec![
            "--format".into(),
            "bestaudio/best".into(),
            "--extract-audio".into(),
            "--audio-format".into(),
            self.codec().into(),
            "--audio-quality".into(),
            "0".into(),
            "--keep-video".into(),
            "--no-post-overwrites".into(),
            "--no-progress".into(),
            "--print".into(),
            "after_move:filepath".into(),
            self.url.clone(),
        ]
    }

    /// Map one reported output path to the audio file inside `target_dir`
    ///
    /// Without overwriting, the tool sometimes reports the pre-extraction name; the
    /// extension is corrected so the listed file is the extracted audio.
    fn produced_file(&self, target_dir: &Path, line: &str) -> Option<PathBuf> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let name = Path::new(line).file_name()?;
        let mut path = target_dir.join(name);
        let expected = self.expected_extension();
        if path.extension().and_then(|e| e.to_str()) != Some(expected) {
            path.set_extension(expected);
        }
        Some(path)
    }
}

#[async_trait]
impl ArchiveSource for YtDlpSource {
    async fn fetch(&self, target_dir: &Path, cancel: &CancellationToken) -> Result<Vec<PathBuf>> {
        ensure_dir(target_dir).await?;
        debug!(binary = ?self.binary_path, url = self.url.as_str(), ?target_dir, "starting extraction");

        let mut child = Command::new(&self.binary_path)
            .args(self.args())
            .current_dir(target_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::ExternalTool(format!("Failed to execute yt-dlp: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::ExternalTool("yt-dlp output not captured".into()))?;
        let mut lines = BufReader::new(stdout).lines();

        let mut files = Vec::new();
        loop {
            let line = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("extraction interrupted");
                    return Err(Error::Interrupted { signal: "cancelled".into() });
                }
                line = lines.next_line() => line?,
            };
            let Some(line) = line else { break };
            if let Some(path) = self.produced_file(target_dir, &line) {
                info!(?path, "extracted");
                files.push(path);
            }
        }

        let status = child.wait().await?;
        if !status.success() {
            return Err(Error::ExternalTool(format!("yt-dlp exited with {}", status)));
        }
        Ok(files)
    }

    fn name(&self) -> &'static str {
        "yt-dlp"
    }
}

/// Write `<data_dir>/<name>.m3u` listing `files`, which live under `<data_dir>/<name>/`
///
/// Entries are titled by file name.
pub async fn write_archive_playlist(
    data_dir: &Path,
    name: &str,
    files: &[PathBuf],
) -> Result<PathBuf> {
    let mut out = String::from("#EXTM3U\r\n");
    for file in files {
        let title = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        out.push_str("#EXTINF:0,");
        out.push_str(&title);
        out.push_str("\r\n");
        out.push_str(&relative_media_path(data_dir, file));
        out.push_str("\r\n");
    }

    let path = crate::post_process::playlist_path(data_dir, name);
    tokio::fs::write(&path, out).await?;
    debug!(?path, entries = files.len(), "wrote archive playlist");
    Ok(path)
}
