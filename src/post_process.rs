//! Post-processing: file dates and playlists
//!
//! Setting modification times is best effort per file. Playlist writes are not: a data
//! directory we cannot write to is a fatal condition for the run.

use crate::catalog::Catalog;
use crate::error::Result;
use crate::types::SeriesAggregate;
use crate::utils::remove_if_exists;
use chrono::{DateTime, FixedOffset};
use std::fs::FileTimes;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Extension of generated playlists
pub const PLAYLIST_EXTENSION: &str = "m3u";

/// Extension used by older releases; such files are removed on every run
pub const LEGACY_PLAYLIST_EXTENSION: &str = "m3u8";

/// Parse a feed publication date (RFC 2822, e.g. `Mon, 01 Jan 2024 12:00:00 +0000`)
pub fn parse_pub_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc2822(raw.trim()).ok()
}

/// Outcome of [`set_file_dates`]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DateReport {
    /// Files whose modification time was set
    pub updated: usize,
    /// Files skipped because of a missing/unparseable date or an I/O failure
    pub failed: Vec<PathBuf>,
}

/// Set the modification time of every present entry to its publication date
///
/// Access times are reset to the Unix epoch. Failures are logged and collected; they never
/// stop the remaining files from being processed.
pub async fn set_file_dates(catalog: &Catalog) -> DateReport {
    let mut jobs = Vec::new();
    let mut report = DateReport::default();

    for entry in catalog.entries().filter(|e| e.present) {
        match entry.pub_date.as_deref().and_then(parse_pub_date) {
            Some(date) => jobs.push((entry.local_path.clone(), SystemTime::from(date))),
            None => {
                warn!(
                    title = entry.title.as_str(),
                    pub_date = entry.pub_date.as_deref().unwrap_or(""),
                    "cannot parse publication date, leaving file date unchanged"
                );
                report.failed.push(entry.local_path.clone());
            }
        }
    }

    let results = tokio::task::spawn_blocking(move || {
        jobs.into_iter()
            .map(|(path, mtime)| {
                let result = set_file_mtime(&path, mtime);
                (path, result)
            })
            .collect::<Vec<_>>()
    })
    .await;

    match results {
        Ok(results) => {
            for (path, result) in results {
                match result {
                    Ok(()) => report.updated += 1,
                    Err(e) => {
                        warn!(?path, error = %e, "failed to set file date");
                        report.failed.push(path);
                    }
                }
            }
        }
        Err(e) => warn!(error = %e, "file date task failed"),
    }

    debug!(updated = report.updated, failed = report.failed.len(), "file dates set");
    report
}

fn set_file_mtime(path: &Path, mtime: SystemTime) -> std::io::Result<()> {
    // owning the file is enough on Unix, so read-only episodes keep working
    #[cfg(unix)]
    let file = std::fs::File::open(path)?;
    #[cfg(not(unix))]
    let file = std::fs::File::options().write(true).open(path)?;
    file.set_times(FileTimes::new().set_accessed(UNIX_EPOCH).set_modified(mtime))
}

/// `<data_dir>/<series>.m3u`
pub fn playlist_path(data_dir: &Path, series: &str) -> PathBuf {
    data_dir.join(format!("{}.{}", series, PLAYLIST_EXTENSION))
}

fn legacy_playlist_path(data_dir: &Path, series: &str) -> PathBuf {
    data_dir.join(format!("{}.{}", series, LEGACY_PLAYLIST_EXTENSION))
}

/// Path of `path` relative to `data_dir`, always with `/` separators
pub fn relative_media_path(data_dir: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(data_dir).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Extended M3U listing the present entries of one series in stored order
pub fn render_playlist(series: &SeriesAggregate, data_dir: &Path) -> String {
    let mut out = String::from("#EXTM3U\r\n");
    for entry in series.entries.iter().filter(|e| e.present) {
        out.push_str("#EXTINF:0,");
        out.push_str(&entry.title);
        out.push_str("\r\n");
        out.push_str(&relative_media_path(data_dir, &entry.local_path));
        out.push_str("\r\n");
    }
    out
}

/// Outcome of [`update_playlists`]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlaylistReport {
    /// Playlists (re)written
    pub written: Vec<PathBuf>,
    /// Playlist files deleted
    pub removed: Vec<PathBuf>,
}

/// Write one playlist per series with present entries and remove stale ones
///
/// With `enabled == false` every series playlist is removed instead. Playlists from older
/// releases (`.m3u8`) are always removed.
///
/// # Errors
/// Returns an I/O error if a playlist cannot be written or removed
pub async fn update_playlists(catalog: &Catalog, enabled: bool) -> Result<PlaylistReport> {
    let data_dir = catalog.data_dir();
    let mut report = PlaylistReport::default();

    for series in &catalog.series {
        let legacy = legacy_playlist_path(data_dir, &series.name);
        if remove_if_exists(&legacy).await? {
            report.removed.push(legacy);
        }

        let path = playlist_path(data_dir, &series.name);
        if !enabled || series.present_count == 0 {
            if remove_if_exists(&path).await? {
                debug!(?path, "removed playlist");
                report.removed.push(path);
            }
            continue;
        }

        tokio::fs::write(&path, render_playlist(series, data_dir)).await?;
        debug!(?path, entries = series.present_count, "wrote playlist");
        report.written.push(path);
    }

    info!(
        written = report.written.len(),
        removed = report.removed.len(),
        "playlists updated"
    );
    Ok(report)
}
