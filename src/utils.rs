//! Utility functions for sizes, paths and URLs

use std::path::Path;

const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;
const GIB: u64 = 1024 * MIB;

/// Format a byte count as a human-readable string
///
/// Uses binary units with one decimal place above 1 KB.
///
/// # Examples
///
/// ```
/// use yogpod_dl::utils::format_size;
///
/// assert_eq!(format_size(1), "1 byte");
/// assert_eq!(format_size(512), "512 bytes");
/// assert_eq!(format_size(1536), "1.5 KB");
/// assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.0 GB");
/// ```
#[must_use]
pub fn format_size(size: u64) -> String {
    if size >= GIB {
        format!("{:.1} GB", size as f64 / GIB as f64)
    } else if size >= MIB {
        format!("{:.1} MB", size as f64 / MIB as f64)
    } else if size >= KIB {
        format!("{:.1} KB", size as f64 / KIB as f64)
    } else if size == 1 {
        "1 byte".to_string()
    } else {
        format!("{} bytes", size)
    }
}

/// Last segment of a URL's path, or `None` if the URL is invalid or ends with `/`
///
/// The segment is returned as it appears in the URL (no percent-decoding), so the
/// resulting file name is stable across runs.
///
/// # Examples
///
/// ```
/// use yogpod_dl::utils::url_basename;
///
/// assert_eq!(
///     url_basename("http://traffic.libsyn.com/yogpod/YoGPoD_123.mp3?dest-id=1").as_deref(),
///     Some("YoGPoD_123.mp3")
/// );
/// assert_eq!(url_basename("http://example.com/"), None);
/// ```
pub fn url_basename(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let mut segments = parsed.path_segments()?;
    let last = segments.next_back()?;
    if last.is_empty() || last == "." || last == ".." {
        return None;
    }
    Some(last.to_string())
}

/// Create a directory (and parents) if it does not exist yet
pub async fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if tokio::fs::metadata(path).await.is_ok_and(|m| m.is_dir()) {
        return Ok(());
    }
    tokio::fs::create_dir_all(path).await
}

/// Remove a file, treating "already gone" as success
///
/// Returns `true` if a file was actually removed.
pub async fn remove_if_exists(path: &Path) -> std::io::Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
