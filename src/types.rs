//! Core types for yogpod-dl

use crate::utils::url_basename;
use std::path::PathBuf;

/// One feed item carrying an enclosure, before classification
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeedItem {
    /// Item title
    pub title: String,

    /// Raw publication date as found in the feed (RFC 2822 in practice)
    pub pub_date: Option<String>,

    /// Enclosure URL
    pub url: String,

    /// Enclosure length in bytes
    pub size: u64,
}

/// A classified episode with its local file state
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    /// Episode title
    pub title: String,

    /// Raw publication date, parsed only when fixing up modification times
    pub pub_date: Option<String>,

    /// Enclosure URL
    pub source_url: String,

    /// Size the local file must have to count as present
    pub expected_bytes: u64,

    /// Series this entry was classified into
    pub series: String,

    /// `<data_dir>/<series>/<basename of URL path>`
    pub local_path: PathBuf,

    /// Whether the local file matched `expected_bytes` (or was downloaded this run)
    pub present: bool,
}

/// Accumulated counts, sizes and download decision for one series
#[derive(Clone, Debug)]
pub struct SeriesAggregate {
    /// Series name
    pub name: String,

    /// Directory holding this series' media files (`<data_dir>/<name>`)
    pub dir: PathBuf,

    /// Entries in chronological order (index 0 = earliest)
    pub entries: Vec<Entry>,

    /// Number of entries
    pub total_count: usize,

    /// Number of entries present locally
    pub present_count: usize,

    /// Sum of expected sizes
    pub total_bytes: u64,

    /// Sum of expected sizes of present entries
    pub present_bytes: u64,

    /// Whether missing entries of this series should be downloaded
    pub should_download: bool,
}

impl SeriesAggregate {
    /// Create an empty aggregate
    pub fn new(name: impl Into<String>, dir: PathBuf) -> Self {
        Self {
            name: name.into(),
            dir,
            entries: Vec::new(),
            total_count: 0,
            present_count: 0,
            total_bytes: 0,
            present_bytes: 0,
            should_download: true,
        }
    }

    /// Local file for an enclosure: the last segment of the URL path inside [`Self::dir`]
    ///
    /// Depends only on `dir` and `url`. Returns `None` when the URL has no usable file name.
    pub fn local_path(&self, url: &str) -> Option<PathBuf> {
        url_basename(url).map(|name| self.dir.join(name))
    }

    /// Append an entry, keeping the counters consistent
    ///
    /// Byte sums saturate at `u64::MAX`; enclosure lengths come from the feed unchecked.
    pub fn push(&mut self, entry: Entry) {
        self.total_count += 1;
        self.total_bytes = self.total_bytes.saturating_add(entry.expected_bytes);
        if entry.present {
            self.present_count += 1;
            self.present_bytes = self.present_bytes.saturating_add(entry.expected_bytes);
        }
        self.entries.push(entry);
    }

    /// Mark the entry at `index` as present
    ///
    /// Returns `false` (and changes nothing) if it was already present or out of range,
    /// so an entry is counted at most once.
    pub fn mark_present(&mut self, index: usize) -> bool {
        match self.entries.get_mut(index) {
            Some(entry) if !entry.present => {
                entry.present = true;
                self.present_count += 1;
                self.present_bytes = self.present_bytes.saturating_add(entry.expected_bytes);
                true
            }
            _ => false,
        }
    }

    /// Bytes still missing locally
    pub fn missing_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.present_bytes)
    }

    /// At least one entry is missing
    pub fn has_missing(&self) -> bool {
        self.present_count != self.total_count
    }

    /// Some, but not all, entries are present
    pub fn is_partial(&self) -> bool {
        self.present_count > 0 && self.has_missing()
    }
}

/// Totals across all series
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Totals {
    /// Number of classified entries
    pub count: usize,
    /// Number of classified entries present locally
    pub present_count: usize,
    /// Sum of expected sizes
    pub bytes: u64,
    /// Sum of expected sizes of present entries
    pub present_bytes: u64,
}

impl Totals {
    /// Bytes still missing locally
    pub fn missing_bytes(&self) -> u64 {
        self.bytes.saturating_sub(self.present_bytes)
    }

    /// Every classified entry is present
    pub fn is_complete(&self) -> bool {
        self.count == self.present_count
    }
}
