//! Local state reconciliation
//!
//! Turns classified feed items into per-series aggregates and decides, once per run,
//! which entries already exist on disk. An entry is present when a regular file exists
//! at its local path and its size equals the enclosure length; anything else (missing,
//! truncated, or a different file) is treated the same way and downloaded again in full.

use crate::classifier::{Classification, Classifier};
use crate::error::{FeedError, Result};
use crate::types::{Entry, FeedItem, SeriesAggregate, Totals};
use crate::utils::format_size;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Presence rule: the file exists and has exactly the expected size
///
/// `on_disk` is the size of a regular file at the path, or `None` if there is none.
pub fn presence(on_disk: Option<u64>, expected: u64) -> bool {
    on_disk == Some(expected)
}

/// Stat `path` and apply [`presence`]
pub async fn is_present(path: &Path, expected: u64) -> bool {
    let on_disk = match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Some(meta.len()),
        _ => None,
    };
    presence(on_disk, expected)
}

/// All series aggregates for one run plus the entries no pattern claimed
#[derive(Clone, Debug)]
pub struct Catalog {
    data_dir: PathBuf,
    /// Aggregates in series table order
    pub series: Vec<SeriesAggregate>,
    /// Feed items that matched no series, in feed (chronological) order
    pub unknown: Vec<FeedItem>,
}

impl Catalog {
    /// Create empty aggregates for every series in the classifier's table
    pub fn new(data_dir: impl Into<PathBuf>, classifier: &Classifier) -> Self {
        let data_dir = data_dir.into();
        let series = classifier
            .names()
            .map(|name| SeriesAggregate::new(name, data_dir.join(name)))
            .collect();
        Self {
            data_dir,
            series,
            unknown: Vec::new(),
        }
    }

    /// Root data directory
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Classify `items` (already in chronological order) and check each one against disk
    ///
    /// # Errors
    /// Returns [`FeedError::Malformed`] if a classified item's URL has no file name
    pub async fn ingest(&mut self, classifier: &Classifier, items: Vec<FeedItem>) -> Result<()> {
        for item in items {
            let index = match classifier.classify(&item.title) {
                Classification::Series { index, .. } => index,
                Classification::Unknown => {
                    warn!(title = item.title.as_str(), "unknown episode");
                    self.unknown.push(item);
                    continue;
                }
            };

            let aggregate = &mut self.series[index];
            let path = aggregate.local_path(&item.url).ok_or_else(|| {
                FeedError::Malformed(format!(
                    "enclosure URL '{}' of '{}' has no file name",
                    item.url, item.title
                ))
            })?;
            let present = is_present(&path, item.size).await;
            debug!(title = item.title.as_str(), ?path, present, "reconciled entry");

            aggregate.push(Entry {
                title: item.title,
                pub_date: item.pub_date,
                source_url: item.url,
                expected_bytes: item.size,
                series: aggregate.name.clone(),
                local_path: path,
                present,
            });
        }
        Ok(())
    }

    /// Aggregate by name
    pub fn get(&self, name: &str) -> Option<&SeriesAggregate> {
        self.series.iter().find(|s| s.name == name)
    }

    /// Totals across all series
    pub fn totals(&self) -> Totals {
        self.series.iter().fold(Totals::default(), |acc, s| Totals {
            count: acc.count + s.total_count,
            present_count: acc.present_count + s.present_count,
            bytes: acc.bytes.saturating_add(s.total_bytes),
            present_bytes: acc.present_bytes.saturating_add(s.present_bytes),
        })
    }

    /// Iterate over every classified entry
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.series.iter().flat_map(|s| s.entries.iter())
    }

    /// Aligned per-series summary followed by totals
    pub fn summary(&self) -> String {
        let width = self
            .series
            .iter()
            .map(|s| s.name.len())
            .max()
            .unwrap_or(0)
            .max("Total:".len());

        let mut out = String::new();
        for s in &self.series {
            let _ = writeln!(
                out,
                "{:<width$}  {} / {} episodes ({} / {})",
                s.name,
                s.present_count,
                s.total_count,
                format_size(s.present_bytes),
                format_size(s.total_bytes),
            );
        }

        let totals = self.totals();
        out.push('\n');
        let _ = writeln!(
            out,
            "{:>width$}  {} / {} episodes",
            "Total:", totals.present_count, totals.count
        );
        let _ = writeln!(
            out,
            "{:>width$}  {} / {}",
            "",
            format_size(totals.present_bytes),
            format_size(totals.bytes)
        );
        out
    }
}
