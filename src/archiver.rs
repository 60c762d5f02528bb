//! Top-level pipeline
//!
//! [`Archiver`] runs one archival pass: fetch and parse the feed, classify and reconcile
//! entries with the data directory, ask what to download, download sequentially, then fix
//! file dates and playlists. Operator-facing report lines go to the archiver's output
//! (stdout by default); diagnostics go through `tracing`.

use crate::archive::{ArchiveSource, write_archive_playlist};
use crate::catalog::Catalog;
use crate::classifier::Classifier;
use crate::config::{Config, RunOptions};
use crate::downloader::{Downloader, ProgressMode};
use crate::error::Result;
use crate::feed::{fetch_feed, parse_feed_file};
use crate::post_process::{DateReport, PlaylistReport, set_file_dates, update_playlists};
use crate::selection::{Decision, Prompter, decide, plan};
use crate::utils::ensure_dir;
use std::io::Write;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// What a completed run did
#[derive(Clone, Debug)]
pub struct RunReport {
    /// Final state of every series, including entries downloaded during the run
    pub catalog: Catalog,
    /// Outcome of the selection step
    pub decision: Decision,
    /// Entries downloaded during the run
    pub downloaded: usize,
    /// Missing entries left out because of the per-series limit
    pub skipped_by_limit: usize,
    /// File date update outcome, `None` when disabled
    pub dates: Option<DateReport>,
    /// Playlist changes
    pub playlists: PlaylistReport,
}

/// Feed-driven archiver
///
/// Generic over the report sink so runs can be captured; [`Archiver::new`] writes to stdout.
pub struct Archiver<W = std::io::Stdout> {
    config: Config,
    classifier: Classifier,
    downloader: Downloader,
    progress: ProgressMode,
    out: W,
}

impl Archiver<std::io::Stdout> {
    /// Create an archiver reporting on stdout with a terminal progress line
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid, a series pattern does not
    /// compile, or the HTTP client cannot be built
    pub fn new(config: Config) -> Result<Self> {
        Self::with_output(config, std::io::stdout())
    }
}

impl<W: Write + Send> Archiver<W> {
    /// Create an archiver reporting to `out`
    ///
    /// # Errors
    /// See [`Archiver::new`]
    pub fn with_output(config: Config, out: W) -> Result<Self> {
        config.validate()?;
        let classifier = Classifier::new(&config.series)?;
        let downloader = Downloader::new(&config.http)?;
        Ok(Self {
            config,
            classifier,
            downloader,
            progress: ProgressMode::Terminal,
            out,
        })
    }

    /// Choose how download progress is shown
    pub fn with_progress(mut self, progress: ProgressMode) -> Self {
        self.progress = progress;
        self
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Report sink
    pub fn output(&self) -> &W {
        &self.out
    }

    /// Give the report sink back
    pub fn into_output(self) -> W {
        self.out
    }

    /// Run the feed pipeline once
    ///
    /// # Errors
    /// Any fatal condition aborts the run: the feed cannot be fetched or parsed, a selected
    /// download fails, a playlist cannot be written, or `cancel` fires
    /// ([`crate::Error::Interrupted`]). Failures to set a file's date are not fatal.
    pub async fn run(
        &mut self,
        options: &RunOptions,
        prompter: &mut dyn Prompter,
        cancel: &CancellationToken,
    ) -> Result<RunReport> {
        let data_dir = self.config.data_dir.clone();
        ensure_dir(&data_dir).await?;

        writeln!(self.out, "Fetching RSS feed ({})...", self.config.feed_url)?;
        let feed_path = self.config.feed_path();
        fetch_feed(&self.downloader, &self.config.feed_url, &feed_path, cancel).await?;
        let items = parse_feed_file(&feed_path)?;
        info!(items = items.len(), "feed parsed");
        writeln!(self.out)?;

        let mut catalog = Catalog::new(&data_dir, &self.classifier);
        catalog.ingest(&self.classifier, items).await?;

        for item in &catalog.unknown {
            writeln!(self.out, "WARNING: Unknown episode '{}'!", item.title)?;
        }
        if !catalog.unknown.is_empty() {
            writeln!(
                self.out,
                "Cannot download unknown episodes. Look for an updated series table."
            )?;
            writeln!(self.out)?;
        }

        writeln!(self.out, "{}", catalog.summary())?;

        let decision = decide(&mut catalog, options, prompter).await;
        match decision {
            Decision::NothingMissing => {
                writeln!(self.out, "Nothing to download!")?;
                writeln!(self.out)?;
            }
            Decision::NothingToTopUp => {
                writeln!(
                    self.out,
                    "Nothing to download (but other series are available, remove --top-up)!"
                )?;
                writeln!(self.out)?;
            }
            Decision::Disabled | Decision::Selected => {}
        }

        let mut downloaded = 0;
        let mut skipped_by_limit = 0;
        for series_plan in plan(&catalog, options) {
            let series = &mut catalog.series[series_plan.series];
            for index in series_plan.entries {
                let entry = &series.entries[index];
                writeln!(self.out, "Downloading {}...", entry.title)?;
                self.out.flush()?;

                let bytes = self
                    .downloader
                    .download(&entry.source_url, &entry.local_path, self.progress, cancel)
                    .await?;
                if bytes != entry.expected_bytes {
                    warn!(
                        title = entry.title.as_str(),
                        expected = entry.expected_bytes,
                        received = bytes,
                        "downloaded size differs from enclosure length"
                    );
                }
                series.mark_present(index);
                downloaded += 1;
            }

            if series_plan.skipped_by_limit > 0 {
                writeln!(
                    self.out,
                    "Will not continue downloading '{}' (limit: {}).",
                    series.name, options.limit
                )?;
                skipped_by_limit += series_plan.skipped_by_limit;
            }
        }
        info!(downloaded, skipped_by_limit, "downloads finished");

        let dates = if options.no_mtime {
            None
        } else {
            writeln!(self.out, "Setting file dates...")?;
            Some(set_file_dates(&catalog).await)
        };

        if !options.no_playlists {
            writeln!(self.out, "Creating playlists...")?;
        }
        let playlists = update_playlists(&catalog, !options.no_playlists).await?;

        Ok(RunReport {
            catalog,
            decision,
            downloaded,
            skipped_by_limit,
            dates,
            playlists,
        })
    }

    /// Pull the legacy episodes through `source` after the operator confirms
    ///
    /// Returns the playlist written, or `None` if the operator declined.
    ///
    /// # Errors
    /// Returns an error if the source fails, `cancel` fires, or the playlist cannot be written
    pub async fn run_archive(
        &mut self,
        source: &dyn ArchiveSource,
        prompter: &mut dyn Prompter,
        cancel: &CancellationToken,
    ) -> Result<Option<PathBuf>> {
        let archive = &self.config.archive;
        writeln!(
            self.out,
            "The Legacy YoGPoD's by Demuzed are fan-made versions of The YoGPoD."
        )?;
        writeln!(self.out, "Check them on YouTube:")?;
        writeln!(self.out, "{}", archive.url)?;
        writeln!(self.out)?;
        self.out.flush()?;

        if !prompter.confirm("Start downloading from YouTube?").await {
            return Ok(None);
        }

        let data_dir = &self.config.data_dir;
        let target = data_dir.join(&archive.name);
        info!(source = source.name(), ?target, "fetching archive");
        let files = source.fetch(&target, cancel).await?;
        let playlist = write_archive_playlist(data_dir, &archive.name, &files).await?;
        info!(files = files.len(), ?playlist, "archive playlist written");
        Ok(Some(playlist))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::selection::ScriptedPrompter;
    use async_trait::async_trait;
    use std::path::Path;

    struct FixedSource(Vec<&'static str>);

    #[async_trait]
    impl ArchiveSource for FixedSource {
        async fn fetch(
            &self,
            target_dir: &Path,
            _cancel: &CancellationToken,
        ) -> Result<Vec<PathBuf>> {
            ensure_dir(target_dir).await?;
            Ok(self.0.iter().map(|f| target_dir.join(f)).collect())
        }

        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    fn archiver(data_dir: &Path) -> Archiver<Vec<u8>> {
        let config = Config {
            data_dir: data_dir.to_path_buf(),
            ..Config::default()
        };
        Archiver::with_output(config, Vec::new())
            .unwrap()
            .with_progress(ProgressMode::Hidden)
    }

    #[test]
    fn invalid_pattern_is_rejected_up_front() {
        let mut config = Config::default();
        config.series[0].pattern = "(".into();
        let result = Archiver::with_output(config, Vec::new());
        assert!(matches!(result, Err(Error::InvalidPattern { .. })));
    }

    #[tokio::test]
    async fn run_archive_writes_playlist_after_confirmation() {
        let temp = tempfile::tempdir().unwrap();
        let mut archiver = archiver(temp.path());
        let mut prompter = ScriptedPrompter::new(["y"]);
        let source = FixedSource(vec!["Legacy 1.opus"]);

        let playlist = archiver
            .run_archive(&source, &mut prompter, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(playlist, Some(temp.path().join("Legacy.m3u")));
        assert_eq!(prompter.asked, vec!["Start downloading from YouTube?"]);
        assert_eq!(
            std::fs::read_to_string(temp.path().join("Legacy.m3u")).unwrap(),
            "#EXTM3U\r\n#EXTINF:0,Legacy 1.opus\r\nLegacy/Legacy 1.opus\r\n"
        );
        let out = String::from_utf8(archiver.into_output()).unwrap();
        assert!(out.contains("Check them on YouTube:"));
    }

    #[tokio::test]
    async fn run_archive_declined_does_nothing() {
        let temp = tempfile::tempdir().unwrap();
        let mut archiver = archiver(temp.path());
        let mut prompter = ScriptedPrompter::new(["n"]);
        let source = FixedSource(vec!["Legacy 1.opus"]);

        let playlist = archiver
            .run_archive(&source, &mut prompter, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(playlist, None);
        assert!(!temp.path().join("Legacy").exists());
        assert!(!temp.path().join("Legacy.m3u").exists());
    }

    #[tokio::test]
    async fn unreachable_feed_is_fatal() {
        let temp = tempfile::tempdir().unwrap();
        let config = Config {
            data_dir: temp.path().to_path_buf(),
            feed_url: "http://127.0.0.1:1/rss".into(),
            ..Config::default()
        };
        let mut archiver = Archiver::with_output(config, Vec::new()).unwrap();

        let result = archiver
            .run(
                &RunOptions::default(),
                &mut ScriptedPrompter::default(),
                &CancellationToken::new(),
            )
            .await;

        assert!(matches!(result, Err(Error::Network(_))));
    }
}
