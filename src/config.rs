//! Configuration types for yogpod-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A named series and the pattern its episode titles start with
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesConfig {
    /// Series name; also the name of its directory and playlist
    pub name: String,

    /// Regular expression matched against the start of an episode title
    pub pattern: String,
}

impl SeriesConfig {
    /// Convenience constructor
    pub fn new(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
        }
    }
}

/// HTTP client settings shared by the feed fetcher and the episode downloader
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Connection timeout (default: 30 seconds)
    #[serde(default = "default_connect_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Size of the write chunks; progress is reported after each one (default: 8192)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
            user_agent: default_user_agent(),
            chunk_size: default_chunk_size(),
        }
    }
}

/// Secondary archival source (fan-made legacy episodes hosted on a video site)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Playlist handed to the extraction tool
    #[serde(default = "default_archive_url")]
    pub url: String,

    /// Directory (under the data dir) and playlist name for extracted files
    #[serde(default = "default_archive_name")]
    pub name: String,

    /// Name of the extraction binary looked up in PATH
    #[serde(default = "default_archive_tool")]
    pub tool: String,

    /// Extract vorbis/ogg instead of opus
    #[serde(default)]
    pub ogg: bool,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            url: default_archive_url(),
            name: default_archive_name(),
            tool: default_archive_tool(),
            ogg: false,
        }
    }
}

/// Main configuration
///
/// Every field has a default, so an empty JSON object (or no file at all) yields the
/// stock YoGPoD setup.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Root data directory (default: "./yogpod-data")
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Feed endpoint
    #[serde(default = "default_feed_url")]
    pub feed_url: String,

    /// File name of the fetched feed inside the data directory
    #[serde(default = "default_feed_file")]
    pub feed_file: String,

    /// HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Ordered series table; the first matching pattern wins
    #[serde(default = "default_series")]
    pub series: Vec<SeriesConfig>,

    /// Secondary archival source
    #[serde(default)]
    pub archive: ArchiveConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            feed_url: default_feed_url(),
            feed_file: default_feed_file(),
            http: HttpConfig::default(),
            series: default_series(),
            archive: ArchiveConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from an optional JSON file, falling back to defaults
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, is not valid JSON, or fails validation
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| Error::Config {
                    message: format!("cannot read {}: {}", path.display(), e),
                    key: None,
                })?;
                serde_json::from_str::<Config>(&raw).map_err(|e| Error::Config {
                    message: format!("invalid {}: {}", path.display(), e),
                    key: None,
                })?
            }
            None => Config::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check invariants the pipeline relies on
    pub fn validate(&self) -> Result<()> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(Error::config("data directory must not be empty", "data_dir"));
        }
        if self.feed_file.is_empty() {
            return Err(Error::config("feed file name must not be empty", "feed_file"));
        }
        if self.http.chunk_size == 0 {
            return Err(Error::config("chunk size must be positive", "http.chunk_size"));
        }

        let mut seen = HashSet::new();
        for series in &self.series {
            if series.name.is_empty() || series.name.contains(['/', '\\']) {
                return Err(Error::config(
                    format!("invalid series name '{}'", series.name),
                    "series",
                ));
            }
            if !seen.insert(series.name.as_str()) {
                return Err(Error::config(
                    format!("duplicate series name '{}'", series.name),
                    "series",
                ));
            }
        }
        Ok(())
    }

    /// Where the fetched feed document is stored
    pub fn feed_path(&self) -> PathBuf {
        self.data_dir.join(&self.feed_file)
    }
}

/// Per-run behaviour selected on the command line
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Download each series newest-first
    pub reverse: bool,

    /// Only complete series that are already partially present
    pub top_up: bool,

    /// Only the first N chronological episodes per series are eligible (0 = unlimited)
    pub limit: usize,

    /// Skip all downloads
    pub no_downloads: bool,

    /// Do not set file modification times
    pub no_mtime: bool,

    /// Remove playlists instead of writing them
    pub no_playlists: bool,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("yogpod-data")
}

fn default_feed_url() -> String {
    "http://yogpod.libsyn.com/rss".to_string()
}

fn default_feed_file() -> String {
    "yogpod.rss".to_string()
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    concat!("yogpod-dl/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_chunk_size() -> usize {
    8192
}

fn default_archive_url() -> String {
    "https://www.youtube.com/playlist?list=PLNEbhjI-nYGtSscF3FwyMQKU2M-F-0k7S".to_string()
}

fn default_archive_name() -> String {
    "Legacy".to_string()
}

fn default_archive_tool() -> String {
    "yt-dlp".to_string()
}

fn default_series() -> Vec<SeriesConfig> {
    vec![
        SeriesConfig::new("YoGPoD", r"^YoGPoD (\d+\w?): (.+)$"),
        SeriesConfig::new("Interviews", r"^Interview|^Nordrassil"),
        SeriesConfig::new(
            "YoGPoD-Animations",
            r"^(.+): YoGPoD Fan Animation (\d+|Bonus!)$",
        ),
        SeriesConfig::new("SimpleSimon", r"^Simple Simon "),
        SeriesConfig::new(
            "Triforce",
            r"^Triforce!? #(\d+?(\.\d*)?)\??(?:: | w/ \w+:| - )(.+)$",
        ),
        SeriesConfig::new("PyrionLovesAnime", r"^Pyrion Loves Anime #(\d+?) - (.+)$"),
    ]
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        config.validate().expect("default config must validate");
        assert_eq!(config.feed_path(), PathBuf::from("yogpod-data/yogpod.rss"));
        assert_eq!(config.series.len(), 6);
        assert_eq!(config.series[0].name, "YoGPoD");
    }

    #[test]
    fn empty_json_object_yields_defaults() {
        let config: Config = serde_json::from_str("{}").expect("deserialize failed");
        assert_eq!(config.data_dir, default_data_dir());
        assert_eq!(config.feed_url, default_feed_url());
        assert_eq!(config.http.chunk_size, 8192);
        assert_eq!(config.http.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.series, default_series());
        assert_eq!(config.archive.name, "Legacy");
    }

    #[test]
    fn series_order_is_preserved_from_json() {
        let json = r#"{
            "series": [
                {"name": "B", "pattern": "^B"},
                {"name": "A", "pattern": "^A"}
            ]
        }"#;
        let config: Config = serde_json::from_str(json).expect("deserialize failed");
        let names: Vec<_> = config.series.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["B", "A"]);
    }

    #[test]
    fn duration_serde_serializes_as_seconds() {
        let http = HttpConfig {
            connect_timeout: Duration::from_secs(45),
            ..Default::default()
        };
        let json = serde_json::to_value(&http).unwrap();
        assert_eq!(json["connect_timeout"], 45);
    }

    #[test]
    fn duplicate_series_names_are_rejected() {
        let config = Config {
            series: vec![SeriesConfig::new("A", "^a"), SeriesConfig::new("A", "^b")],
            ..Default::default()
        };
        match config.validate() {
            Err(Error::Config { key, message }) => {
                assert_eq!(key.as_deref(), Some("series"));
                assert!(message.contains("duplicate"));
            }
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn series_names_must_be_usable_as_directories() {
        for bad in ["", "a/b", r"a\b"] {
            let config = Config {
                series: vec![SeriesConfig::new(bad, "^x")],
                ..Default::default()
            };
            assert!(config.validate().is_err(), "'{bad}' should be rejected");
        }
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let mut config = Config::default();
        config.http.chunk_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_without_path_returns_defaults() {
        let config = Config::load(None).unwrap();
        assert_eq!(config.feed_file, "yogpod.rss");
    }

    #[test]
    fn load_reads_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"data_dir": "/srv/podcasts", "http": {{"chunk_size": 4096}}}}"#).unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/podcasts"));
        assert_eq!(config.http.chunk_size, 4096);
        assert_eq!(config.http.user_agent, default_user_agent());
    }

    #[test]
    fn load_reports_missing_file_as_config_error() {
        let result = Config::load(Some(Path::new("/nonexistent/yogpod-dl.json")));
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn load_reports_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            Config::load(Some(file.path())),
            Err(Error::Config { key: None, .. })
        ));
    }
}
