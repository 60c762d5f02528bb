//! Feed retrieval and parsing
//!
//! The feed is first stored in the data directory and then parsed from disk, so the
//! last fetched document is always available for inspection.

use crate::downloader::{Downloader, ProgressMode};
use crate::error::{DownloadError, Error, FeedError, Result};
use crate::types::FeedItem;
use std::io::BufReader;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Retrieve the feed document at `url` into `dest`, overwriting any previous copy
///
/// No retry and no progress output; an HTTP error status becomes [`FeedError::Fetch`].
pub async fn fetch_feed(
    downloader: &Downloader,
    url: &str,
    dest: &Path,
    cancel: &CancellationToken,
) -> Result<()> {
    debug!(url, ?dest, "fetching feed");
    match downloader
        .download(url, dest, ProgressMode::Hidden, cancel)
        .await
    {
        Ok(bytes) => {
            info!(url, bytes, "feed fetched");
            Ok(())
        }
        Err(Error::Download(DownloadError::HttpStatus { url, status })) => {
            Err(FeedError::Fetch { url, status }.into())
        }
        Err(e) => Err(e),
    }
}

/// Parse a previously fetched feed document from disk
pub fn parse_feed_file(path: &Path) -> Result<Vec<FeedItem>> {
    let file = std::fs::File::open(path)?;
    let channel = rss::Channel::read_from(BufReader::new(file))
        .map_err(|e| FeedError::Malformed(e.to_string()))?;
    items_from_channel(&channel)
}

/// Parse feed content held in memory
pub fn parse_feed(content: &str) -> Result<Vec<FeedItem>> {
    let channel = content
        .parse::<rss::Channel>()
        .map_err(|e| FeedError::Malformed(e.to_string()))?;
    items_from_channel(&channel)
}

/// Extract episode items, oldest first
///
/// Feeds list the newest item first; reversing once yields chronological order.
/// Items without an enclosure are not episodes and are skipped.
fn items_from_channel(channel: &rss::Channel) -> Result<Vec<FeedItem>> {
    let mut items = Vec::with_capacity(channel.items().len());

    for item in channel.items().iter().rev() {
        let Some(enclosure) = item.enclosure() else {
            debug!(title = item.title().unwrap_or(""), "skipping item without enclosure");
            continue;
        };

        let title = item.title().unwrap_or("").to_string();
        let size = enclosure
            .length()
            .trim()
            .parse::<u64>()
            .map_err(|_| FeedError::InvalidLength {
                title: title.clone(),
                value: enclosure.length().to_string(),
            })?;

        items.push(FeedItem {
            title,
            pub_date: item.pub_date().map(str::to_string),
            url: enclosure.url().to_string(),
            size,
        });
    }

    debug!(items = items.len(), "parsed feed");
    Ok(items)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
    <channel>
        <title>The YoGPoD</title>
        <link>http://yogpod.libsyn.com</link>
        <description>Test feed</description>
        <item>
            <title>YoGPoD 124: Newer</title>
            <pubDate>Tue, 02 Jan 2024 14:30:00 +0000</pubDate>
            <enclosure url="http://example.com/media/YoGPoD_124.mp3" length="2000" type="audio/mpeg"/>
        </item>
        <item>
            <title>Announcement</title>
            <pubDate>Mon, 01 Jan 2024 13:00:00 +0000</pubDate>
        </item>
        <item>
            <title>YoGPoD 123: Something</title>
            <pubDate>Mon, 01 Jan 2024 12:00:00 +0000</pubDate>
            <enclosure url="http://example.com/media/YoGPoD_123.mp3" length="1000" type="audio/mpeg"/>
        </item>
    </channel>
</rss>"#;

    #[test]
    fn parse_reverses_document_order_and_skips_items_without_enclosure() {
        let items = parse_feed(FEED).expect("Failed to parse feed");

        assert_eq!(items.len(), 2, "item without enclosure must be skipped");
        assert_eq!(items[0].title, "YoGPoD 123: Something");
        assert_eq!(items[0].size, 1000);
        assert_eq!(items[0].url, "http://example.com/media/YoGPoD_123.mp3");
        assert_eq!(
            items[0].pub_date.as_deref(),
            Some("Mon, 01 Jan 2024 12:00:00 +0000")
        );
        assert_eq!(items[1].title, "YoGPoD 124: Newer");
        assert_eq!(items[1].size, 2000);
    }

    #[test]
    fn parse_empty_channel() {
        let feed = r#"<rss version="2.0"><channel><title>t</title><link>l</link><description>d</description></channel></rss>"#;
        assert!(parse_feed(feed).unwrap().is_empty());
    }

    #[test]
    fn parse_rejects_non_xml() {
        let result = parse_feed("This is not XML at all!");
        assert!(matches!(result, Err(Error::Feed(FeedError::Malformed(_)))));
    }

    #[test]
    fn parse_rejects_document_without_channel() {
        let result = parse_feed(r#"<?xml version="1.0"?><rss version="2.0"></rss>"#);
        assert!(matches!(result, Err(Error::Feed(FeedError::Malformed(_)))));
    }

    #[test]
    fn parse_rejects_negative_or_garbage_length() {
        for length in ["-5", "big", ""] {
            let feed = format!(
                r#"<rss version="2.0"><channel><title>t</title><link>l</link><description>d</description>
                <item><title>Bad</title><enclosure url="http://example.com/x.mp3" length="{length}" type="audio/mpeg"/></item>
                </channel></rss>"#
            );
            match parse_feed(&feed) {
                Err(Error::Feed(FeedError::InvalidLength { title, value })) => {
                    assert_eq!(title, "Bad");
                    assert_eq!(value, length);
                }
                other => panic!("expected InvalidLength for '{length}', got {other:?}"),
            }
        }
    }

    #[test]
    fn parse_feed_file_reads_from_disk() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("yogpod.rss");
        std::fs::write(&path, FEED).unwrap();

        let items = parse_feed_file(&path).unwrap();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn parse_feed_file_missing_is_io_error() {
        let result = parse_feed_file(Path::new("/nonexistent/yogpod.rss"));
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn fetch_feed_overwrites_destination() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rss"))
            .respond_with(ResponseTemplate::new(200).set_body_string(FEED))
            .mount(&mock_server)
            .await;

        let temp = tempfile::tempdir().unwrap();
        let dest = temp.path().join("yogpod.rss");
        std::fs::write(&dest, "stale content that is much longer than nothing at all").unwrap();

        let downloader = Downloader::new(&HttpConfig::default()).unwrap();
        let url = format!("{}/rss", mock_server.uri());
        fetch_feed(&downloader, &url, &dest, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(&dest).unwrap(), FEED);
    }

    #[tokio::test]
    async fn fetch_feed_http_error_is_fetch_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rss"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let temp = tempfile::tempdir().unwrap();
        let dest = temp.path().join("yogpod.rss");
        let downloader = Downloader::new(&HttpConfig::default()).unwrap();
        let url = format!("{}/rss", mock_server.uri());

        match fetch_feed(&downloader, &url, &dest, &CancellationToken::new()).await {
            Err(Error::Feed(FeedError::Fetch { status, .. })) => assert_eq!(status, 503),
            other => panic!("expected Fetch error, got {other:?}"),
        }
        assert!(!dest.exists());
    }
}
