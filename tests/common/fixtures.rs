//! Feed documents and episode fixtures

/// Publication date used unless a fixture sets its own
pub const DEFAULT_DATE: &str = "Mon, 01 Jan 2024 12:00:00 +0000";

/// One feed episode; `file` is the last segment of its enclosure URL
#[derive(Clone, Debug)]
pub struct Episode {
    pub title: String,
    pub file: String,
    pub size: usize,
    pub date: String,
    /// Overrides the enclosure URL (e.g. to point at a misbehaving server)
    pub url: Option<String>,
}

/// Episode with the default date, served from the mock server
pub fn episode(title: &str, file: &str, size: usize) -> Episode {
    Episode {
        title: title.to_string(),
        file: file.to_string(),
        size,
        date: DEFAULT_DATE.to_string(),
        url: None,
    }
}

/// Media bytes served for an episode
pub fn body_for(episode: &Episode) -> Vec<u8> {
    vec![0x5A; episode.size]
}

/// Enclosure URL of `episode` on a server rooted at `base`
pub fn media_url(base: &str, episode: &Episode) -> String {
    episode
        .url
        .clone()
        .unwrap_or_else(|| format!("{}/media/{}", base, episode.file))
}

/// RSS 2.0 document for `episodes` given oldest-first; the feed lists them newest-first
pub fn rss_document(base: &str, episodes: &[Episode]) -> String {
    let mut items = String::new();
    for ep in episodes.iter().rev() {
        items.push_str(&format!(
            r#"    <item>
      <title>{title}</title>
      <pubDate>{date}</pubDate>
      <enclosure url="{url}" length="{size}" type="audio/mpeg"/>
    </item>
"#,
            title = ep.title,
            date = ep.date,
            url = media_url(base, ep),
            size = ep.size,
        ));
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>The YoGPoD</title>
    <link>{base}</link>
    <description>Test feed</description>
{items}  </channel>
</rss>
"#
    )
}
