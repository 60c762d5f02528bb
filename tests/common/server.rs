//! Mock feed/media servers and archiver setup

use super::fixtures::{Episode, body_for, rss_document};
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use yogpod_dl::{Archiver, Config, ProgressMode};

/// Serve the feed at `/rss`
pub async fn mount_feed(server: &MockServer, episodes: &[Episode]) {
    Mock::given(method("GET"))
        .and(path("/rss"))
        .respond_with(ResponseTemplate::new(200).set_body_string(rss_document(&server.uri(), episodes)))
        .mount(server)
        .await;
}

/// Serve an episode's media, expecting exactly `times` requests
pub async fn mount_media(server: &MockServer, episode: &Episode, times: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/media/{}", episode.file)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body_for(episode)))
        .expect(times)
        .mount(server)
        .await;
}

/// Feed plus media for every episode, each expected to be fetched `times` times
pub async fn serve_all(server: &MockServer, episodes: &[Episode], times: u64) {
    mount_feed(server, episodes).await;
    for ep in episodes {
        mount_media(server, ep, times).await;
    }
}

/// Configuration pointing at the mock server and a scratch data directory
pub fn config_for(data_dir: &Path, server: &MockServer) -> Config {
    Config {
        data_dir: data_dir.to_path_buf(),
        feed_url: format!("{}/rss", server.uri()),
        ..Config::default()
    }
}

/// Archiver capturing its report, without a progress line
pub fn archiver(config: Config) -> Archiver<Vec<u8>> {
    Archiver::with_output(config, Vec::new())
        .expect("archiver setup failed")
        .with_progress(ProgressMode::Hidden)
}

/// Report written so far
pub fn report_text(archiver: &Archiver<Vec<u8>>) -> String {
    String::from_utf8_lossy(archiver.output()).into_owned()
}

/// Serves one response advertising `length` bytes, sends `sent` of them, cancels `cancel`
/// and then keeps the connection open without sending anything else
///
/// Returns the URL to request.
pub async fn stalling_media_server(length: usize, sent: usize, cancel: CancellationToken) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().expect("no local addr");
    tokio::spawn(async move {
        let Ok((mut socket, _)) = listener.accept().await else {
            return;
        };
        let mut buf = [0u8; 1024];
        let _ = socket.read(&mut buf).await;
        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {length}\r\nContent-Type: audio/mpeg\r\n\r\n"
        );
        let _ = socket.write_all(head.as_bytes()).await;
        let _ = socket.write_all(&vec![1u8; sent]).await;
        let _ = socket.flush().await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        cancel.cancel();
        tokio::time::sleep(Duration::from_secs(30)).await;
    });
    format!("http://{}/media/stalled.mp3", addr)
}
