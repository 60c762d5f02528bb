//! # yogpod-dl
//!
//! Feed-driven podcast archiver.
//!
//! One run fetches the podcast's RSS feed, sorts its episodes into series by title,
//! compares them with what is already in the data directory (by exact file size), lets the
//! operator pick what to download, downloads the missing episodes one after another, and
//! finally sets file dates and writes one playlist per series.
//!
//! ## Quick Start
//!
//! ```no_run
//! use yogpod_dl::{Archiver, Config, RunOptions, StdinPrompter};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut archiver = Archiver::new(Config::default())?;
//!     let options = RunOptions { top_up: true, ..Default::default() };
//!
//!     let report = archiver
//!         .run(&options, &mut StdinPrompter::new(), &CancellationToken::new())
//!         .await?;
//!     println!("downloaded {} episodes", report.downloaded);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Secondary archival source (external extraction tool)
pub mod archive;
/// Top-level pipeline
pub mod archiver;
/// Local state reconciliation and summary
pub mod catalog;
/// Series classification by title pattern
pub mod classifier;
/// Configuration types
pub mod config;
/// Streaming HTTP downloader
pub mod downloader;
/// Error types
pub mod error;
/// Feed retrieval and parsing
pub mod feed;
/// File dates and playlists
pub mod post_process;
/// Download selection and operator prompts
pub mod selection;
/// Core types
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use archive::{ArchiveSource, YtDlpSource};
pub use archiver::{Archiver, RunReport};
pub use catalog::Catalog;
pub use classifier::{Classification, Classifier};
pub use config::{ArchiveConfig, Config, HttpConfig, RunOptions, SeriesConfig};
pub use downloader::{Downloader, ProgressMode};
pub use error::{DownloadError, Error, FeedError, Result, ToExitCode};
pub use selection::{Decision, Prompter, ScriptedPrompter, StdinPrompter};
pub use types::{Entry, FeedItem, SeriesAggregate, Totals};

use tokio_util::sync::CancellationToken;

/// Cancel `cancel` on the first termination signal and return the signal's name
///
/// Everything holding a clone of the token stops at its next await point; an episode being
/// downloaded is removed by its partial-file guard.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
pub async fn cancel_on_signal(cancel: CancellationToken) -> &'static str {
    let signal = wait_for_signal().await;
    cancel.cancel();
    signal
}

#[cfg(unix)]
async fn wait_for_signal() -> &'static str {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                    "SIGTERM"
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                    "SIGINT"
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                ctrl_c_or_never().await;
            }
            "SIGINT"
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
                "SIGTERM"
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                ctrl_c_or_never().await;
                "SIGINT"
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> &'static str {
    ctrl_c_or_never().await;
    tracing::info!("Received Ctrl+C signal");
    "SIGINT"
}

/// Resolves on Ctrl+C; never resolves if the listener cannot be installed
async fn ctrl_c_or_never() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        std::future::pending::<()>().await;
    }
}
