use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::process;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use yogpod_dl::error::EXIT_INTERRUPTED;
use yogpod_dl::{
    Archiver, Config, Error, Result, RunOptions, StdinPrompter, ToExitCode, YtDlpSource,
    cancel_on_signal,
};

#[derive(Parser, Debug)]
#[command(
    name = "yogpod-dl",
    about = "Download and archive every episode of The YoGPoD podcast",
    version
)]
struct Args {
    /// Download Legacy YoGPoDs by Demuzed (needs yt-dlp)
    #[arg(long)]
    legacy_yogpod: bool,

    /// Convert Legacy YoGPoD audio to ogg instead of opus
    #[arg(long, requires = "legacy_yogpod")]
    legacy_yogpod_ogg: bool,

    /// Download newest episodes first
    #[arg(short, long)]
    reverse: bool,

    /// Only download series that are already partially downloaded
    #[arg(short, long)]
    top_up: bool,

    /// Only the first N episodes of each series (0 = no limit)
    #[arg(short, long, value_name = "N", default_value_t = 0)]
    limit: usize,

    /// Don't download anything
    #[arg(long)]
    no_downloads: bool,

    /// Don't set file dates
    #[arg(long)]
    no_mtime: bool,

    /// Don't create playlists (and remove existing ones)
    #[arg(long)]
    no_playlists: bool,

    /// Configuration file (JSON)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Data directory (overrides the configuration file)
    #[arg(short, long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// More log output on stderr (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn run_options(&self) -> RunOptions {
        RunOptions {
            reverse: self.reverse,
            top_up: self.top_up,
            limit: self.limit,
            no_downloads: self.no_downloads,
            no_mtime: self.no_mtime,
            no_playlists: self.no_playlists,
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    println!("YoGPoD Downloader {}", env!("CARGO_PKG_VERSION"));
    println!();

    let cancel = CancellationToken::new();
    let signal = tokio::spawn(cancel_on_signal(cancel.clone()));

    // Prompts read stdin without watching the token, so the whole run races it
    let result = tokio::select! {
        result = run(&args, &cancel) => result,
        _ = cancel.cancelled() => Err(Error::Interrupted { signal: "cancelled".into() }),
    };

    let code = match result {
        Ok(()) => {
            println!("Done.");
            0
        }
        Err(e) if cancel.is_cancelled() || e.is_interrupted() => {
            let name = if cancel.is_cancelled() {
                signal.await.unwrap_or("SIGINT")
            } else {
                "SIGINT"
            };
            println!();
            println!("Abort ({}).", name);
            info!(signal = name, "run interrupted");
            EXIT_INTERRUPTED
        }
        Err(e) => {
            error!(code = e.error_code(), error = %e, "run failed");
            eprintln!("ERROR: {}", e);
            e.exit_code()
        }
    };

    // exit instead of returning: a pending stdin read would keep the runtime alive
    process::exit(code);
}

async fn run(args: &Args, cancel: &CancellationToken) -> Result<()> {
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(dir) = &args.data_dir {
        config.data_dir = dir.clone();
    }
    config.archive.ogg |= args.legacy_yogpod_ogg;
    config.validate()?;
    info!(data_dir = ?config.data_dir, feed = config.feed_url.as_str(), "configuration loaded");

    let mut prompter = StdinPrompter::new();

    if args.legacy_yogpod {
        let source = YtDlpSource::from_config(&config.archive)?;
        let mut archiver = Archiver::new(config)?;
        archiver.run_archive(&source, &mut prompter, cancel).await?;
        return Ok(());
    }

    let mut archiver = Archiver::new(config)?;
    archiver.run(&args.run_options(), &mut prompter, cancel).await?;
    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}
