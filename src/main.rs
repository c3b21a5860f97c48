use anyhow::Result;
use clap::{Arg, Command};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use sp_video_catcher::boundary::{LogNotifier, StaticTitleSource};
use sp_video_catcher::capture::CaptureReader;
use sp_video_catcher::config::CatcherConfig;
use sp_video_catcher::observer::{ObserverRuntime, RequestObserver};
use sp_video_catcher::storage::JsonFileStore;
use sp_video_catcher::store::ManifestStore;

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("SharePoint Video Catcher")
        .version("0.1.0")
        .about("Passive detection of SharePoint video manifests and transcripts")
        .arg(
            Arg::new("capture")
                .short('f')
                .long("capture-file")
                .value_name("FILE")
                .help("Capture feed to replay; reads stdin when omitted"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path"),
        )
        .arg(
            Arg::new("data-dir")
                .short('d')
                .long("data-dir")
                .value_name("DIR")
                .help("Directory holding the persisted manifest history"),
        )
        .arg(
            Arg::new("max-items")
                .short('m')
                .long("max-items")
                .value_name("NUM")
                .help("Maximum manifest records to retain"),
        )
        .arg(
            Arg::new("workers")
                .short('w')
                .long("workers")
                .value_name("NUM")
                .help("Number of concurrent event tasks")
                .default_value("4"),
        )
        .arg(
            Arg::new("notify")
                .long("notify")
                .help("Log a notification for each detected video")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("init-config")
                .long("init-config")
                .help("Write a default configuration file and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    // Initialize logging
    let filter = if matches.get_flag("verbose") {
        "sp_video_catcher=debug,info"
    } else {
        "sp_video_catcher=info,warn"
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if matches.get_flag("init-config") {
        let path = matches
            .get_one::<String>("config")
            .map(String::as_str)
            .unwrap_or("sp-video-catcher.toml");
        CatcherConfig::default().save(path)?;
        return Ok(());
    }

    // Load configuration
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => CatcherConfig::from_file(path)?,
        None => CatcherConfig::load().unwrap_or_else(|e| {
            warn!("Failed to load config, using defaults: {}", e);
            CatcherConfig::default()
        }),
    };

    if let Some(dir) = matches.get_one::<String>("data-dir") {
        config.storage.data_dir = PathBuf::from(dir);
    }
    if let Some(raw) = matches.get_one::<String>("max-items") {
        config.capture.max_items = raw.parse()?;
    }
    if matches.get_flag("notify") {
        config.capture.notify_on_detection = true;
    }
    config.validate()?;

    let workers: usize = matches.get_one::<String>("workers").unwrap().parse()?;

    info!("🚀 SharePoint Video Catcher starting...");
    info!("📁 Data directory: {}", config.storage.data_dir.display());
    info!("🔧 Workers: {}", workers);

    // Wire the pipeline: capture feed -> observer -> manifest store
    let area = JsonFileStore::new(config.storage.data_dir.clone()).await?;
    let store = Arc::new(ManifestStore::new(Arc::new(area)));
    let observer = Arc::new(RequestObserver::new(
        config,
        Arc::clone(&store),
        Arc::new(StaticTitleSource::none()),
        Arc::new(LogNotifier),
    )?);
    let runtime = ObserverRuntime::new(observer, workers);

    let reader = match matches.get_one::<String>("capture") {
        Some(path) => {
            info!("📄 Replaying capture feed: {}", path);
            CaptureReader::from_file(path).await?
        }
        None => {
            info!("📄 Reading capture feed from stdin");
            CaptureReader::stdin()
        }
    };

    let (tx, rx) = mpsc::channel(64);
    let feeder = tokio::spawn(reader.feed(tx));

    let start_time = std::time::Instant::now();
    let stats = runtime.run(rx).await;
    let duration = start_time.elapsed();
    let forwarded = feeder.await.unwrap_or(0);

    info!("🎉 Replay completed in {:.2}s", duration.as_secs_f64());
    info!("📥 Events forwarded: {}", forwarded);
    info!("📊 {}", stats.summary());
    info!("💾 Records in history: {}", store.count().await?);

    Ok(())
}
