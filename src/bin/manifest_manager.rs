use anyhow::Result;
use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};
use sp_video_catcher::storage::JsonFileStore;
use sp_video_catcher::store::ManifestStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "manifest-manager")]
#[command(about = "Manifest history management utility")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, default_value = ".sp_video_catcher")]
    data_dir: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// List all captured video manifests
    List,
    /// Get history statistics
    Stats,
    /// Remove a single record by its unique id
    Remove {
        /// Unique id of the record to remove
        unique_id: String,
    },
    /// Clear the entire manifest history
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt().with_env_filter("info").init();

    let cli = Cli::parse();

    let area = JsonFileStore::new(cli.data_dir).await?;
    let store = ManifestStore::new(Arc::new(area));

    match cli.command {
        Commands::List => {
            let records = store.list().await?;

            if records.is_empty() {
                info!("📭 No captured manifests found");
                return Ok(());
            }

            info!("📚 Found {} captured manifests:", records.len());

            for record in records {
                let captured = Utc
                    .timestamp_millis_opt(record.timestamp)
                    .single()
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                    .unwrap_or_else(|| format!("timestamp {}", record.timestamp));
                let title = record.title.as_deref().unwrap_or("(untitled)");

                info!("  {} - {}, captured {}", record.unique_id, title, captured);
                if let Some(url) = &record.url {
                    info!("    URL: {}", url);
                }
                if let Some(subtitle_url) = &record.subtitle_url {
                    info!(
                        "    Subtitles: {} ({})",
                        subtitle_url,
                        record.subtitle_language.as_deref().unwrap_or("unknown")
                    );
                }
                if record.transcript_text.is_some() {
                    info!("    Transcript: captured");
                }
            }
        }

        Commands::Stats => {
            let stats = store.stats().await?;
            info!("📊 Manifest History Statistics:");
            info!("  Total records: {}", stats.total_records);
            info!("  With ffmpeg command: {}", stats.with_command);
            info!("  With subtitle URL: {}", stats.with_subtitles);
            info!("  With transcript text: {}", stats.with_transcripts);
        }

        Commands::Remove { unique_id } => {
            let removed = store.remove(&unique_id).await?;
            if removed {
                info!("✅ Removed manifest record: {}", unique_id);
            } else {
                warn!("⚠️ No record found for: {}", unique_id);
            }
        }

        Commands::Clear => {
            store.clear().await?;
            info!("🧹 Cleared manifest history");
        }
    }

    Ok(())
}
