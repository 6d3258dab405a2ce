use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use url::Url;

use feedcache::config::{Config, FEED_URL_ENV};
use feedcache::loader::load;
use feedcache::logging;
use feedcache::pipeline::Pipeline;

/// How long to wait for background cache writes before exiting
const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(name = "feedcache")]
#[command(about = "Load a feed and its images through an offline-first cache")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/feedcache/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Feed URL, overriding FEEDCACHE_FEED_URL and the config file
  #[arg(long, global = true)]
  feed_url: Option<Url>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Load the feed and print its records as JSON
  Feed,
  /// Load an image through the cache
  Image {
    url: Url,
    /// Write the image here instead of reporting its size
    #[arg(short, long)]
    output: Option<PathBuf>,
  },
  /// Delete the cached feed if it is expired or unreadable
  Validate,
  /// Delete the cached feed
  Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = Config::load(args.config.as_deref())?;
  let _log_guard = logging::init(&config.log_level, config.log_file.as_deref())?;

  let feed_url = config.resolve_feed_url(args.feed_url)?;
  let pipeline = Pipeline::build(&config, feed_url)?;

  match args.command {
    Command::Feed => {
      let loader = pipeline.feed().ok_or_else(|| {
        eyre!(
          "No feed URL configured. Pass --feed-url, set {}, or add feed_url to the config file",
          FEED_URL_ENV
        )
      })?;
      let records = load(&**loader, ())
        .await
        .ok_or_else(|| eyre!("Feed load was cancelled"))??;
      info!("Loaded {} feed records", records.len());
      println!("{}", serde_json::to_string_pretty(&records)?);
    }
    Command::Image { url, output } => {
      let data = load(&**pipeline.images(), url.clone())
        .await
        .ok_or_else(|| eyre!("Image load was cancelled"))??;
      match output {
        Some(path) => {
          std::fs::write(&path, &data)
            .map_err(|e| eyre!("Failed to write {}: {}", path.display(), e))?;
          println!("Wrote {} bytes to {}", data.len(), path.display());
        }
        None => println!("{}: {} bytes", url, data.len()),
      }
    }
    Command::Validate => {
      pipeline.validate_cache().await?;
      println!("Feed cache validated");
    }
    Command::Clear => {
      pipeline.clear().await?;
      println!("Feed cache cleared");
    }
  }

  pipeline.flush(FLUSH_TIMEOUT).await;

  Ok(())
}
