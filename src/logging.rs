//! Tracing subscriber setup for the binary.

use color_eyre::{eyre::eyre, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber.
///
/// RUST_LOG takes precedence over `level`. With `file` set, events are written
/// there through a background writer; keep the returned guard alive until
/// exit so buffered lines are flushed.
pub fn init(level: &str, file: Option<&Path>) -> Result<Option<WorkerGuard>> {
  let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

  match file {
    Some(path) => {
      let (dir, name) = split_log_path(path)?;
      std::fs::create_dir_all(&dir)?;
      let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));

      tracing_subscriber::registry()
        .with(filter)
        .with(
          tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false),
        )
        .try_init()?;

      Ok(Some(guard))
    }
    None => {
      tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()?;

      Ok(None)
    }
  }
}

fn split_log_path(path: &Path) -> Result<(PathBuf, PathBuf)> {
  let name = path
    .file_name()
    .ok_or_else(|| eyre!("Log file path has no file name: {}", path.display()))?;
  let dir = match path.parent() {
    Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
    _ => PathBuf::from("."),
  };

  Ok((dir, PathBuf::from(name)))
}
