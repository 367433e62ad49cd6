//! Logging setup.
//!
//! JSON lines go to a daily rolling file in the data directory, human
//! output goes to stdout, and `log` records (used by `config`) are
//! forwarded into `tracing`. Rolled-over files are gzipped in the
//! background.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const LOG_FILE: &str = "boundlexx.log";

/// Initialize logging under `<data_dir>/logs`.
///
/// Returns a `WorkerGuard` that must be kept alive for the duration of the
/// application so buffered file output is flushed on shutdown.
pub fn init(data_dir: &Path) -> WorkerGuard {
    let log_dir = data_dir.join("logs");
    if !log_dir.exists() {
        if let Err(e) = fs::create_dir_all(&log_dir) {
            eprintln!("Failed to create logs directory: {}", e);
        }
    }

    let file_appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .json()
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_target(true)
        .with_filter(env_filter.clone());

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .with_target(false)
        .with_filter(env_filter);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stdout_layer)
        .init();

    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("Failed to initialize LogTracer: {}", e);
    }

    let log_dir_clone = log_dir.clone();
    std::thread::spawn(move || {
        compress_old_logs(log_dir_clone);
    });

    tracing::info!(path = %log_dir.join(LOG_FILE).display(), "Logging initialized (daily rolling)");

    guard
}

/// Rolled-over files look like `boundlexx.log.YYYY-MM-DD`; today's file
/// is still being written.
fn should_compress(name: &str, today: &str) -> bool {
    name.strip_prefix(LOG_FILE)
        .and_then(|rest| rest.strip_prefix('.'))
        .is_some_and(|suffix| suffix != today && !suffix.ends_with(".gz"))
}

fn compress_old_logs(log_dir: PathBuf) {
    let today = chrono::Local::now().format("%Y-%m-%d").to_string();

    let Ok(entries) = fs::read_dir(&log_dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !should_compress(name, &today) {
            continue;
        }
        match compress_file(&path) {
            Ok(()) => tracing::debug!(path = %path.display(), "Compressed old log"),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to compress old log"),
        }
    }
}

fn compress_file(path: &Path) -> io::Result<()> {
    let mut gz_name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "No filename"))?
        .to_os_string();
    gz_name.push(".gz");
    let gz_path = path.with_file_name(gz_name);

    if gz_path.exists() {
        return Ok(());
    }

    let mut reader = io::BufReader::new(fs::File::open(path)?);
    let mut encoder = GzEncoder::new(fs::File::create(&gz_path)?, Compression::default());
    io::copy(&mut reader, &mut encoder)?;
    encoder.finish()?;

    fs::remove_file(path)
}
