//! Tracing setup for the command-line binary.
//!
//! Logs go to stderr unless `PAYSYNC_LOG` names a file. Levels come from
//! `RUST_LOG` and default to `info`.

use std::fs::File;
use std::io;
use std::sync::Mutex;

use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

pub const ENV_LOG_PATH: &str = "PAYSYNC_LOG";

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match open_log_file() {
        Some(file) => registry
            .with(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(true)
                    .with_level(true)
                    .with_timer(UtcTime::rfc_3339()),
            )
            .init(),
        None => registry
            .with(
                fmt::layer()
                    .with_writer(io::stderr)
                    .with_target(true)
                    .with_level(true)
                    .with_timer(UtcTime::rfc_3339()),
            )
            .init(),
    }
}

fn open_log_file() -> Option<File> {
    let base = std::env::var(ENV_LOG_PATH)
        .ok()
        .filter(|path| !path.trim().is_empty())?;

    // Several CLI invocations may share one PAYSYNC_LOG.
    let path = unique_log_path(&base, chrono::Utc::now().timestamp(), std::process::id());
    match File::create(&path) {
        Ok(file) => Some(file),
        Err(err) => {
            eprintln!("Warning: Failed to create log file {}: {}", path, err);
            None
        }
    }
}

fn unique_log_path(base: &str, timestamp: i64, pid: u32) -> String {
    format!("{}.{}.{}", base, timestamp, pid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_path_carries_timestamp_and_pid() {
        assert_eq!(
            unique_log_path("/tmp/paysync.log", 1760781600, 4242),
            "/tmp/paysync.log.1760781600.4242"
        );
    }
}
