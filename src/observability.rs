//! Logging and observability helpers.

pub mod sensitive;

pub use sensitive::Sensitive;

use std::any::Any;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

use crate::metrics;

const LOG_FILE_PREFIX: &str = "vdbgate.log";
const LOG_RETENTION_DAYS: u64 = 14;
const LOG_DIR_ENV: &str = "VDBGATE_LOG_DIR";
const LOG_FILTER_ENV: &str = "VDBGATE_LOG";

/// Federation spans log at debug, everything else at info.
const DEFAULT_DIRECTIVES: &str = "vdbgate=info,vdbgate::federation=debug,vdbgate_core=info";

/// Installs the JSON file subscriber and panic hook.
///
/// Safe to call more than once; later calls keep the first subscriber.
pub fn init_tracing() {
    let log_dir = log_directory();
    let _ = fs::create_dir_all(&log_dir);

    match cleanup_old_logs(&log_dir, LOG_RETENTION_DAYS) {
        Ok(0) => {}
        Ok(removed) => eprintln!("Removed {removed} expired gateway log file(s)"),
        Err(e) => eprintln!("Failed to clean up old logs: {e}"),
    }

    let file_appender: RollingFileAppender =
        tracing_appender::rolling::daily(&log_dir, LOG_FILE_PREFIX);
    let directives = filter_directives(
        std::env::var(LOG_FILTER_ENV)
            .or_else(|_| std::env::var(EnvFilter::DEFAULT_ENV))
            .ok(),
    );
    let env_filter =
        EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(file_appender)
        .json()
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_current_span(true)
        .with_span_list(true)
        .with_ansi(false)
        .with_span_events(FmtSpan::CLOSE)
        .try_init();

    install_panic_hook();

    tracing::info!(log_dir = %log_dir.display(), filter = %directives, "Gateway tracing initialized");
}

/// Filter directives: an explicit override, else the gateway defaults
fn filter_directives(from_env: Option<String>) -> String {
    from_env
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| DEFAULT_DIRECTIVES.to_string())
}

/// Logs panics with the deployment counters at the time of the crash.
fn install_panic_hook() {
    let previous_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let stats = metrics::snapshot();

        tracing::error!(
            target: "vdbgate::panic",
            location = %location,
            message = %panic_message(panic_info.payload()),
            deployments = stats.deployments,
            failed_deployments = stats.failed_deployments,
            "Gateway panicked"
        );

        previous_hook(panic_info);
    }));
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown cause"
    }
}

/// Directory log files are written to.
///
/// `VDBGATE_LOG_DIR` wins; otherwise `.vdbgate/logs` under the user's home.
pub fn log_directory() -> PathBuf {
    if let Some(dir) = std::env::var_os(LOG_DIR_ENV) {
        return PathBuf::from(dir);
    }

    let home = if cfg!(windows) {
        std::env::var_os("APPDATA").or_else(|| std::env::var_os("USERPROFILE"))
    } else {
        std::env::var_os("HOME")
    };
    PathBuf::from(home.unwrap_or_default())
        .join(".vdbgate")
        .join("logs")
}

/// Removes rolled gateway logs older than the retention window.
fn cleanup_old_logs(log_dir: &Path, retention_days: u64) -> std::io::Result<usize> {
    let retention = Duration::from_secs(retention_days * 24 * 60 * 60);
    let now = SystemTime::now();
    let mut removed = 0;

    for entry in fs::read_dir(log_dir)? {
        let path = entry?.path();
        let is_gateway_log = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(LOG_FILE_PREFIX));
        if !is_gateway_log {
            continue;
        }

        let Some(age) = fs::metadata(&path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
        else {
            continue;
        };

        if age > retention {
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => eprintln!("Failed to remove old log file {}: {e}", path.display()),
            }
        }
    }
    Ok(removed)
}
