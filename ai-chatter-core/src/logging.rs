use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

use crate::config::schema::Verbosity;

/// Build the level filter. `RUST_LOG` wins over the configured verbosity.
pub fn build_filter(verbosity: Verbosity, rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(verbosity.as_filter()))
}

/// Initialize the logging system
///
/// Log lines go to stderr so they never mix with replies on stdout. When a
/// log file is given, a second plain-text layer appends to it; the returned
/// guard flushes that writer on drop and must be kept alive.
pub fn init_logging(
    verbosity: Verbosity,
    log_file: Option<&Path>,
) -> crate::Result<Option<WorkerGuard>> {
    let rust_log = std::env::var("RUST_LOG").ok();
    let filter = build_filter(verbosity, rust_log.as_deref());

    let format_str = std::env::var("LOG_FORMAT").unwrap_or_default();
    let is_json = format_str.eq_ignore_ascii_case("json");

    let stderr_layer = if is_json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let (dir, name) = split_log_path(path)?;
            std::fs::create_dir_all(&dir)?;
            let appender = tracing_appender::rolling::never(&dir, name);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = if is_json {
                fmt::layer()
                    .json()
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .boxed()
            } else {
                fmt::layer()
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .boxed()
            };
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    Registry::default()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| crate::Error::Config(format!("failed to initialize logging: {}", e)))?;

    Ok(guard)
}

fn split_log_path(path: &Path) -> crate::Result<(std::path::PathBuf, std::ffi::OsString)> {
    let name = path.file_name().ok_or_else(|| {
        crate::Error::Config(format!("log file path has no file name: {}", path.display()))
    })?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::path::PathBuf::from("."),
    };
    Ok((dir, name.to_os_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn test_filter_uses_verbosity_without_rust_log() {
        let filter = build_filter(Verbosity::Info, None);
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::INFO));
        let filter = build_filter(Verbosity::Warning, Some("  "));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::WARN));
    }

    #[test]
    fn test_filter_prefers_rust_log() {
        let filter = build_filter(Verbosity::Error, Some("ai_chatter_core=trace"));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::TRACE));
    }

    #[test]
    fn test_split_log_path() {
        let (dir, name) = split_log_path(Path::new("/var/log/chatter.log")).unwrap();
        assert_eq!(dir, Path::new("/var/log"));
        assert_eq!(name, "chatter.log");

        let (dir, name) = split_log_path(Path::new("chatter.log")).unwrap();
        assert_eq!(dir, Path::new("."));
        assert_eq!(name, "chatter.log");
    }
}
