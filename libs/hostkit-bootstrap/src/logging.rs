//! Process-wide logging, installed once from the `logging` config section.
//!
//! Console output is human-readable on stderr; file output is JSON, routed
//! per target prefix to rotating files. Nothing here can be reconfigured
//! after [`init_logging`] returns.

use crate::config::{LoggingConfig, Section};
use file_rotate::{
    compression::Compression,
    suffix::{AppendTimestamp, FileLimit},
    ContentLimit, FileRotate,
};
use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Keeps the non-blocking console writer alive; drop it only at process exit.
#[must_use = "dropping the guard stops console log delivery"]
pub struct LoggingGuard {
    _console: Option<tracing_appender::non_blocking::WorkerGuard>,
}

fn parse_level(s: &str) -> Option<LevelFilter> {
    match s.trim().to_ascii_lowercase().as_str() {
        "trace" => Some(LevelFilter::TRACE),
        "debug" => Some(LevelFilter::DEBUG),
        "info" | "" => Some(LevelFilter::INFO),
        "warn" => Some(LevelFilter::WARN),
        "error" => Some(LevelFilter::ERROR),
        "off" | "none" => Some(LevelFilter::OFF),
        _ => Some(LevelFilter::INFO),
    }
}

/// True when `target` is `prefix` itself or nested under `prefix::`.
fn target_matches(target: &str, prefix: &str) -> bool {
    target
        .strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
}

/// Rotating file shared between every writer handle for one path.
#[derive(Clone)]
struct SharedRotate(Arc<Mutex<FileRotate<AppendTimestamp>>>);

impl Write for SharedRotate {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self.0.lock() {
            Ok(mut f) => f.write(buf),
            // poisoned sink: drop the record
            Err(_) => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self.0.lock() {
            Ok(mut f) => f.flush(),
            Err(_) => Ok(()),
        }
    }
}

/// Writer handle that discards output when no file matches the record.
struct MaybeFile(Option<SharedRotate>);

impl Write for MaybeFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.0 {
            Some(w) => w.write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.0 {
            Some(w) => w.flush(),
            None => Ok(()),
        }
    }
}

/// Routes file records by target prefix, falling back to the default file.
#[derive(Clone, Default)]
struct FileRouter {
    default: Option<SharedRotate>,
    by_prefix: Vec<(String, SharedRotate)>,
}

impl FileRouter {
    fn is_empty(&self) -> bool {
        self.default.is_none() && self.by_prefix.is_empty()
    }

    fn resolve(&self, target: &str) -> Option<SharedRotate> {
        self.by_prefix
            .iter()
            .find(|(prefix, _)| target_matches(target, prefix))
            .map(|(_, w)| w.clone())
            .or_else(|| self.default.clone())
    }
}

impl<'a> fmt::MakeWriter<'a> for FileRouter {
    type Writer = MaybeFile;

    fn make_writer(&'a self) -> Self::Writer {
        MaybeFile(self.default.clone())
    }

    fn make_writer_for(&'a self, meta: &tracing::Metadata<'_>) -> Self::Writer {
        MaybeFile(self.resolve(meta.target()))
    }
}

fn open_rotating(section: &Section, base_dir: &Path) -> std::io::Result<SharedRotate> {
    let p = Path::new(&section.file);
    let path: PathBuf = if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let max_bytes = section.max_size_mb.unwrap_or(100) as usize * 1024 * 1024;
    let rot = FileRotate::new(
        &path,
        AppendTimestamp::default(FileLimit::MaxFiles(section.max_backups.unwrap_or(3))),
        ContentLimit::BytesSurpassed(max_bytes),
        Compression::None,
        None,
    );
    Ok(SharedRotate(Arc::new(Mutex::new(rot))))
}

/// Per-sink filters and file writers derived from the config.
struct Plan {
    console: Targets,
    file: Targets,
    files: FileRouter,
}

fn plan(cfg: &LoggingConfig, base_dir: &Path) -> Plan {
    let default = cfg.get("default");
    let mut files = FileRouter::default();

    if let Some(section) = default.filter(|s| !s.file.trim().is_empty()) {
        match open_rotating(section, base_dir) {
            Ok(w) => files.default = Some(w),
            Err(e) => eprintln!("Failed to open default log file '{}': {e}", section.file),
        }
    }

    let mut console = Targets::new().with_default(
        default
            .and_then(|s| parse_level(&s.console_level))
            .unwrap_or(LevelFilter::INFO),
    );
    let mut file = Targets::new().with_default(
        default
            .filter(|_| files.default.is_some())
            .and_then(|s| parse_level(&s.file_level))
            .unwrap_or(LevelFilter::OFF),
    );

    let mut targets: Vec<(&String, &Section)> =
        cfg.iter().filter(|(k, _)| k.as_str() != "default").collect();
    // Longest prefix first so nested targets win over their parents.
    targets.sort_by_key(|(k, _)| std::cmp::Reverse(k.len()));

    for (target, section) in targets {
        if let Some(level) = parse_level(&section.console_level) {
            console = console.with_target(target.clone(), level);
        }
        if section.file.trim().is_empty() {
            continue;
        }
        match open_rotating(section, base_dir) {
            Ok(w) => {
                files.by_prefix.push((target.clone(), w));
                if let Some(level) = parse_level(&section.file_level) {
                    file = file.with_target(target.clone(), level);
                }
            }
            Err(e) => eprintln!(
                "Failed to open log file for '{target}': {} ({e})",
                section.file
            ),
        }
    }

    Plan {
        console,
        file,
        files,
    }
}

/// Install the global subscriber. Call once, at process start.
///
/// `RUST_LOG`, when set, caps every sink.
pub fn init_logging(cfg: &LoggingConfig, base_dir: &Path) -> LoggingGuard {
    // Bridge `log` → `tracing` before installing the subscriber
    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("LogTracer init skipped: {e}");
    }

    let env = EnvFilter::try_from_default_env().ok();

    if cfg.is_empty() {
        let _ = tracing_subscriber::registry()
            .with(env)
            .with(fmt::layer().with_target(true).with_timer(fmt::time::UtcTime::rfc_3339()))
            .try_init();
        return LoggingGuard { _console: None };
    }

    let Plan {
        console,
        file,
        files,
    } = plan(cfg, base_dir);

    let (stderr, guard) = tracing_appender::non_blocking(std::io::stderr());
    let console_layer = fmt::layer()
        .with_writer(stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(true)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_filter(console);

    let file_layer = (!files.is_empty()).then(|| {
        fmt::layer()
            .json()
            .with_ansi(false)
            .with_target(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_writer(files)
            .with_filter(file)
    });

    let _ = tracing_subscriber::registry()
        .with(env)
        .with(console_layer)
        .with(file_layer)
        .try_init();

    LoggingGuard {
        _console: Some(guard),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn section(console: &str, file: &str, file_level: &str) -> Section {
        Section {
            console_level: console.into(),
            file: file.into(),
            file_level: file_level.into(),
            max_backups: Some(1),
            max_size_mb: Some(1),
        }
    }

    #[test]
    fn target_prefix_matching() {
        assert!(target_matches("hostkit", "hostkit"));
        assert!(target_matches("hostkit::bootstrap", "hostkit"));
        assert!(!target_matches("hostkit_bootstrap", "hostkit"));
        assert!(!target_matches("host", "hostkit"));
    }

    #[test]
    fn unknown_level_defaults_to_info() {
        assert_eq!(parse_level("loud"), Some(LevelFilter::INFO));
        assert_eq!(parse_level("OFF"), Some(LevelFilter::OFF));
        assert_eq!(parse_level("Debug"), Some(LevelFilter::DEBUG));
    }

    #[test]
    fn plan_routes_files_by_prefix() {
        let tmp = tempdir().unwrap();
        let mut cfg = LoggingConfig::new();
        cfg.insert("default".into(), section("info", "logs/host.log", "debug"));
        cfg.insert("hostkit".into(), section("debug", "logs/kernel.log", "trace"));
        cfg.insert("profile".into(), section("warn", "", ""));

        let plan = plan(&cfg, tmp.path());

        assert!(plan.files.default.is_some());
        assert_eq!(plan.files.by_prefix.len(), 1);
        assert!(plan.files.resolve("hostkit::request").is_some());
        assert!(plan.files.resolve("other").is_some(), "falls back to default file");
        assert!(tmp.path().join("logs").exists());
    }

    #[test]
    fn plan_without_default_file_routes_nothing_by_default() {
        let tmp = tempdir().unwrap();
        let mut cfg = LoggingConfig::new();
        cfg.insert("default".into(), section("info", "", ""));

        let plan = plan(&cfg, tmp.path());
        assert!(plan.files.is_empty());
        assert!(plan.files.resolve("anything").is_none());
    }
}
