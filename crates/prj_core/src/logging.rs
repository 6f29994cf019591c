//! Process logging bootstrap.
//!
//! # Responsibility
//! - Install the `log` backend once per process, writing to stderr or to
//!   size-rotated files in a vault-independent directory.
//! - Report panics as single-line log events before the default hook runs.
//!
//! # Invariants
//! - A second init with the same `LoggingConfig` is a no-op.
//! - A second init with another level or target fails with
//!   `LoggingError::Conflict` and leaves the active backend untouched.
//! - Nothing here panics.

use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::{error, info};
use once_cell::sync::OnceCell;
use std::any::Any;
use std::borrow::Cow;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Once;

const FILE_BASENAME: &str = "prj";
const ROTATE_AT_BYTES: u64 = 5 * 1024 * 1024;
const KEEP_ROTATED: usize = 7;
const PANIC_SUMMARY_CHARS: usize = 200;

static ACTIVE: OnceCell<ActiveLogger> = OnceCell::new();
static PANIC_HOOK: Once = Once::new();

/// Severity threshold accepted by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// `Debug` for debug builds, `Info` otherwise.
    pub fn for_build() -> Self {
        if cfg!(debug_assertions) {
            Self::Debug
        } else {
            Self::Info
        }
    }
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = LoggingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim().to_ascii_lowercase();
        match wanted.as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(LoggingError::UnknownLevel(wanted)),
        }
    }
}

/// Where log records go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    /// Rotating files under an absolute directory.
    Dir(PathBuf),
}

impl Display for LogTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stderr => f.write_str("stderr"),
            Self::Dir(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Level and target of the process logger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub target: LogTarget,
}

impl LoggingConfig {
    pub fn stderr(level: &str) -> Result<Self, LoggingError> {
        Ok(Self {
            level: level.parse()?,
            target: LogTarget::Stderr,
        })
    }

    /// File logging under `dir`, which must be absolute.
    pub fn files(level: &str, dir: &str) -> Result<Self, LoggingError> {
        let dir = dir.trim();
        if dir.is_empty() || !Path::new(dir).is_absolute() {
            return Err(LoggingError::RelativeDir(dir.to_string()));
        }
        Ok(Self {
            level: level.parse()?,
            target: LogTarget::Dir(PathBuf::from(dir)),
        })
    }
}

#[derive(Debug)]
pub enum LoggingError {
    UnknownLevel(String),
    RelativeDir(String),
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    Backend(flexi_logger::FlexiLoggerError),
    /// Logging is already running with another configuration.
    Conflict {
        active: LoggingConfig,
        requested: LoggingConfig,
    },
}

impl Display for LoggingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownLevel(level) => write!(
                f,
                "unknown log level `{level}` (trace, debug, info, warn, error)"
            ),
            Self::RelativeDir(dir) => write!(f, "log directory `{dir}` is not an absolute path"),
            Self::CreateDir { path, source } => {
                write!(f, "cannot create log directory `{}`: {source}", path.display())
            }
            Self::Backend(err) => write!(f, "logger backend failed: {err}"),
            Self::Conflict { active, requested } => write!(
                f,
                "logging runs at {}/{}; cannot switch to {}/{}",
                active.level, active.target, requested.level, requested.target
            ),
        }
    }
}

impl Error for LoggingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::CreateDir { source, .. } => Some(source),
            Self::Backend(err) => Some(err),
            _ => None,
        }
    }
}

struct ActiveLogger {
    config: LoggingConfig,
    _handle: LoggerHandle,
}

/// Starts the process logger.
///
/// # Errors
/// - `Conflict` when another configuration is already active.
/// - `CreateDir`/`Backend` when the backend cannot start.
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    let active = ACTIVE.get_or_try_init(|| start(config))?;
    if active.config != *config {
        return Err(LoggingError::Conflict {
            active: active.config.clone(),
            requested: config.clone(),
        });
    }
    Ok(())
}

/// Active configuration, once logging runs.
pub fn active_logging() -> Option<LoggingConfig> {
    ACTIVE.get().map(|active| active.config.clone())
}

fn start(config: &LoggingConfig) -> Result<ActiveLogger, LoggingError> {
    let logger = Logger::try_with_str(config.level.as_str()).map_err(LoggingError::Backend)?;
    let logger = match &config.target {
        LogTarget::Stderr => logger.log_to_stderr().format(flexi_logger::detailed_format),
        LogTarget::Dir(dir) => {
            std::fs::create_dir_all(dir).map_err(|source| LoggingError::CreateDir {
                path: dir.clone(),
                source,
            })?;
            logger
                .log_to_file(FileSpec::default().directory(dir).basename(FILE_BASENAME))
                .rotate(
                    Criterion::Size(ROTATE_AT_BYTES),
                    Naming::Numbers,
                    Cleanup::KeepLogFiles(KEEP_ROTATED),
                )
                .append()
                .write_mode(WriteMode::BufferAndFlush)
                .format_for_files(flexi_logger::detailed_format)
        }
    };
    let handle = logger.start().map_err(LoggingError::Backend)?;

    PANIC_HOOK.call_once(install_panic_hook);
    info!(
        "event=logging_ready module=logging status=ok level={} target={} os={} version={}",
        config.level,
        config.target,
        std::env::consts::OS,
        env!("CARGO_PKG_VERSION")
    );

    Ok(ActiveLogger {
        config: config.clone(),
        _handle: handle,
    })
}

fn install_panic_hook() {
    let next = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let location = panic
            .location()
            .map_or_else(|| "unknown".to_string(), |at| format!("{}:{}", at.file(), at.line()));
        error!(
            "event=panic module=logging status=error location={} message={}",
            location,
            one_line(&panic_message(panic.payload()), PANIC_SUMMARY_CHARS)
        );
        next(panic);
    }));
}

fn panic_message(payload: &(dyn Any + Send)) -> Cow<'_, str> {
    if let Some(text) = payload.downcast_ref::<&str>() {
        Cow::Borrowed(*text)
    } else if let Some(text) = payload.downcast_ref::<String>() {
        Cow::Borrowed(text.as_str())
    } else {
        Cow::Borrowed("<opaque payload>")
    }
}

/// Folds line breaks into spaces and cuts to `limit` characters.
fn one_line(text: &str, limit: usize) -> String {
    let mut out: String = text
        .chars()
        .map(|c| if matches!(c, '\n' | '\r') { ' ' } else { c })
        .take(limit)
        .collect();
    if text.chars().nth(limit).is_some() {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{active_logging, init_logging, one_line, LogLevel, LoggingConfig, LoggingError};

    #[test]
    fn levels_parse_loosely() {
        assert_eq!("WARNING".parse::<LogLevel>().expect("warning"), LogLevel::Warn);
        assert_eq!(" trace ".parse::<LogLevel>().expect("trace"), LogLevel::Trace);
        assert!(matches!(
            "loud".parse::<LogLevel>(),
            Err(LoggingError::UnknownLevel(level)) if level == "loud"
        ));
    }

    #[test]
    fn file_target_needs_absolute_dir() {
        assert!(matches!(
            LoggingConfig::files("info", "logs"),
            Err(LoggingError::RelativeDir(_))
        ));
        assert!(LoggingConfig::files("info", "   ").is_err());
        assert!(LoggingConfig::files("bogus", "/tmp/prj-logs").is_err());
    }

    #[test]
    fn one_line_flattens_and_cuts() {
        assert_eq!(one_line("a\nb\rc", 10), "a b c");
        assert_eq!(one_line("abcdef", 3), "abc...");
        assert_eq!(one_line("abc", 3), "abc");
    }

    #[test]
    fn second_init_must_match_the_first() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let dir = dir.path().to_str().expect("utf-8 temp dir").to_string();
        let config = LoggingConfig::files("info", &dir).expect("valid config");

        init_logging(&config).expect("first init should succeed");
        init_logging(&config).expect("same config is a no-op");

        let louder = LoggingConfig::files("debug", &dir).expect("valid config");
        assert!(matches!(
            init_logging(&louder),
            Err(LoggingError::Conflict { .. })
        ));
        let stderr = LoggingConfig::stderr("info").expect("valid config");
        assert!(init_logging(&stderr).is_err());

        assert_eq!(active_logging(), Some(config));
    }
}
