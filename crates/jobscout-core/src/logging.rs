//! Log level control.
//!
//! There is no process-wide logger state owned by this crate: the binary
//! installs a subscriber with [`init`] and hands the returned [`LogControl`]
//! to whatever should be allowed to change the level (typically the engine).

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Registry, reload};

use crate::config::LogLevel;
use crate::error::AppError;

/// Handle for changing the active log level at runtime.
#[derive(Clone)]
pub struct LogControl {
    handle: reload::Handle<LevelFilter, Registry>,
}

impl std::fmt::Debug for LogControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogControl")
            .field("level", &self.current())
            .finish()
    }
}

fn level_filter(level: LogLevel) -> LevelFilter {
    LevelFilter::from_level(level.as_tracing())
}

/// Builds a reloadable level filter layer and its control handle without
/// installing anything.
pub fn layer(level: LogLevel) -> (reload::Layer<LevelFilter, Registry>, LogControl) {
    let (layer, handle) = reload::Layer::new(level_filter(level));
    (layer, LogControl { handle })
}

/// Installs a stderr `fmt` subscriber gated by a reloadable level filter.
pub fn init(level: LogLevel) -> Result<LogControl, AppError> {
    let (filter, control) = layer(level);
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| AppError::Config(format!("failed to install log subscriber: {e}")))?;
    Ok(control)
}

impl LogControl {
    pub fn apply(&self, level: LogLevel) -> Result<(), AppError> {
        self.handle
            .reload(level_filter(level))
            .map_err(|e| AppError::Config(format!("failed to change log level: {e}")))
    }

    pub fn current(&self) -> Option<LevelFilter> {
        self.handle.clone_current()
    }
}
