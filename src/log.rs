//! Logging capability injected into capture sessions.
//!
//! Sessions never log through a global; they hold an `Arc<dyn Logger>`. The default
//! [`TracingLogger`] forwards to `tracing`, so level filtering belongs to whatever subscriber the
//! application installs.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// Sink for leveled text events
pub trait Logger: Send + Sync {
    fn log(&self, level: Level, args: fmt::Arguments<'_>);
}

/// Forwards events to the `tracing` macros under the `v4l_capture` target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: Level, args: fmt::Arguments<'_>) {
        match level {
            Level::Debug => tracing::debug!(target: "v4l_capture", "{}", args),
            Level::Info => tracing::info!(target: "v4l_capture", "{}", args),
            Level::Warning => tracing::warn!(target: "v4l_capture", "{}", args),
            Level::Error => tracing::error!(target: "v4l_capture", "{}", args),
        }
    }
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLogger;

impl Logger for NullLogger {
    fn log(&self, _level: Level, _args: fmt::Arguments<'_>) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn loggers_are_object_safe() {
        let loggers: Vec<Arc<dyn Logger>> = vec![Arc::new(TracingLogger), Arc::new(NullLogger)];
        for logger in &loggers {
            logger.log(Level::Info, format_args!("{} buffers", 4));
        }
    }

    #[test]
    fn levels_are_ordered_by_severity() {
        assert!(Level::Debug < Level::Info);
        assert!(Level::Warning < Level::Error);
        assert_eq!(Level::Warning.to_string(), "WARNING");
    }
}
