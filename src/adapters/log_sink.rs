//! Host log backend.
//!
//! Implements [`log::Log`] by writing one line per record to stderr, with
//! the emitting thread's name so event-pump and timer output can be told
//! apart from the caller's.  The library itself never installs a logger;
//! the simulator binary does.

use std::io::Write;
use std::time::Instant;

use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

pub struct StderrLogger {
    level: LevelFilter,
    started: Instant,
}

impl StderrLogger {
    pub fn new(level: LevelFilter) -> Self {
        Self {
            level,
            started: Instant::now(),
        }
    }

    /// Leak a logger and install it as the global `log` backend.
    pub fn install(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger: &'static Self = Box::leak(Box::new(Self::new(level)));
        log::set_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }
}

fn tag(level: Level) -> &'static str {
    match level {
        Level::Error => "E",
        Level::Warn => "W",
        Level::Info => "I",
        Level::Debug => "D",
        Level::Trace => "V",
    }
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let ms = self.started.elapsed().as_millis();
        let thread = std::thread::current();
        let _ = writeln!(
            std::io::stderr().lock(),
            "{} ({ms}) [{}] {}",
            tag(record.level()),
            thread.name().unwrap_or("?"),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}
