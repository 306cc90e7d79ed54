//! Console logging
//!
//! A `log` backend that writes one line per record to stderr, stamped with
//! milliseconds since the logger was installed. The kernel only talks to the
//! `log` facade; boards without a console just never install this.

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::Write;
use std::time::Instant;

/// stderr logger
pub struct ConsoleLogger {
    level: LevelFilter,
    origin: Instant,
}

impl ConsoleLogger {
    pub fn new(level: LevelFilter) -> Self {
        Self {
            level,
            origin: Instant::now(),
        }
    }

    /// Render a record the way it is printed
    pub fn format(&self, record: &Record) -> String {
        format!(
            "[{:>8}ms {:<5} {}] {}",
            self.origin.elapsed().as_millis(),
            record.level(),
            record.target(),
            record.args()
        )
    }
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let line = self.format(record);
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// Install the console logger as the global `log` backend
///
/// Unknown level names fall back to `info`. Fails if a logger is already set.
pub fn init(level: &str) -> Result<(), SetLoggerError> {
    let level = level.parse().unwrap_or(LevelFilter::Info);
    log::set_boxed_logger(Box::new(ConsoleLogger::new(level)))?;
    log::set_max_level(level);
    Ok(())
}
