//! Console logger implementation

use super::traits::Logger;
use super::file_logger::LogLevel;

/// A logger that writes to the console
///
/// Info goes to stdout, everything else to stderr. Messages below
/// `min_level` are dropped.
#[derive(Debug, Clone)]
pub struct ConsoleLogger {
    prefix: String,
    min_level: LogLevel,
}

impl Default for ConsoleLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleLogger {
    pub fn new() -> Self {
        Self {
            prefix: "[Keyvault]".to_string(),
            min_level: LogLevel::Info,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    fn format(&self, level: LogLevel, message: &str) -> Option<String> {
        (level >= self.min_level).then(|| format!("{} {}: {}", self.prefix, level.as_str(), message))
    }
}

impl Logger for ConsoleLogger {
    fn debug(&self, message: &str) {
        if let Some(line) = self.format(LogLevel::Debug, message) {
            eprintln!("{}", line);
        }
    }

    fn info(&self, message: &str) {
        if let Some(line) = self.format(LogLevel::Info, message) {
            println!("{}", line);
        }
    }

    fn warn(&self, message: &str) {
        if let Some(line) = self.format(LogLevel::Warn, message) {
            eprintln!("{}", line);
        }
    }

    fn error(&self, message: &str) {
        if let Some(line) = self.format(LogLevel::Error, message) {
            eprintln!("{}", line);
        }
    }
}
