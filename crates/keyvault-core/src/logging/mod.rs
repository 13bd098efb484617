//! Logging
//!
//! Components take an `Arc<dyn Logger>`; the process-wide file log in
//! `file_logger` covers code paths that have none.

mod traits;
mod noop;
mod console;
mod tracing_logger;
pub mod file_logger;

pub use traits::Logger;
pub use noop::NoOpLogger;
pub use console::ConsoleLogger;
pub use tracing_logger::TracingLogger;

pub use file_logger::{
    log, trace, debug, info, warn, error,
    log_file_path, LogLevel,
};
