//! Logger that forwards to `tracing`

use super::traits::Logger;

/// Bridges the `Logger` trait onto `tracing` events
///
/// Events are emitted with the `keyvault` target so they can be filtered
/// with `RUST_LOG=keyvault=debug`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl TracingLogger {
    pub fn new() -> Self {
        Self
    }
}

impl Logger for TracingLogger {
    fn debug(&self, message: &str) {
        tracing::debug!(target: "keyvault", "{}", message);
    }

    fn info(&self, message: &str) {
        tracing::info!(target: "keyvault", "{}", message);
    }

    fn warn(&self, message: &str) {
        tracing::warn!(target: "keyvault", "{}", message);
    }

    fn error(&self, message: &str) {
        tracing::error!(target: "keyvault", "{}", message);
    }
}
