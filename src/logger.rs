/// Sink for the human-readable battery lines.
pub trait Logger {
    fn log(&self, text: &str);
}

/// Forwards every line to `tracing` at info level.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, text: &str) {
        tracing::info!(target: "ds4_battery", "{}", text);
    }
}
