use log::{debug, error, info, warn};

/// Tags every message with a bracketed component name, e.g. `[SPAWN]`.
#[derive(Debug, Clone, Copy)]
pub struct LogManager {
    tag: &'static str,
}

impl LogManager {
    pub fn new(tag: &'static str) -> Self {
        Self { tag }
    }

    pub fn record(&self, message: &str) {
        info!("[{}] {}", self.tag, message);
    }

    pub fn detail(&self, message: &str) {
        debug!("[{}] {}", self.tag, message);
    }

    pub fn warn(&self, message: &str) {
        warn!("[{}] {}", self.tag, message);
    }

    pub fn error(&self, message: &str) {
        error!("[{}] {}", self.tag, message);
    }
}

impl Default for LogManager {
    fn default() -> Self {
        Self::new("INFO")
    }
}
