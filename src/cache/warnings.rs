//! Warnings Module
//!
//! Optional diagnostic channel for evictions and abandoned writes.

use std::fmt;
use std::sync::Arc;

use tracing::warn;

/// Callback receiving each warning message.
pub type WarningHandler = Arc<dyn Fn(&str) + Send + Sync>;

// == Warnings ==
/// Warning sink, disabled by default.
///
/// When enabled, each message is logged with `tracing::warn!` and passed to the
/// handler, if one is installed.
#[derive(Clone, Default)]
pub struct Warnings {
    enabled: bool,
    handler: Option<WarningHandler>,
}

impl Warnings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Installs a handler that receives every emitted message.
    pub fn set_handler(&mut self, handler: WarningHandler) {
        self.handler = Some(handler);
    }

    // == Emit ==
    /// Emits `message` if warnings are enabled.
    pub fn emit(&self, message: &str) {
        if !self.enabled {
            return;
        }

        warn!(target: "quota_cache::warnings", "{}", message);
        if let Some(handler) = &self.handler {
            handler(message);
        }
    }
}

impl fmt::Debug for Warnings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Warnings")
            .field("enabled", &self.enabled)
            .field("handler", &self.handler.is_some())
            .finish()
    }
}
