//! Settings read/write boundary.
//!
//! The core merges partial updates but never persists them; persistence is
//! the store implementation's business.

use crate::config::{BreathConfig, ConfigError, ConfigPatch};

pub trait SettingsStore: Send {
    fn read(&self) -> BreathConfig;

    /// Merge `patch` into the stored settings and return the result. A merge
    /// that fails validation leaves the store unchanged.
    fn write(&mut self, patch: &ConfigPatch) -> Result<BreathConfig, ConfigError>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemorySettings {
    config: BreathConfig,
}

impl InMemorySettings {
    pub fn new(config: BreathConfig) -> Self {
        Self { config }
    }
}

impl SettingsStore for InMemorySettings {
    fn read(&self) -> BreathConfig {
        self.config.clone()
    }

    fn write(&mut self, patch: &ConfigPatch) -> Result<BreathConfig, ConfigError> {
        let next = self.config.patched(patch);
        next.validate()?;
        self.config = next;
        Ok(self.config.clone())
    }
}
