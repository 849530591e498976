//! Breathwork core: breathing phase sequencer, timer loop, cue and ambient
//! synthesis, and the resonance frequency test.
//!
//! Curated exports: the session surface lives in [`coach`], the pure
//! transition logic in [`phase_machine`] and [`session::advance`].

pub mod breath_patterns;
pub mod coach;
pub mod config;
pub mod phase_machine;
pub mod resonance;
pub mod runtime;
pub mod sensory;
pub mod session;
pub mod settings;

#[cfg(test)]
pub mod tests_config;
#[cfg(test)]
pub mod tests_proptest;

pub use breath_patterns::{builtin_patterns, BreathPattern, PatternCatalog, PatternError};
pub use coach::{Coach, CoachError, CoachSnapshot, ObserverId, SessionObserver};
pub use config::{
    AppConfig, BackgroundMusicType, BreathConfig, ConfigError, ConfigPatch, EngineConfig,
    SoundType,
};
pub use phase_machine::{EndReason, Phase, PhaseDurations};
pub use resonance::{ResonanceError, ResonancePreset, ResonanceTest, ResonanceTestState, TestStage};
pub use runtime::{Command, Runtime, RuntimeError};
pub use sensory::{AudioError, AudioSink, Mixer, NullSink, SharedMixer};
pub use session::{BreathingSession, SessionError, SessionSnapshot, SessionState, TickOutcome};
pub use settings::{InMemorySettings, SettingsStore};
