//! Single owner of the running session, the resonance test and the pattern
//! catalog. Every mutation goes through here and is followed by exactly one
//! snapshot to the registered observers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::breath_patterns::{BreathPattern, PatternCatalog, PatternError};
use crate::config::{BreathConfig, ConfigError, ConfigPatch, EngineConfig};
use crate::resonance::{ResonanceError, ResonanceTest, ResonanceTestState};
use crate::sensory::sink::AudioSink;
use crate::session::{BreathingSession, SessionError, SessionSnapshot, SessionState, TickOutcome};
use crate::settings::SettingsStore;

#[derive(Error, Debug)]
pub enum CoachError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Resonance(#[from] ResonanceError),
    #[error(transparent)]
    Pattern(#[from] PatternError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoachSnapshot {
    pub session: SessionSnapshot,
    pub resonance: ResonanceTestState,
}

pub trait SessionObserver: Send {
    fn on_update(&mut self, snapshot: &CoachSnapshot);
}

impl<F> SessionObserver for F
where
    F: FnMut(&CoachSnapshot) + Send,
{
    fn on_update(&mut self, snapshot: &CoachSnapshot) {
        self(snapshot)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

pub struct Coach {
    session: BreathingSession,
    resonance: ResonanceTest,
    catalog: PatternCatalog,
    observers: Vec<(ObserverId, Box<dyn SessionObserver>)>,
    next_observer: u64,
}

impl Coach {
    pub fn new(
        settings: Box<dyn SettingsStore>,
        sink: Box<dyn AudioSink>,
        engine: &EngineConfig,
    ) -> Self {
        let catalog = PatternCatalog::new(settings.read().custom_patterns);
        Self {
            session: BreathingSession::new(settings, sink, engine),
            resonance: ResonanceTest::new(engine.skip_rating, engine.resonance_minutes_per_preset),
            catalog,
            observers: Vec::new(),
            next_observer: 0,
        }
    }

    pub fn subscribe(&mut self, observer: impl SessionObserver + 'static) -> ObserverId {
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(oid, _)| *oid != id);
        self.observers.len() != before
    }

    pub fn snapshot(&self) -> CoachSnapshot {
        CoachSnapshot {
            session: self.session.snapshot(),
            resonance: self.resonance.state().clone(),
        }
    }

    fn publish(&mut self) {
        if self.observers.is_empty() {
            return;
        }
        let snapshot = self.snapshot();
        for (_, observer) in self.observers.iter_mut() {
            observer.on_update(&snapshot);
        }
    }

    /// Publish once the mutation is done, whether or not it succeeded.
    fn mutate<T, E>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, E>) -> Result<T, CoachError>
    where
        CoachError: From<E>,
    {
        let result = f(self);
        self.publish();
        result.map_err(CoachError::from)
    }

    pub fn state(&self) -> &SessionState {
        self.session.state()
    }

    pub fn config(&self) -> &BreathConfig {
        self.session.config()
    }

    pub fn resonance(&self) -> &ResonanceTestState {
        self.resonance.state()
    }

    pub fn patterns(&self) -> &PatternCatalog {
        &self.catalog
    }

    pub fn tick_ms(&self) -> u64 {
        self.session.tick_ms()
    }

    pub fn needs_ticking(&self) -> bool {
        self.session.needs_ticking()
    }

    pub fn start(&mut self) -> Result<(), CoachError> {
        self.mutate(|c| c.session.start())
    }

    pub fn toggle(&mut self) -> Result<(), CoachError> {
        self.mutate(|c| c.session.toggle())
    }

    /// Stop everything. A running resonance test is cancelled with it.
    pub fn reset(&mut self) {
        if self.resonance.is_active() {
            self.resonance.cancel(&mut self.session);
        } else {
            self.session.reset();
        }
        self.publish();
    }

    pub fn update_config(&mut self, patch: &ConfigPatch) -> Result<(), CoachError> {
        self.mutate(|c| c.session.update_config(patch).map(|_| ()))
    }

    pub fn apply_pattern(&mut self, id: &str) -> Result<BreathPattern, CoachError> {
        let pattern = self
            .catalog
            .get(id)
            .cloned()
            .ok_or_else(|| PatternError::NotFound(id.to_string()))?;
        self.update_config(&pattern.as_patch())?;
        Ok(pattern)
    }

    pub fn add_custom_pattern(&mut self, pattern: BreathPattern) -> Result<(), CoachError> {
        let mut next = self.catalog.clone();
        next.add_custom(pattern)?;
        self.store_catalog(next)
    }

    pub fn remove_custom_pattern(&mut self, id: &str) -> Result<BreathPattern, CoachError> {
        let mut next = self.catalog.clone();
        let removed = next.remove_custom(id)?;
        self.store_catalog(next)?;
        Ok(removed)
    }

    fn store_catalog(&mut self, catalog: PatternCatalog) -> Result<(), CoachError> {
        self.update_config(&ConfigPatch {
            custom_patterns: Some(catalog.custom().to_vec()),
            ..Default::default()
        })?;
        self.catalog = catalog;
        Ok(())
    }

    /// `None` falls back to the engine defaults.
    pub fn start_resonance(
        &mut self,
        minutes_per_preset: Option<f64>,
        skip_rating: Option<bool>,
    ) -> Result<(), CoachError> {
        let minutes = minutes_per_preset.unwrap_or(self.resonance.state().minutes_per_preset);
        let skip = skip_rating.unwrap_or(self.resonance.state().skip_rating);
        self.mutate(|c| c.resonance.start(&mut c.session, minutes, skip))
    }

    pub fn rate_resonance(&mut self, rating: u8) -> Result<(), CoachError> {
        self.mutate(|c| c.resonance.rate(rating))
    }

    pub fn next_resonance(&mut self) -> Result<(), CoachError> {
        self.mutate(|c| c.resonance.next(&mut c.session))
    }

    pub fn cancel_resonance(&mut self) {
        self.resonance.cancel(&mut self.session);
        self.publish();
    }

    pub fn apply_resonance(&mut self) -> Result<Option<BreathPattern>, CoachError> {
        self.mutate(|c| c.resonance.apply(&mut c.session))
    }

    pub fn exit_resonance(&mut self) {
        self.resonance.exit(&mut self.session);
        self.publish();
    }

    /// One timer tick. A resonance test holds the session at its time limit
    /// and takes over from there.
    pub fn tick(&mut self) -> TickOutcome {
        let outcome = self.session.tick(self.resonance.is_active());
        if outcome == TickOutcome::Skipped {
            return outcome;
        }
        if outcome == TickOutcome::TimeLimitReached {
            if let Err(e) = self.resonance.on_time_limit(&mut self.session) {
                log::warn!("resonance test aborted: {}", e);
                self.resonance.cancel(&mut self.session);
            }
        }
        self.publish();
        outcome
    }
}

impl std::fmt::Debug for Coach {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coach")
            .field("session", &self.session)
            .field("resonance", &self.resonance)
            .field("observers", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase_machine::Phase;
    use crate::sensory::sink::NullSink;
    use crate::settings::InMemorySettings;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn coach() -> Coach {
        Coach::new(
            Box::new(InMemorySettings::default()),
            Box::new(NullSink),
            &EngineConfig::default(),
        )
    }

    #[test]
    fn observers_see_every_mutation_and_tick() {
        let mut c = coach();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let id = c.subscribe(move |s: &CoachSnapshot| sink.lock().push(s.session.phase));

        c.start().unwrap();
        c.tick();
        c.toggle().unwrap();
        c.tick(); // paused, nothing published
        assert_eq!(seen.lock().len(), 3);
        assert!(c.unsubscribe(id));
        assert!(!c.unsubscribe(id));
        c.reset();
        assert_eq!(*seen.lock(), vec![Phase::Inhale; 3]);
    }

    #[test]
    fn failed_mutation_still_publishes() {
        let mut c = coach();
        let count = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&count);
        c.subscribe(move |_: &CoachSnapshot| *counter.lock() += 1);
        assert!(c.rate_resonance(3).is_err());
        assert_eq!(*count.lock(), 1);
    }

    #[test]
    fn apply_pattern_writes_durations() {
        let mut c = coach();
        let p = c.apply_pattern("4-4-4-4").unwrap();
        assert_eq!(p.name, "Box");
        assert_eq!(c.config().hold_after_exhale_seconds, 4.0);
        assert_eq!(c.config().current_pattern_id, "4-4-4-4");
        assert!(matches!(
            c.apply_pattern("nope"),
            Err(CoachError::Pattern(PatternError::NotFound(_)))
        ));
    }

    #[test]
    fn custom_patterns_reach_the_settings() {
        let mut c = coach();
        c.add_custom_pattern(BreathPattern::new("slow", "Slow", 6.0, 0.0, 9.0, 0.0))
            .unwrap();
        assert_eq!(c.config().custom_patterns.len(), 1);
        assert!(c.patterns().get("slow").is_some());
        c.apply_pattern("slow").unwrap();
        assert_eq!(c.config().exhale_seconds, 9.0);
        c.remove_custom_pattern("slow").unwrap();
        assert!(c.config().custom_patterns.is_empty());
    }

    #[test]
    fn tick_hands_time_limit_to_the_test() {
        let mut c = coach();
        c.start_resonance(Some(0.5), Some(true)).unwrap();
        let mut outcome = TickOutcome::Counting;
        for _ in 0..300 {
            outcome = c.tick();
        }
        assert_eq!(outcome, TickOutcome::TimeLimitReached);
        assert_eq!(c.resonance().current_frequency_index, 1);
        assert!(c.needs_ticking());
    }
}
