//! Resonance frequency test.
//!
//! Sweeps six paced-breathing rates from 7.0 down to 4.5 breaths per minute,
//! collects a 1-5 comfort rating per rate and reports the best-rated one. The
//! controller drives an ordinary [`BreathingSession`]: it rewrites the
//! durations and cap per preset, and the session pauses (instead of ending)
//! when a preset's time runs out.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::breath_patterns::BreathPattern;
use crate::config::{validate_preset_minutes, ConfigError, ConfigPatch};
use crate::session::{BreathingSession, SessionError};

pub const PATTERN_ID: &str = "resonance";

#[derive(Error, Debug)]
pub enum ResonanceError {
    #[error("rating must be between 1 and 5, got {0}")]
    InvalidRating(u8),
    #[error("preset {0} needs a rating before moving on")]
    RatingRequired(usize),
    #[error("cannot {op} while the test is {stage:?}")]
    WrongStage { op: &'static str, stage: TestStage },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResonancePreset {
    pub breaths_per_minute: f32,
    pub inhale_seconds: f64,
    pub exhale_seconds: f64,
}

/// Roughly 40:60 inhale to exhale, no holds.
pub const PRESETS: [ResonancePreset; 6] = [
    ResonancePreset {
        breaths_per_minute: 7.0,
        inhale_seconds: 3.4,
        exhale_seconds: 5.2,
    },
    ResonancePreset {
        breaths_per_minute: 6.5,
        inhale_seconds: 3.7,
        exhale_seconds: 5.5,
    },
    ResonancePreset {
        breaths_per_minute: 6.0,
        inhale_seconds: 4.0,
        exhale_seconds: 6.0,
    },
    ResonancePreset {
        breaths_per_minute: 5.5,
        inhale_seconds: 4.4,
        exhale_seconds: 6.5,
    },
    ResonancePreset {
        breaths_per_minute: 5.0,
        inhale_seconds: 4.8,
        exhale_seconds: 7.2,
    },
    ResonancePreset {
        breaths_per_minute: 4.5,
        inhale_seconds: 5.3,
        exhale_seconds: 8.0,
    },
];

impl ResonancePreset {
    fn session_patch(&self, minutes: f64) -> ConfigPatch {
        ConfigPatch {
            total_minutes: Some(minutes),
            ..ConfigPatch::durations(self.inhale_seconds, 0.0, self.exhale_seconds, 0.0)
        }
    }

    pub fn as_pattern(&self) -> BreathPattern {
        BreathPattern::new(
            PATTERN_ID,
            format!("{} BPM Resonance", self.breaths_per_minute),
            self.inhale_seconds,
            0.0,
            self.exhale_seconds,
            0.0,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TestStage {
    #[default]
    Intro,
    Testing,
    Rating,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResonanceTestState {
    pub is_active: bool,
    pub is_completed: bool,
    pub current_frequency_index: usize,
    pub ratings: [Option<u8>; 6],
    /// Index into [`PRESETS`] of the winner, once completed.
    pub resonant_frequency: Option<usize>,
    pub stage: TestStage,
    pub skip_rating: bool,
    pub minutes_per_preset: f64,
}

impl Default for ResonanceTestState {
    fn default() -> Self {
        Self::initial(true, 2.0)
    }
}

impl ResonanceTestState {
    fn initial(skip_rating: bool, minutes_per_preset: f64) -> Self {
        Self {
            is_active: false,
            is_completed: false,
            current_frequency_index: 0,
            ratings: [None; 6],
            resonant_frequency: None,
            stage: TestStage::Intro,
            skip_rating,
            minutes_per_preset,
        }
    }

    pub fn current_preset(&self) -> &ResonancePreset {
        &PRESETS[self.current_frequency_index.min(PRESETS.len() - 1)]
    }

    pub fn resonant_preset(&self) -> Option<&ResonancePreset> {
        self.resonant_frequency.map(|i| &PRESETS[i])
    }
}

/// Index of the strictly highest rating; the earliest wins a tie.
pub fn best_rated(ratings: &[Option<u8>]) -> Option<usize> {
    let mut best: Option<(usize, u8)> = None;
    for (i, rating) in ratings.iter().enumerate() {
        if let Some(r) = *rating {
            if best.map_or(true, |(_, b)| r > b) {
                best = Some((i, r));
            }
        }
    }
    best.map(|(i, _)| i)
}

#[derive(Debug, Clone, Default)]
pub struct ResonanceTest {
    state: ResonanceTestState,
}

impl ResonanceTest {
    pub fn new(skip_rating: bool, minutes_per_preset: f64) -> Self {
        Self {
            state: ResonanceTestState::initial(skip_rating, minutes_per_preset),
        }
    }

    pub fn state(&self) -> &ResonanceTestState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active
    }

    fn wrong_stage(&self, op: &'static str) -> ResonanceError {
        ResonanceError::WrongStage {
            op,
            stage: self.state.stage,
        }
    }

    pub fn start(
        &mut self,
        session: &mut BreathingSession,
        minutes_per_preset: f64,
        skip_rating: bool,
    ) -> Result<(), ResonanceError> {
        if self.state.is_active {
            return Err(self.wrong_stage("start"));
        }
        validate_preset_minutes(minutes_per_preset)?;

        self.state = ResonanceTestState {
            is_active: true,
            stage: TestStage::Testing,
            ..ResonanceTestState::initial(skip_rating, minutes_per_preset)
        };
        if let Err(e) = self.run_preset(session, 0) {
            self.state = ResonanceTestState::initial(skip_rating, minutes_per_preset);
            return Err(e);
        }
        log::info!(
            "resonance test started: {} min per preset, skip rating {}",
            minutes_per_preset,
            skip_rating
        );
        Ok(())
    }

    fn run_preset(&mut self, session: &mut BreathingSession, index: usize) -> Result<(), ResonanceError> {
        let preset = &PRESETS[index];
        session.update_config(&preset.session_patch(self.state.minutes_per_preset))?;
        session.start()?;
        self.state.current_frequency_index = index;
        self.state.stage = TestStage::Testing;
        log::debug!("resonance preset {}: {} bpm", index, preset.breaths_per_minute);
        Ok(())
    }

    /// The session paused because the preset's time ran out.
    pub fn on_time_limit(&mut self, session: &mut BreathingSession) -> Result<(), ResonanceError> {
        if !self.state.is_active || self.state.stage != TestStage::Testing {
            return Ok(());
        }
        self.state.stage = TestStage::Rating;
        if self.state.skip_rating {
            self.next(session)?;
        }
        Ok(())
    }

    /// Rate the current preset, replacing any earlier rating.
    pub fn rate(&mut self, rating: u8) -> Result<(), ResonanceError> {
        if !(1..=5).contains(&rating) {
            return Err(ResonanceError::InvalidRating(rating));
        }
        if !self.state.is_active {
            return Err(self.wrong_stage("rate"));
        }
        let index = self.state.current_frequency_index;
        self.state.ratings[index] = Some(rating);
        Ok(())
    }

    /// Move on to the next preset, or finish after the last one. Unless
    /// rating is skipped, a preset whose time ran out must be rated first.
    pub fn next(&mut self, session: &mut BreathingSession) -> Result<(), ResonanceError> {
        if !self.state.is_active {
            return Err(self.wrong_stage("advance"));
        }
        let current = self.state.current_frequency_index;
        if !self.state.skip_rating
            && self.state.stage == TestStage::Rating
            && self.state.ratings[current].is_none()
        {
            return Err(ResonanceError::RatingRequired(current));
        }
        let next = current + 1;
        if next >= PRESETS.len() {
            self.finalize(session);
            return Ok(());
        }
        self.run_preset(session, next)
    }

    pub fn finalize(&mut self, session: &mut BreathingSession) {
        session.reset();
        self.state.resonant_frequency = best_rated(&self.state.ratings);
        self.state.is_active = false;
        self.state.is_completed = true;
        self.state.stage = TestStage::Completed;
        match self.state.resonant_preset() {
            Some(p) => log::info!("resonance test completed: {} bpm", p.breaths_per_minute),
            None => log::info!("resonance test completed: no resonant frequency found"),
        }
    }

    /// Stop mid-test and forget every rating. The breathing settings written
    /// for the test stay in place.
    pub fn cancel(&mut self, session: &mut BreathingSession) {
        if self.state.is_active {
            session.reset();
            log::info!(
                "resonance test cancelled at preset {}",
                self.state.current_frequency_index
            );
        }
        self.clear();
    }

    /// Select the resonant rate as the current pattern and close the test.
    pub fn apply(
        &mut self,
        session: &mut BreathingSession,
    ) -> Result<Option<BreathPattern>, ResonanceError> {
        let pattern = self.state.resonant_preset().map(ResonancePreset::as_pattern);
        if let Some(p) = &pattern {
            session.update_config(&p.as_patch())?;
        }
        self.exit(session);
        Ok(pattern)
    }

    pub fn exit(&mut self, session: &mut BreathingSession) {
        if self.state.is_active {
            session.reset();
        }
        self.clear();
    }

    fn clear(&mut self) {
        self.state = ResonanceTestState::initial(self.state.skip_rating, self.state.minutes_per_preset);
    }
}
