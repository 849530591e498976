//! Breathing Patterns Registry
//!
//! Built-in patterns plus a user-extensible list. Selecting a pattern is a
//! bulk update of the four phase durations.
//!
//! # Patterns Available
//! - **4-7-8**: Relaxing
//! - **4-0-4-0**: Simple
//! - **4-4-4-4**: Box
//! - **4-0-8-0**: Calming
//! - **5-5-5-5**: Balanced
//! - **6-0-6-0**: Easy

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConfigPatch;
use crate::phase_machine::PhaseDurations;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PatternError {
    #[error("pattern id already exists: {0}")]
    Duplicate(String),
    #[error("built-in pattern cannot be changed: {0}")]
    BuiltIn(String),
    #[error("unknown pattern: {0}")]
    NotFound(String),
    #[error("pattern {0} has no positive phase duration")]
    Empty(String),
}

/// Breathing pattern definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreathPattern {
    /// Unique pattern identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Phase timings in seconds
    pub inhale_seconds: f64,
    pub hold_seconds: f64,
    pub exhale_seconds: f64,
    pub hold_after_exhale_seconds: f64,
    #[serde(default)]
    pub is_built_in: bool,
}

impl BreathPattern {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        inhale: f64,
        hold: f64,
        exhale: f64,
        hold_after_exhale: f64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            inhale_seconds: inhale,
            hold_seconds: hold,
            exhale_seconds: exhale,
            hold_after_exhale_seconds: hold_after_exhale,
            is_built_in: false,
        }
    }

    fn built_in(id: &str, name: &str, inhale: f64, hold: f64, exhale: f64, hold_after: f64) -> Self {
        Self {
            is_built_in: true,
            ..Self::new(id, name, inhale, hold, exhale, hold_after)
        }
    }

    /// Get PhaseDurations for this pattern
    pub fn to_phase_durations(&self) -> PhaseDurations {
        PhaseDurations::from_seconds(
            self.inhale_seconds,
            self.hold_seconds,
            self.exhale_seconds,
            self.hold_after_exhale_seconds,
        )
    }

    /// Total cycle duration in seconds
    pub fn total_seconds(&self) -> f64 {
        self.inhale_seconds + self.hold_seconds + self.exhale_seconds + self.hold_after_exhale_seconds
    }

    /// Calculate breaths per minute for this pattern
    pub fn breaths_per_minute(&self) -> f32 {
        self.to_phase_durations().breaths_per_minute()
    }

    /// Settings update that selects this pattern.
    pub fn as_patch(&self) -> ConfigPatch {
        ConfigPatch {
            current_pattern_id: Some(self.id.clone()),
            ..ConfigPatch::durations(
                self.inhale_seconds,
                self.hold_seconds,
                self.exhale_seconds,
                self.hold_after_exhale_seconds,
            )
        }
    }
}

/// Get all built-in breathing patterns, in display order
pub fn builtin_patterns() -> Vec<BreathPattern> {
    vec![
        BreathPattern::built_in("4-7-8", "Relaxing", 4.0, 7.0, 8.0, 0.0),
        BreathPattern::built_in("4-0-4-0", "Simple", 4.0, 0.0, 4.0, 0.0),
        BreathPattern::built_in("4-4-4-4", "Box", 4.0, 4.0, 4.0, 4.0),
        BreathPattern::built_in("4-0-8-0", "Calming", 4.0, 0.0, 8.0, 0.0),
        BreathPattern::built_in("5-5-5-5", "Balanced", 5.0, 5.0, 5.0, 5.0),
        BreathPattern::built_in("6-0-6-0", "Easy", 6.0, 0.0, 6.0, 0.0),
    ]
}

/// Built-in list followed by the user's own patterns.
#[derive(Debug, Clone)]
pub struct PatternCatalog {
    builtin: Vec<BreathPattern>,
    custom: Vec<BreathPattern>,
}

impl Default for PatternCatalog {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl PatternCatalog {
    /// Custom entries that collide with a built-in id are dropped.
    pub fn new(custom: Vec<BreathPattern>) -> Self {
        let builtin = builtin_patterns();
        let custom = custom
            .into_iter()
            .filter(|p| !builtin.iter().any(|b| b.id == p.id))
            .map(|p| BreathPattern {
                is_built_in: false,
                ..p
            })
            .collect();
        Self { builtin, custom }
    }

    pub fn get(&self, id: &str) -> Option<&BreathPattern> {
        self.all().find(|p| p.id == id)
    }

    pub fn all(&self) -> impl Iterator<Item = &BreathPattern> {
        self.builtin.iter().chain(self.custom.iter())
    }

    pub fn custom(&self) -> &[BreathPattern] {
        &self.custom
    }

    pub fn add_custom(&mut self, pattern: BreathPattern) -> Result<(), PatternError> {
        if let Some(existing) = self.get(&pattern.id) {
            return Err(if existing.is_built_in {
                PatternError::BuiltIn(pattern.id)
            } else {
                PatternError::Duplicate(pattern.id)
            });
        }
        if pattern.to_phase_durations().is_empty() {
            return Err(PatternError::Empty(pattern.id));
        }
        self.custom.push(BreathPattern {
            is_built_in: false,
            ..pattern
        });
        Ok(())
    }

    pub fn remove_custom(&mut self, id: &str) -> Result<BreathPattern, PatternError> {
        if self.builtin.iter().any(|p| p.id == id) {
            return Err(PatternError::BuiltIn(id.to_string()));
        }
        let pos = self
            .custom
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| PatternError::NotFound(id.to_string()))?;
        Ok(self.custom.remove(pos))
    }
}
