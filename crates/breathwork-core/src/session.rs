//! Timer loop: per-tick countdowns, phase transitions and the audio they
//! trigger.
//!
//! [`advance`] is the whole state transition for one tick and touches nothing
//! but the state it is handed. [`BreathingSession`] owns that state together
//! with the settings store and the audio gate, and turns the returned
//! [`Effect`]s into sound.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{BackgroundMusicType, BreathConfig, ConfigError, ConfigPatch, EngineConfig};
use crate::phase_machine::{
    cycle_progress, first_phase, next_phase, phase_progress, EndReason, Limits, Phase,
    PhaseDurations, Step,
};
use crate::sensory::sink::{AmbientRequest, AmbientSource, AudioGate, AudioSink, CueKind, CueRequest};
use crate::settings::SettingsStore;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("no phase has a positive duration")]
    EmptyPattern,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub phase: Phase,
    pub is_running: bool,
    pub current_cycle: u32,
    pub remaining_ms: u64,
    pub total_remaining_ms: u64,
    /// Session cap captured at start; `0` when unlimited.
    pub total_limit_ms: u64,
}

impl SessionState {
    pub fn seconds_remaining(&self) -> f64 {
        self.remaining_ms as f64 / 1000.0
    }

    pub fn total_seconds_remaining(&self) -> f64 {
        self.total_remaining_ms as f64 / 1000.0
    }

    pub fn is_paused(&self) -> bool {
        !self.is_running && self.phase != Phase::Idle
    }

    /// The tick stream is armed only in this state.
    pub fn needs_ticking(&self) -> bool {
        self.is_running && self.phase != Phase::Idle
    }
}

/// Inputs of one tick besides the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickContext {
    pub durations: PhaseDurations,
    /// Legacy cycle cap, `0` for none.
    pub cycle_cap: u32,
    pub tick_ms: u64,
    /// Pause instead of ending when the session cap runs out.
    pub hold_at_time_limit: bool,
}

/// What one tick did, in the order it happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// A new cycle began; carries the new cycle number.
    CycleCompleted(u32),
    Entered {
        from: Phase,
        to: Phase,
        duration_ms: u64,
    },
    Ended(EndReason),
    PausedAtTimeLimit,
}

fn end(state: &mut SessionState, reason: EndReason, effects: &mut Vec<Effect>) {
    *state = SessionState::default();
    effects.push(Effect::Ended(reason));
}

/// Run one tick against `state`.
///
/// The session cap is counted down first; its exhaustion ends the session (or
/// pauses it with `hold_at_time_limit`) regardless of the phase. Otherwise the
/// phase countdown runs and on expiry the sequencer picks the next phase; a
/// tick longer than the rest of a phase may enter several phases.
pub fn advance(state: &mut SessionState, ctx: &TickContext) -> Vec<Effect> {
    let mut effects = Vec::new();
    if !state.needs_ticking() {
        return effects;
    }

    if state.total_limit_ms > 0 {
        state.total_remaining_ms = state.total_remaining_ms.saturating_sub(ctx.tick_ms);
        if state.total_remaining_ms == 0 {
            if ctx.hold_at_time_limit {
                state.is_running = false;
                effects.push(Effect::PausedAtTimeLimit);
            } else {
                end(state, EndReason::TimeLimit, &mut effects);
            }
            return effects;
        }
    }

    // Overshoot past a phase boundary runs down the following phase.
    let mut elapsed = ctx.tick_ms;
    loop {
        if state.remaining_ms > elapsed {
            state.remaining_ms -= elapsed;
            return effects;
        }
        elapsed -= state.remaining_ms;

        let limits = Limits {
            total_exhausted: false,
            cycle_cap: ctx.cycle_cap,
            current_cycle: state.current_cycle,
        };
        match next_phase(state.phase, &ctx.durations, &limits) {
            Step::Enter {
                phase,
                duration_ms,
                completes_cycle,
            } => {
                if completes_cycle {
                    state.current_cycle += 1;
                    effects.push(Effect::CycleCompleted(state.current_cycle));
                }
                let from = state.phase;
                state.phase = phase;
                state.remaining_ms = duration_ms;
                effects.push(Effect::Entered {
                    from,
                    to: phase,
                    duration_ms,
                });
            }
            Step::End(reason) => {
                end(state, reason, &mut effects);
                return effects;
            }
        }
        if elapsed == 0 {
            return effects;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not running; nothing happened.
    Skipped,
    Counting,
    Entered(Phase),
    Ended(EndReason),
    /// Cap exhausted while holding; the session is paused in place.
    TimeLimitReached,
}

/// Read-only view published to observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub label: String,
    pub is_running: bool,
    pub current_cycle: u32,
    pub seconds_remaining: f64,
    pub total_seconds_remaining: f64,
    pub phase_progress: f32,
    pub cycle_progress: f32,
}

pub struct BreathingSession {
    state: SessionState,
    config: BreathConfig,
    settings: Box<dyn SettingsStore>,
    audio: AudioGate,
    tick_ms: u64,
    cycle_chime: bool,
}

impl BreathingSession {
    pub fn new(
        settings: Box<dyn SettingsStore>,
        sink: Box<dyn AudioSink>,
        engine: &EngineConfig,
    ) -> Self {
        let config = settings.read();
        Self {
            state: SessionState::default(),
            config,
            settings,
            audio: AudioGate::new(sink),
            tick_ms: engine.tick_ms,
            cycle_chime: engine.cycle_chime,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn config(&self) -> &BreathConfig {
        &self.config
    }

    pub fn tick_ms(&self) -> u64 {
        self.tick_ms
    }

    pub fn needs_ticking(&self) -> bool {
        self.state.needs_ticking()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let durations = self.config.durations();
        let s = &self.state;
        SessionSnapshot {
            phase: s.phase,
            label: s.phase.label().to_string(),
            is_running: s.is_running,
            current_cycle: s.current_cycle,
            seconds_remaining: s.seconds_remaining(),
            total_seconds_remaining: s.total_seconds_remaining(),
            phase_progress: phase_progress(s.phase, s.remaining_ms, &durations),
            cycle_progress: cycle_progress(s.phase, s.remaining_ms, &durations),
        }
    }

    /// Enter the first phase with a fresh countdown. The cycle counter is kept
    /// (at least 1) so a restarted session continues counting.
    pub fn start(&mut self) -> Result<(), SessionError> {
        self.config.validate()?;
        let durations = self.config.durations();
        let (phase, duration_ms) = first_phase(&durations).ok_or(SessionError::EmptyPattern)?;
        let total_limit_ms = self.config.total_limit_ms();

        self.state = SessionState {
            phase,
            is_running: true,
            current_cycle: self.state.current_cycle.max(1),
            remaining_ms: duration_ms,
            total_remaining_ms: total_limit_ms,
            total_limit_ms,
        };
        log::info!(
            "session started: {}/{}/{}/{} ms, limit {} ms",
            durations.inhale_ms,
            durations.hold_ms,
            durations.exhale_ms,
            durations.hold_after_exhale_ms,
            total_limit_ms
        );

        self.audio.ensure_ready();
        if let Some(kind) = CueKind::for_phase(phase) {
            self.play_cue(kind, duration_ms);
        }
        self.start_ambient_if_enabled();
        Ok(())
    }

    /// Idle starts, running pauses, paused resumes.
    pub fn toggle(&mut self) -> Result<(), SessionError> {
        self.audio.ensure_ready();
        if self.state.is_running {
            self.pause();
        } else if self.state.phase == Phase::Idle {
            self.start()?;
        } else {
            self.resume();
        }
        Ok(())
    }

    pub fn pause(&mut self) -> bool {
        if !self.state.is_running {
            return false;
        }
        self.state.is_running = false;
        self.audio.stop_ambient();
        log::debug!("session paused in {}", self.state.phase.as_str());
        true
    }

    pub fn resume(&mut self) -> bool {
        if !self.state.is_paused() {
            return false;
        }
        self.state.is_running = true;
        self.start_ambient_if_enabled();
        log::debug!("session resumed in {}", self.state.phase.as_str());
        true
    }

    /// Back to idle with zeroed counters; every sound stops.
    pub fn reset(&mut self) {
        self.state = SessionState::default();
        self.audio.silence();
    }

    pub fn tick(&mut self, hold_at_time_limit: bool) -> TickOutcome {
        if !self.state.needs_ticking() {
            return TickOutcome::Skipped;
        }
        let ctx = TickContext {
            durations: self.config.durations(),
            cycle_cap: self.config.total_cycles,
            tick_ms: self.tick_ms,
            hold_at_time_limit,
        };

        let mut outcome = TickOutcome::Counting;
        for effect in advance(&mut self.state, &ctx) {
            match effect {
                Effect::CycleCompleted(cycle) => {
                    log::debug!("cycle {} begins", cycle);
                    if self.cycle_chime {
                        self.play_cue(CueKind::CycleComplete, 0);
                    }
                }
                Effect::Entered {
                    from,
                    to,
                    duration_ms,
                } => {
                    log::debug!("{} -> {} ({} ms)", from.as_str(), to.as_str(), duration_ms);
                    if let Some(kind) = CueKind::for_phase(to) {
                        self.play_cue(kind, duration_ms);
                    }
                    outcome = TickOutcome::Entered(to);
                }
                Effect::Ended(reason) => {
                    log::info!("session ended: {:?}", reason);
                    self.audio.stop_ambient();
                    outcome = TickOutcome::Ended(reason);
                }
                Effect::PausedAtTimeLimit => {
                    self.audio.stop_ambient();
                    outcome = TickOutcome::TimeLimitReached;
                }
            }
        }
        outcome
    }

    /// Write through the settings store. Durations take effect at the next
    /// phase transition; ambient changes apply to a running bed at once.
    pub fn update_config(&mut self, patch: &ConfigPatch) -> Result<&BreathConfig, SessionError> {
        let merged = self.settings.write(patch)?;
        let before = std::mem::replace(&mut self.config, merged);
        if self.state.is_running {
            self.apply_ambient_change(&before);
        }
        Ok(&self.config)
    }

    fn apply_ambient_change(&mut self, before: &BreathConfig) {
        let now = &self.config;
        let source_changed = before.background_music_type != now.background_music_type
            || (now.background_music_type == BackgroundMusicType::Custom
                && before.custom_music_source != now.custom_music_source);

        match (before.background_music_enabled, now.background_music_enabled) {
            (true, false) => self.audio.stop_ambient(),
            (false, true) => self.start_ambient_if_enabled(),
            (true, true) if source_changed => self.start_ambient_if_enabled(),
            (true, true) if before.background_music_volume != now.background_music_volume => {
                self.audio.set_ambient_volume(now.background_music_volume)
            }
            _ => {}
        }
    }

    fn play_cue(&mut self, kind: CueKind, phase_ms: u64) {
        if !self.config.sound_enabled {
            return;
        }
        self.audio.play_cue(&CueRequest {
            kind,
            phase_ms,
            style: self.config.sound_type,
            volume: self.config.sound_volume.min(100) as f32 / 100.0,
        });
    }

    fn start_ambient_if_enabled(&mut self) {
        if self.config.background_music_enabled {
            let request = ambient_request(&self.config);
            self.audio.start_ambient(&request);
        }
    }
}

impl std::fmt::Debug for BreathingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BreathingSession")
            .field("state", &self.state)
            .field("tick_ms", &self.tick_ms)
            .field("audio", &self.audio)
            .finish()
    }
}

pub fn ambient_request(config: &BreathConfig) -> AmbientRequest {
    let source = match config.background_music_type {
        BackgroundMusicType::Custom => {
            AmbientSource::Custom(config.custom_music_source.clone().unwrap_or_default())
        }
        kind => AmbientSource::Synth(kind),
    };
    AmbientRequest {
        source,
        volume: config.background_music_volume,
    }
}
