//! Breathing phases and the transition policy between them.
//!
//! Durations are integer milliseconds so fractional-second settings and the
//! tick size compose without drift.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    #[default]
    Idle,
    Inhale,
    Hold,
    Exhale,
    HoldAfterExhale,
}

impl Phase {
    /// Phases of one cycle, in order.
    pub const CYCLE: [Phase; 4] = [
        Phase::Inhale,
        Phase::Hold,
        Phase::Exhale,
        Phase::HoldAfterExhale,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Inhale => "inhale",
            Phase::Hold => "hold",
            Phase::Exhale => "exhale",
            Phase::HoldAfterExhale => "holdAfterExhale",
        }
    }

    /// Label shown to the user.
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Idle => "Ready",
            Phase::Inhale => "Inhale",
            Phase::Hold | Phase::HoldAfterExhale => "Hold",
            Phase::Exhale => "Exhale",
        }
    }

    /// Position in cycle order, ignoring durations. Idle leads into inhale.
    fn successor(self) -> Phase {
        match self {
            Phase::Idle => Phase::Inhale,
            Phase::Inhale => Phase::Hold,
            Phase::Hold => Phase::Exhale,
            Phase::Exhale => Phase::HoldAfterExhale,
            Phase::HoldAfterExhale => Phase::Inhale,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PhaseDurations {
    pub inhale_ms: u64,
    pub hold_ms: u64,
    pub exhale_ms: u64,
    pub hold_after_exhale_ms: u64,
}

/// Seconds to whole milliseconds; negative or non-finite input maps to 0.
pub fn secs_to_ms(seconds: f64) -> u64 {
    if seconds.is_finite() && seconds > 0.0 {
        (seconds * 1000.0).round() as u64
    } else {
        0
    }
}

impl PhaseDurations {
    pub fn from_seconds(inhale: f64, hold: f64, exhale: f64, hold_after_exhale: f64) -> Self {
        Self {
            inhale_ms: secs_to_ms(inhale),
            hold_ms: secs_to_ms(hold),
            exhale_ms: secs_to_ms(exhale),
            hold_after_exhale_ms: secs_to_ms(hold_after_exhale),
        }
    }

    pub fn of(&self, phase: Phase) -> u64 {
        match phase {
            Phase::Idle => 0,
            Phase::Inhale => self.inhale_ms,
            Phase::Hold => self.hold_ms,
            Phase::Exhale => self.exhale_ms,
            Phase::HoldAfterExhale => self.hold_after_exhale_ms,
        }
    }

    pub fn total_ms(&self) -> u64 {
        self.inhale_ms
            .saturating_add(self.hold_ms)
            .saturating_add(self.exhale_ms)
            .saturating_add(self.hold_after_exhale_ms)
    }

    /// No phase can be entered.
    pub fn is_empty(&self) -> bool {
        self.total_ms() == 0
    }

    pub fn breaths_per_minute(&self) -> f32 {
        let total = self.total_ms();
        if total == 0 {
            return 0.0;
        }
        60_000.0 / total as f32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EndReason {
    /// Session cap (`total_minutes`) elapsed.
    TimeLimit,
    /// Legacy cycle-count cap reached.
    CycleLimit,
    /// Every phase has zero duration.
    EmptyPattern,
    /// Stopped from outside (reset, cancel, finalized test).
    Stopped,
}

/// Counters the sequencer needs besides the durations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Limits {
    /// The session cap has been reached.
    pub total_exhausted: bool,
    /// `0` means no cycle cap.
    pub cycle_cap: u32,
    pub current_cycle: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Enter {
        phase: Phase,
        duration_ms: u64,
        /// The transition crossed into a new cycle.
        completes_cycle: bool,
    },
    End(EndReason),
}

/// Decide what follows `expired`.
///
/// Walks the cycle order and enters the first phase with a non-zero duration.
/// A cycle completes when the walk wraps from hold-after-exhale to inhale; with
/// a cycle cap that wrap ends the session once `current_cycle` reached the cap.
pub fn next_phase(expired: Phase, durations: &PhaseDurations, limits: &Limits) -> Step {
    if limits.total_exhausted {
        return Step::End(EndReason::TimeLimit);
    }

    let mut cursor = expired;
    let mut crossed = false;
    for _ in 0..Phase::CYCLE.len() {
        if cursor == Phase::HoldAfterExhale {
            crossed = true;
        }
        cursor = cursor.successor();
        let duration_ms = durations.of(cursor);
        if duration_ms == 0 {
            continue;
        }
        if crossed && limits.cycle_cap > 0 && limits.current_cycle >= limits.cycle_cap {
            return Step::End(EndReason::CycleLimit);
        }
        return Step::Enter {
            phase: cursor,
            duration_ms,
            completes_cycle: crossed,
        };
    }
    Step::End(EndReason::EmptyPattern)
}

/// First phase a fresh session enters: inhale unless it is skipped.
pub fn first_phase(durations: &PhaseDurations) -> Option<(Phase, u64)> {
    match next_phase(Phase::Idle, durations, &Limits::default()) {
        Step::Enter {
            phase, duration_ms, ..
        } => Some((phase, duration_ms)),
        Step::End(_) => None,
    }
}

/// Fraction of the current phase already elapsed, in [0, 1].
pub fn phase_progress(phase: Phase, remaining_ms: u64, durations: &PhaseDurations) -> f32 {
    let total = durations.of(phase);
    if total == 0 {
        return 0.0;
    }
    let elapsed = total.saturating_sub(remaining_ms);
    (elapsed as f32 / total as f32).clamp(0.0, 1.0)
}

/// Fraction of the whole cycle already elapsed, in [0, 1].
pub fn cycle_progress(phase: Phase, remaining_ms: u64, durations: &PhaseDurations) -> f32 {
    let total = durations.total_ms();
    if total == 0 || phase == Phase::Idle {
        return 0.0;
    }
    let before: u64 = Phase::CYCLE
        .iter()
        .take_while(|p| **p != phase)
        .map(|p| durations.of(*p))
        .sum();
    let elapsed = durations.of(phase).saturating_sub(remaining_ms);
    let pos = before.saturating_add(elapsed).min(total);
    pos as f32 / total as f32
}
