use proptest::prelude::*;

/// Property-based tests for the sequencer and the timer loop.

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase_machine::{next_phase, Limits, Phase, PhaseDurations, Step};
    use crate::session::{advance, Effect, SessionState, TickContext};

    fn durations() -> impl Strategy<Value = PhaseDurations> {
        (1u64..20, 0u64..20, 1u64..20, 0u64..20).prop_map(|(i, h, e, ha)| PhaseDurations {
            inhale_ms: i * 100,
            hold_ms: h * 100,
            exhale_ms: e * 100,
            hold_after_exhale_ms: ha * 100,
        })
    }

    // =========================================================================
    // Sequencer: skipped phases are never entered
    // =========================================================================
    proptest! {
        #[test]
        fn test_zero_phases_never_entered(d in durations(), steps in 1usize..40) {
            let mut phase = Phase::Inhale;
            for _ in 0..steps {
                match next_phase(phase, &d, &Limits::default()) {
                    Step::Enter { phase: next, duration_ms, .. } => {
                        prop_assert!(duration_ms > 0);
                        prop_assert_eq!(duration_ms, d.of(next));
                        phase = next;
                    }
                    Step::End(r) => prop_assert!(false, "unexpected end {:?}", r),
                }
            }
        }
    }

    proptest! {
        #[test]
        fn test_no_holds_alternates_inhale_exhale(i in 1u64..50, e in 1u64..50, steps in 1usize..40) {
            let d = PhaseDurations { inhale_ms: i * 100, hold_ms: 0, exhale_ms: e * 100, hold_after_exhale_ms: 0 };
            let mut phase = Phase::Inhale;
            for _ in 0..steps {
                if let Step::Enter { phase: next, .. } = next_phase(phase, &d, &Limits::default()) {
                    prop_assert!(matches!(next, Phase::Inhale | Phase::Exhale));
                    prop_assert_ne!(next, phase);
                    phase = next;
                }
            }
        }
    }

    // =========================================================================
    // Timer loop: one cycle increment per full loop, whatever is skipped
    // =========================================================================
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn test_cycle_increments_once_per_loop(d in durations(), loops in 1u32..5) {
            let ctx = TickContext { durations: d, cycle_cap: 0, tick_ms: 100, hold_at_time_limit: false };
            let mut state = SessionState {
                phase: Phase::Inhale,
                is_running: true,
                current_cycle: 1,
                remaining_ms: d.inhale_ms,
                ..SessionState::default()
            };
            let ticks = d.total_ms() / 100 * loops as u64;
            let mut completions = 0u32;
            for _ in 0..ticks {
                for e in advance(&mut state, &ctx) {
                    if let Effect::CycleCompleted(n) = e {
                        completions += 1;
                        prop_assert_eq!(n, completions + 1);
                    }
                }
            }
            prop_assert_eq!(completions, loops);
            prop_assert_eq!(state.current_cycle, loops + 1);
            prop_assert_eq!(state.phase, Phase::Inhale);
        }
    }

    proptest! {
        #[test]
        fn test_no_time_lost_at_phase_boundaries(
            ms in (1u64..3000, 0u64..3000, 1u64..3000, 0u64..3000),
            tick_ms in 10u64..1000,
            ticks in 1u64..300,
        ) {
            let d = PhaseDurations { inhale_ms: ms.0, hold_ms: ms.1, exhale_ms: ms.2, hold_after_exhale_ms: ms.3 };
            let ctx = TickContext { durations: d, cycle_cap: 0, tick_ms, hold_at_time_limit: false };
            let mut state = SessionState {
                phase: Phase::Inhale,
                is_running: true,
                current_cycle: 1,
                remaining_ms: d.inhale_ms,
                ..SessionState::default()
            };
            for _ in 0..ticks {
                advance(&mut state, &ctx);
            }
            let before: u64 = Phase::CYCLE
                .iter()
                .take_while(|p| **p != state.phase)
                .map(|p| d.of(*p))
                .sum();
            let in_cycle = before + d.of(state.phase) - state.remaining_ms;
            let elapsed = (state.current_cycle as u64 - 1) * d.total_ms() + in_cycle;
            prop_assert_eq!(elapsed, ticks * tick_ms);
            prop_assert!(state.remaining_ms > 0);
        }
    }

    proptest! {
        #[test]
        fn test_total_countdown_never_increases(d in durations(), total_s in 1u64..30, ticks in 1usize..400) {
            let ctx = TickContext { durations: d, cycle_cap: 0, tick_ms: 100, hold_at_time_limit: false };
            let mut state = SessionState {
                phase: Phase::Inhale,
                is_running: true,
                current_cycle: 1,
                remaining_ms: d.inhale_ms,
                total_remaining_ms: total_s * 1000,
                total_limit_ms: total_s * 1000,
            };
            let mut last = state.total_remaining_ms;
            for _ in 0..ticks {
                advance(&mut state, &ctx);
                prop_assert!(state.total_remaining_ms <= last);
                last = state.total_remaining_ms;
            }
            if ticks as u64 >= total_s * 10 {
                prop_assert_eq!(state.phase, Phase::Idle);
            }
        }
    }
}
