//! Phase-entry cues.
//!
//! Inhale and exhale cues sweep pitch across the whole phase under a swell
//! envelope that starts and ends at zero. Hold cues are short steady blips.
//! `Beep` renders a sine oscillator, `BreathNoise` renders band-passed noise
//! whose center follows the same pitch trajectory.

use std::f32::consts::PI;

use crate::config::SoundType;
use crate::sensory::filter::Biquad;
use crate::sensory::noise::{NoiseColor, NoiseSource};
use crate::sensory::sink::{CueKind, CueRequest};

/// Length of the hold blips.
pub const HOLD_CUE_MS: u64 = 200;
/// Sweeps shorter than this would click; clamp up.
const MIN_SWEEP_MS: u64 = 250;
/// Attack and release of blips.
const EDGE_MS: f32 = 5.0;
/// Noise cues track `NOISE_CENTER_RATIO` times the tonal pitch.
const NOISE_CENTER_RATIO: f32 = 3.0;
const NOISE_Q: f32 = 0.9;
/// Band-passed noise loses most of its energy; bring it back to beep level.
const NOISE_MAKEUP: f32 = 2.5;
/// Filter retune interval in samples.
const CONTROL_BLOCK: u32 = 32;

/// C5, E5, G5.
const CHIME_NOTES: [f32; 3] = [523.25, 659.25, 783.99];
const CHIME_STAGGER_MS: u64 = 100;
const CHIME_NOTE_MS: u64 = 300;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Envelope {
    /// Half-sine over the whole voice.
    Swell,
    /// Fast attack, exponential decay to 1% of peak, fast release.
    Blip,
    /// 50 ms linear attack then exponential decay.
    Pluck,
}

/// Pitch and level plan of one voice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CueShape {
    pub start_hz: f32,
    pub end_hz: f32,
    pub duration_ms: u64,
    pub peak: f32,
    pub envelope: Envelope,
}

impl CueShape {
    pub fn for_kind(kind: CueKind, phase_ms: u64) -> CueShape {
        let sweep_ms = phase_ms.max(MIN_SWEEP_MS);
        match kind {
            CueKind::Inhale => CueShape {
                start_hz: 220.0,
                end_hz: 440.0,
                duration_ms: sweep_ms,
                peak: 0.3,
                envelope: Envelope::Swell,
            },
            CueKind::Exhale => CueShape {
                start_hz: 440.0,
                end_hz: 220.0,
                duration_ms: sweep_ms,
                peak: 0.3,
                envelope: Envelope::Swell,
            },
            CueKind::Hold => CueShape {
                start_hz: 440.0,
                end_hz: 440.0,
                duration_ms: HOLD_CUE_MS,
                peak: 0.2,
                envelope: Envelope::Blip,
            },
            CueKind::HoldAfterExhale => CueShape {
                start_hz: 330.0,
                end_hz: 330.0,
                duration_ms: HOLD_CUE_MS,
                peak: 0.15,
                envelope: Envelope::Blip,
            },
            CueKind::CycleComplete => CueShape {
                start_hz: CHIME_NOTES[0],
                end_hz: CHIME_NOTES[0],
                duration_ms: CHIME_NOTE_MS,
                peak: 0.2,
                envelope: Envelope::Pluck,
            },
        }
    }
}

#[derive(Debug, Clone)]
enum Source {
    Sine { phase: f32 },
    Noise { noise: NoiseSource, filter: Biquad },
}

/// One playing cue voice. Produces samples until its shape is exhausted.
#[derive(Debug, Clone)]
pub struct CueVoice {
    shape: CueShape,
    source: Source,
    sample_rate: f32,
    gain: f32,
    delay: u32,
    position: u32,
    length: u32,
}

impl CueVoice {
    pub fn new(shape: CueShape, style: SoundType, volume: f32, sample_rate: u32, seed: u64) -> Self {
        let sr = sample_rate as f32;
        let source = match style {
            SoundType::Beep => Source::Sine { phase: 0.0 },
            SoundType::BreathNoise => Source::Noise {
                noise: NoiseSource::new(NoiseColor::White, seed),
                filter: Biquad::band_pass(sr, shape.start_hz * NOISE_CENTER_RATIO, NOISE_Q),
            },
        };
        let makeup = if matches!(style, SoundType::BreathNoise) {
            NOISE_MAKEUP
        } else {
            1.0
        };
        Self {
            shape,
            source,
            sample_rate: sr,
            gain: volume.clamp(0.0, 1.0) * makeup,
            delay: 0,
            position: 0,
            length: ms_to_samples(shape.duration_ms, sample_rate),
        }
    }

    /// Start after `delay_ms` of silence.
    pub fn delayed(mut self, delay_ms: u64) -> Self {
        self.delay = ms_to_samples(delay_ms, self.sample_rate as u32);
        self
    }

    pub fn shape(&self) -> &CueShape {
        &self.shape
    }

    pub fn is_finished(&self) -> bool {
        self.delay == 0 && self.position >= self.length
    }

    /// Samples still to be produced, including any leading delay.
    pub fn remaining_samples(&self) -> u32 {
        self.delay.saturating_add(self.length.saturating_sub(self.position))
    }

    #[inline]
    fn frequency_at(&self, t: f32) -> f32 {
        // Exponential glide, like an exponential ramp on an oscillator.
        let ratio = self.shape.end_hz / self.shape.start_hz;
        self.shape.start_hz * ratio.powf(t)
    }

    #[inline]
    fn envelope_at(&self, n: u32) -> f32 {
        let len = self.length.max(1) as f32;
        let t = n as f32 / len;
        let edge = (EDGE_MS * 0.001 * self.sample_rate).max(1.0);
        match self.shape.envelope {
            Envelope::Swell => (PI * t).sin(),
            Envelope::Blip => {
                let attack = (n as f32 / edge).min(1.0);
                let release = ((len - n as f32) / edge).clamp(0.0, 1.0);
                // exp decay from 1.0 to 0.01 across the voice
                let decay = (0.01f32.ln() * t).exp();
                attack * decay * release
            }
            Envelope::Pluck => {
                let attack_len = 0.05 * self.sample_rate;
                let n = n as f32;
                if n < attack_len {
                    n / attack_len
                } else {
                    let td = (n - attack_len) / (len - attack_len).max(1.0);
                    let release = ((len - n) / edge).clamp(0.0, 1.0);
                    (0.01f32.ln() * td).exp() * release
                }
            }
        }
    }

    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        if self.delay > 0 {
            self.delay -= 1;
            return 0.0;
        }
        if self.position >= self.length {
            return 0.0;
        }
        let n = self.position;
        let t = n as f32 / self.length.max(1) as f32;
        let freq = self.frequency_at(t);
        let raw = match &mut self.source {
            Source::Sine { phase } => {
                let s = (2.0 * PI * *phase).sin();
                *phase = (*phase + freq / self.sample_rate).fract();
                s
            }
            Source::Noise { noise, filter } => {
                if n % CONTROL_BLOCK == 0 {
                    filter.tune(freq * NOISE_CENTER_RATIO, NOISE_Q);
                }
                filter.process(noise.next_sample())
            }
        };
        let out = raw * self.envelope_at(n) * self.shape.peak * self.gain;
        self.position += 1;
        out
    }

    /// Add this voice into `out`, returning how many samples were written.
    pub fn mix_into(&mut self, out: &mut [f32]) -> usize {
        let mut written = 0;
        for slot in out.iter_mut() {
            if self.is_finished() {
                break;
            }
            *slot += self.next_sample();
            written += 1;
        }
        written
    }
}

/// Sample count for `ms`, clamped to `u32::MAX` for absurd lengths.
pub fn ms_to_samples(ms: u64, sample_rate: u32) -> u32 {
    let samples = ms.saturating_mul(sample_rate as u64) / 1000;
    u32::try_from(samples).unwrap_or(u32::MAX)
}

/// Voices that make up one cue request.
pub fn voices_for(request: &CueRequest, sample_rate: u32, seed: u64) -> Vec<CueVoice> {
    match request.kind {
        CueKind::CycleComplete => CHIME_NOTES
            .iter()
            .enumerate()
            .map(|(i, &hz)| {
                let shape = CueShape {
                    start_hz: hz,
                    end_hz: hz,
                    ..CueShape::for_kind(CueKind::CycleComplete, 0)
                };
                // The chime is always tonal.
                CueVoice::new(shape, SoundType::Beep, request.volume, sample_rate, seed)
                    .delayed(i as u64 * CHIME_STAGGER_MS)
            })
            .collect(),
        kind => {
            let shape = CueShape::for_kind(kind, request.phase_ms);
            vec![CueVoice::new(
                shape,
                request.style,
                request.volume,
                sample_rate,
                seed,
            )]
        }
    }
}

/// Render a whole cue into a fresh buffer.
pub fn render_cue(request: &CueRequest, sample_rate: u32, seed: u64) -> Vec<f32> {
    let mut voices = voices_for(request, sample_rate, seed);
    let len = voices
        .iter()
        .map(|v| v.remaining_samples() as usize)
        .max()
        .unwrap_or(0);
    let mut out = vec![0.0f32; len];
    for v in voices.iter_mut() {
        v.mix_into(&mut out);
    }
    out
}
