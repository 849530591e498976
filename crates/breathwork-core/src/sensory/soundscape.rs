//! Ambient background bed.
//!
//! Every synthesized background type is one row of [`PROFILES`]: a noise color
//! and a filter recipe. [`AmbientBed`] runs that recipe as one generic
//! noise -> filter -> gain pipeline.

use std::f32::consts::PI;

use crate::config::BackgroundMusicType;
use crate::sensory::filter::Biquad;
use crate::sensory::noise::{NoiseColor, NoiseSource};

/// Level of synthesized beds at 100% volume.
const SYNTH_HEADROOM: f32 = 0.3;
/// Level of user-supplied beds at 100% volume.
const CUSTOM_HEADROOM: f32 = 0.5;
/// Time constant of the volume smoother.
const GAIN_SMOOTH_MS: f32 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AmbientFilter {
    LowPass { cutoff_hz: f32 },
    BandPass { center_hz: f32, q: f32 },
    /// Band-pass whose center drifts between `low_hz` and `high_hz` at `rate_hz`.
    Sweep {
        low_hz: f32,
        high_hz: f32,
        rate_hz: f32,
        q: f32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmbientProfile {
    pub kind: BackgroundMusicType,
    pub noise: NoiseColor,
    pub filter: AmbientFilter,
    /// Per-profile trim so every type sits at a similar loudness.
    pub trim: f32,
}

pub const PROFILES: &[AmbientProfile] = &[
    AmbientProfile {
        kind: BackgroundMusicType::WhiteNoise,
        noise: NoiseColor::White,
        filter: AmbientFilter::LowPass { cutoff_hz: 8_000.0 },
        trim: 0.5,
    },
    AmbientProfile {
        kind: BackgroundMusicType::Ocean,
        noise: NoiseColor::Brown,
        filter: AmbientFilter::Sweep {
            low_hz: 200.0,
            high_hz: 800.0,
            rate_hz: 0.08,
            q: 0.7,
        },
        trim: 1.6,
    },
    AmbientProfile {
        kind: BackgroundMusicType::Wind,
        noise: NoiseColor::Pink,
        filter: AmbientFilter::Sweep {
            low_hz: 300.0,
            high_hz: 1_200.0,
            rate_hz: 0.15,
            q: 1.0,
        },
        trim: 2.0,
    },
    AmbientProfile {
        kind: BackgroundMusicType::Rain,
        noise: NoiseColor::Pink,
        filter: AmbientFilter::BandPass {
            center_hz: 2_500.0,
            q: 0.5,
        },
        trim: 1.5,
    },
    AmbientProfile {
        kind: BackgroundMusicType::Fire,
        noise: NoiseColor::Brown,
        filter: AmbientFilter::LowPass { cutoff_hz: 600.0 },
        trim: 1.0,
    },
    AmbientProfile {
        kind: BackgroundMusicType::WindLight,
        noise: NoiseColor::Pink,
        filter: AmbientFilter::Sweep {
            low_hz: 400.0,
            high_hz: 900.0,
            rate_hz: 0.1,
            q: 1.5,
        },
        trim: 2.5,
    },
    AmbientProfile {
        kind: BackgroundMusicType::Sea,
        noise: NoiseColor::Brown,
        filter: AmbientFilter::LowPass { cutoff_hz: 400.0 },
        trim: 1.0,
    },
];

/// Profile for a synthesized type; `None` for `Custom`.
pub fn profile_for(kind: BackgroundMusicType) -> Option<&'static AmbientProfile> {
    PROFILES.iter().find(|p| p.kind == kind)
}

/// Profile used when a custom bed is requested without a source.
pub fn fallback_profile() -> &'static AmbientProfile {
    &PROFILES[6]
}

/// Linear output gain for a user volume in [0, 100].
pub fn ambient_gain(volume: u8, custom: bool) -> f32 {
    let headroom = if custom {
        CUSTOM_HEADROOM
    } else {
        SYNTH_HEADROOM
    };
    (volume.min(100) as f32 / 100.0) * headroom
}

/// A looping synthesized background bed.
#[derive(Debug, Clone)]
pub struct AmbientBed {
    profile: AmbientProfile,
    noise: NoiseSource,
    filter: Biquad,
    sample_rate: f32,
    lfo_phase: f32,
    target_gain: f32,
    gain: f32,
    smooth: f32,
    position: u64,
}

impl AmbientBed {
    pub fn new(profile: &AmbientProfile, volume: u8, sample_rate: u32, seed: u64) -> Self {
        let sr = sample_rate as f32;
        let filter = match profile.filter {
            AmbientFilter::LowPass { cutoff_hz } => Biquad::low_pass(sr, cutoff_hz, 0.707),
            AmbientFilter::BandPass { center_hz, q } => Biquad::band_pass(sr, center_hz, q),
            AmbientFilter::Sweep { low_hz, q, .. } => Biquad::band_pass(sr, low_hz, q),
        };
        let target = ambient_gain(volume, false);
        Self {
            profile: *profile,
            noise: NoiseSource::new(profile.noise, seed),
            filter,
            sample_rate: sr,
            lfo_phase: 0.0,
            target_gain: target,
            gain: target,
            smooth: 1.0 - (-1.0 / (GAIN_SMOOTH_MS * 0.001 * sr)).exp(),
            position: 0,
        }
    }

    pub fn profile(&self) -> &AmbientProfile {
        &self.profile
    }

    /// Change the level without restarting the bed. The gain glides to the new
    /// target so the change does not click.
    pub fn set_volume(&mut self, volume: u8) {
        self.target_gain = ambient_gain(volume, false);
    }

    pub fn target_gain(&self) -> f32 {
        self.target_gain
    }

    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        if let AmbientFilter::Sweep {
            low_hz,
            high_hz,
            rate_hz,
            q,
        } = self.profile.filter
        {
            if self.position % 64 == 0 {
                let lfo = 0.5 - 0.5 * (2.0 * PI * self.lfo_phase).cos();
                // geometric interpolation keeps the sweep even to the ear
                let center = low_hz * (high_hz / low_hz).powf(lfo);
                self.filter.tune(center, q);
            }
            self.lfo_phase = (self.lfo_phase + rate_hz / self.sample_rate).fract();
        }
        self.position = self.position.wrapping_add(1);
        self.gain += (self.target_gain - self.gain) * self.smooth;
        let shaped = self.filter.process(self.noise.next_sample());
        shaped * self.profile.trim * self.gain
    }

    pub fn mix_into(&mut self, out: &mut [f32]) {
        for slot in out.iter_mut() {
            *slot += self.next_sample();
        }
    }
}
