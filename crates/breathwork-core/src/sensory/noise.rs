//! Broadband noise sources.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoiseColor {
    White,
    /// -3 dB/octave.
    Pink,
    /// Leaky-integrated white noise, roughly -6 dB/octave.
    Brown,
}

/// Streaming noise generator, one sample at a time.
#[derive(Debug, Clone)]
pub struct NoiseSource {
    color: NoiseColor,
    rng: SmallRng,
    pink: [f32; 7],
    brown_last: f32,
}

impl NoiseSource {
    pub fn new(color: NoiseColor, seed: u64) -> Self {
        Self {
            color,
            rng: SmallRng::seed_from_u64(seed),
            pink: [0.0; 7],
            brown_last: 0.0,
        }
    }

    pub fn color(&self) -> NoiseColor {
        self.color
    }

    #[inline]
    fn white(&mut self) -> f32 {
        self.rng.gen_range(-1.0f32..1.0)
    }

    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        let white = self.white();
        match self.color {
            NoiseColor::White => white,
            NoiseColor::Pink => {
                // Paul Kellet's refined pink filter.
                let b = &mut self.pink;
                b[0] = 0.99886 * b[0] + white * 0.0555179;
                b[1] = 0.99332 * b[1] + white * 0.0750759;
                b[2] = 0.96900 * b[2] + white * 0.1538520;
                b[3] = 0.86650 * b[3] + white * 0.3104856;
                b[4] = 0.55000 * b[4] + white * 0.5329522;
                b[5] = -0.7616 * b[5] - white * 0.0168980;
                let out = b[0] + b[1] + b[2] + b[3] + b[4] + b[5] + b[6] + white * 0.5362;
                b[6] = white * 0.115926;
                out * 0.11
            }
            NoiseColor::Brown => {
                self.brown_last = (self.brown_last + 0.02 * white) / 1.02;
                self.brown_last * 3.5
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rms(source: &mut NoiseSource, n: usize) -> f32 {
        let sum: f32 = (0..n).map(|_| source.next_sample().powi(2)).sum();
        (sum / n as f32).sqrt()
    }

    #[test]
    fn same_seed_same_stream() {
        let mut a = NoiseSource::new(NoiseColor::Pink, 7);
        let mut b = NoiseSource::new(NoiseColor::Pink, 7);
        for _ in 0..256 {
            assert_eq!(a.next_sample(), b.next_sample());
        }
    }

    #[test]
    fn colors_stay_bounded() {
        for color in [NoiseColor::White, NoiseColor::Pink, NoiseColor::Brown] {
            let mut src = NoiseSource::new(color, 42);
            for _ in 0..48_000 {
                let s = src.next_sample();
                assert!(s.is_finite() && s.abs() < 2.0, "{:?} produced {}", color, s);
            }
        }
    }

    #[test]
    fn brown_is_smoother_than_white() {
        // Mean absolute first difference is far lower for integrated noise.
        let diff = |color| {
            let mut src = NoiseSource::new(color, 3);
            let mut prev = src.next_sample();
            let mut acc = 0.0f32;
            for _ in 0..10_000 {
                let s = src.next_sample();
                acc += (s - prev).abs();
                prev = s;
            }
            acc / 10_000.0
        };
        assert!(diff(NoiseColor::Brown) < diff(NoiseColor::White) * 0.5);
    }

    #[test]
    fn white_noise_has_energy() {
        let mut src = NoiseSource::new(NoiseColor::White, 11);
        let level = rms(&mut src, 10_000);
        assert!(level > 0.4 && level < 0.7, "rms {}", level);
    }
}
