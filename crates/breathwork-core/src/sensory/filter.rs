//! Second-order IIR filter (RBJ cookbook), transposed direct form II.
//!
//! Coefficients can be retuned while running; the state is kept so sweeps stay
//! click-free.

use std::f32::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BiquadMode {
    LowPass,
    /// Constant 0 dB peak gain.
    BandPass,
}

#[derive(Debug, Clone)]
pub struct Biquad {
    mode: BiquadMode,
    sample_rate: f32,
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    z1: f32,
    z2: f32,
}

impl Biquad {
    pub fn low_pass(sample_rate: f32, cutoff_hz: f32, q: f32) -> Self {
        let mut f = Self::identity(BiquadMode::LowPass, sample_rate);
        f.tune(cutoff_hz, q);
        f
    }

    pub fn band_pass(sample_rate: f32, center_hz: f32, q: f32) -> Self {
        let mut f = Self::identity(BiquadMode::BandPass, sample_rate);
        f.tune(center_hz, q);
        f
    }

    fn identity(mode: BiquadMode, sample_rate: f32) -> Self {
        Self {
            mode,
            sample_rate,
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            z1: 0.0,
            z2: 0.0,
        }
    }

    pub fn mode(&self) -> BiquadMode {
        self.mode
    }

    /// Recompute coefficients for a new corner/center frequency.
    pub fn tune(&mut self, freq_hz: f32, q: f32) {
        let nyquist = self.sample_rate * 0.5;
        let f = freq_hz.clamp(10.0, nyquist * 0.95);
        let q = q.max(0.05);
        let w0 = 2.0 * PI * f / self.sample_rate;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * q);
        let a0 = 1.0 + alpha;

        let (b0, b1, b2) = match self.mode {
            BiquadMode::LowPass => {
                let b1 = 1.0 - cos_w0;
                (b1 * 0.5, b1, b1 * 0.5)
            }
            BiquadMode::BandPass => (alpha, 0.0, -alpha),
        };

        self.b0 = b0 / a0;
        self.b1 = b1 / a0;
        self.b2 = b2 / a0;
        self.a1 = -2.0 * cos_w0 / a0;
        self.a2 = (1.0 - alpha) / a0;
    }

    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let y = self.b0 * x + self.z1;
        self.z1 = self.b1 * x - self.a1 * y + self.z2;
        self.z2 = self.b2 * x - self.a2 * y;
        y
    }

    pub fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }
}
