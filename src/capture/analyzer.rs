//! Frequency-domain volume monitoring.
//!
//! The recorder does not care about speech content, only whether anything in
//! the voice band is audible. Each capture frame is reduced to one normalized
//! loudness figure by averaging spectral magnitude over a bank of voice-band
//! bins, evaluated with the Goertzel recurrence (a full FFT would compute
//! thousands of bins we would immediately throw away).

use std::f32::consts::PI;

/// Lower edge of the analyzed voice band (Hz).
pub const VOICE_BAND_LOW_HZ: f32 = 300.0;

/// Upper edge of the analyzed voice band (Hz).
pub const VOICE_BAND_HIGH_HZ: f32 = 3_400.0;

const ANALYZER_BINS: usize = 16;

/// Turns one capture frame into a normalized loudness figure in 0..1.
pub trait LevelMeter: Send {
    fn level(&mut self, samples: &[f32]) -> f32;

    fn name(&self) -> &'static str {
        "unknown_meter"
    }
}

/// Averages spectral magnitude over evenly spaced voice-band bins, normalized
/// so a full-scale sine at a bin frequency reads 1.0 on that bin.
pub struct SpectralLevelMeter {
    sample_rate: u32,
    bin_hz: Vec<f32>,
}

impl SpectralLevelMeter {
    pub fn new(sample_rate: u32) -> Self {
        let nyquist = sample_rate as f32 / 2.0;
        let high = VOICE_BAND_HIGH_HZ.min(nyquist * 0.9);
        let low = VOICE_BAND_LOW_HZ.min(high / 2.0);
        let step = (high - low) / (ANALYZER_BINS - 1) as f32;
        let bin_hz = (0..ANALYZER_BINS)
            .map(|i| low + step * i as f32)
            .collect();
        Self {
            sample_rate,
            bin_hz,
        }
    }
}

impl LevelMeter for SpectralLevelMeter {
    fn level(&mut self, samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        let sum: f32 = self
            .bin_hz
            .iter()
            .map(|&hz| goertzel_magnitude(samples, self.sample_rate, hz))
            .sum();
        (sum / self.bin_hz.len() as f32).clamp(0.0, 1.0)
    }

    fn name(&self) -> &'static str {
        "spectral_level_meter"
    }
}

/// Amplitude of the `target_hz` component of `samples`, so a unit sine at the
/// target frequency yields roughly 1.0.
fn goertzel_magnitude(samples: &[f32], sample_rate: u32, target_hz: f32) -> f32 {
    let omega = 2.0 * PI * target_hz / sample_rate as f32;
    let coeff = 2.0 * omega.cos();
    let mut q1 = 0.0f32;
    let mut q2 = 0.0f32;
    for &sample in samples {
        let q0 = coeff * q1 - q2 + sample;
        q2 = q1;
        q1 = q0;
    }
    let power = (q1 * q1 + q2 * q2 - coeff * q1 * q2).max(0.0);
    2.0 * power.sqrt() / samples.len() as f32
}
