use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::pipeline::project::Waveform;

pub const NOISE_LEN: usize = 4096;
const NOISE_SEED: u64 = 0x51D_6A1D;
const NOISE_CLOCK_MULT: f32 = 16.0; // noise steps per oscillator period

// Fixed table of uniform noise, shared by every voice. Built once off the
// audio thread; the same seed means offline renders are reproducible.
#[derive(Clone, Debug)]
pub struct NoiseTable {
    samples: Vec<f32>,
}

impl NoiseTable {
    pub fn new() -> Self {
        let mut rng = StdRng::seed_from_u64(NOISE_SEED);
        Self {
            samples: (0..NOISE_LEN).map(|_| rng.random_range(-1.0f32..=1.0)).collect(),
        }
    }

    #[inline]
    pub fn get(&self, idx: usize) -> f32 {
        self.samples[idx % self.samples.len()]
    }
}

impl Default for NoiseTable {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Oscillator {
    waveform: Waveform,
    pulse_width: f32,
    phase: f32, // 0..1
    phase_inc: f32,
    noise_pos: f32, // position in the noise table, advances NOISE_CLOCK_MULT per period
}

impl Oscillator {
    pub fn new(waveform: Waveform, frequency: f32, pulse_width: f32, sample_rate: f32) -> Self {
        Self {
            waveform,
            pulse_width: pulse_width.clamp(0.02, 0.98),
            phase: 0.0,
            phase_inc: (frequency / sample_rate).clamp(0.0, 0.5),
            noise_pos: 0.0,
        }
    }

    /// Move one sample forward. Returns true when the phase wrapped.
    #[inline]
    pub fn advance(&mut self) -> bool {
        self.phase += self.phase_inc;
        if self.waveform == Waveform::Noise {
            self.noise_pos += self.phase_inc * NOISE_CLOCK_MULT;
            if self.noise_pos >= NOISE_LEN as f32 {
                self.noise_pos -= NOISE_LEN as f32;
            }
        }
        if self.phase >= 1.0 {
            self.phase -= 1.0;
            true
        } else {
            false
        }
    }

    // hard sync from the modulating voice
    #[inline]
    pub fn reset_phase(&mut self) {
        self.phase = 0.0;
    }

    #[cfg(test)]
    pub(crate) fn phase(&self) -> f32 {
        self.phase
    }

    // upper half of the cycle, what ring mod keys off
    #[inline]
    pub fn msb(&self) -> bool {
        self.phase >= 0.5
    }

    #[inline]
    pub fn sample(&self, noise: &NoiseTable) -> f32 {
        let p = self.phase;
        match self.waveform {
            Waveform::Pulse => {
                if p < self.pulse_width { 1.0 } else { -1.0 }
            }
            Waveform::Sawtooth => 2.0 * p - 1.0,
            Waveform::Triangle => 1.0 - 4.0 * (p - 0.5).abs(),
            Waveform::Noise => noise.get(self.noise_pos as usize),
        }
    }
}
