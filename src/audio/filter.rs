//! The one multimode filter every routed voice goes through.
//!
//! A single biquad (RBJ cookbook coefficients). Changes are applied to the
//! coefficients immediately; the delay line is kept, so there is no crossfade.

use std::f32::consts::TAU;

use crate::pipeline::project::{FilterParams, FilterType};

#[derive(Clone, Copy, Debug, Default)]
struct Coeffs {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

#[derive(Clone, Debug)]
pub struct SharedFilter {
    params: FilterParams,
    sample_rate: f32,
    coeffs: Coeffs,
    z1: f32,
    z2: f32,
}

impl SharedFilter {
    pub fn new(params: FilterParams, sample_rate: f32) -> Self {
        let mut filter = Self {
            params,
            sample_rate,
            coeffs: Coeffs::default(),
            z1: 0.0,
            z2: 0.0,
        };
        filter.recompute();
        filter
    }

    pub fn params(&self) -> FilterParams {
        self.params
    }

    pub fn set_type(&mut self, kind: FilterType) {
        self.params.kind = kind;
        self.recompute();
    }

    pub fn set_cutoff(&mut self, cutoff: f32) {
        self.params.set_cutoff(cutoff);
        self.recompute();
    }

    pub fn set_resonance(&mut self, resonance: f32) {
        self.params.set_resonance(resonance);
        self.recompute();
    }

    pub fn apply(&mut self, params: FilterParams) {
        self.params.kind = params.kind;
        self.params.set_cutoff(params.cutoff);
        self.params.set_resonance(params.resonance);
        self.recompute();
    }

    fn recompute(&mut self) {
        let freq = self.params.cutoff_hz().min(self.sample_rate * 0.45);
        let q = self.params.q();
        let w0 = TAU * freq / self.sample_rate;
        let (sin, cos) = w0.sin_cos();
        let alpha = sin / (2.0 * q);

        let (b0, b1, b2) = match self.params.kind {
            FilterType::Lowpass => ((1.0 - cos) / 2.0, 1.0 - cos, (1.0 - cos) / 2.0),
            FilterType::Bandpass => (alpha, 0.0, -alpha),
            FilterType::Highpass => ((1.0 + cos) / 2.0, -(1.0 + cos), (1.0 + cos) / 2.0),
        };
        let a0 = 1.0 + alpha;
        self.coeffs = Coeffs {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: -2.0 * cos / a0,
            a2: (1.0 - alpha) / a0,
        };
    }

    // transposed direct form II
    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let c = self.coeffs;
        let y = c.b0 * x + self.z1;
        self.z1 = c.b1 * x - c.a1 * y + self.z2;
        self.z2 = c.b2 * x - c.a2 * y;
        y
    }
}
