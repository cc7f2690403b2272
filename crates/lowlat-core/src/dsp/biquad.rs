//! Biquad filter - two-pole/two-zero IIR section
//!
//! Coefficients follow the standard resonant lowpass/highpass design. The
//! scalar path runs the Direct Form I recurrence one sample at a time. The
//! vectorized path computes four consecutive outputs at once from the
//! transposed (TDF-II) state, using a per-coefficient kernel built when the
//! filter is designed; both paths share the same DF-I history.
//!
//! Samples enter and leave as `f32`, but coefficients, history and kernel
//! are `f64`. Near the bottom of the cutoff range the poles sit within
//! 1e-4 of the unit circle, where single precision loses unity DC gain and
//! lets the two paths drift apart through the feedback.

use serde::{Deserialize, Serialize};
use wide::f64x4;

use crate::error::{EngineError, EngineResult};

/// Lane width of the vectorized block path
const LANES: usize = 4;

/// Response shape of the filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    #[default]
    Lowpass,
    Highpass,
}

/// Normalised biquad coefficients (a0 divided out)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoefficients {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadCoefficients {
    /// Pass-through filter (y = x)
    pub const IDENTITY: Self = Self {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    /// Shared design terms: (cos ω, a0, a1, a2)
    fn prototype(sample_rate: f32, cutoff: f32, q: f32) -> (f64, f64, f64, f64) {
        let omega = 2.0 * std::f64::consts::PI * cutoff as f64 / sample_rate as f64;
        let cos_omega = omega.cos();
        let alpha = omega.sin() / (2.0 * q as f64);
        let a0 = 1.0 + alpha;
        (cos_omega, a0, (-2.0 * cos_omega) / a0, (1.0 - alpha) / a0)
    }

    /// Resonant lowpass. Does not validate its inputs.
    pub fn lowpass(sample_rate: f32, cutoff: f32, q: f32) -> Self {
        let (cos_omega, a0, a1, a2) = Self::prototype(sample_rate, cutoff, q);
        let b0 = ((1.0 - cos_omega) / 2.0) / a0;
        Self {
            b0,
            b1: 2.0 * b0,
            b2: b0,
            a1,
            a2,
        }
    }

    /// Resonant highpass. Does not validate its inputs.
    pub fn highpass(sample_rate: f32, cutoff: f32, q: f32) -> Self {
        let (cos_omega, a0, a1, a2) = Self::prototype(sample_rate, cutoff, q);
        let b0 = ((1.0 + cos_omega) / 2.0) / a0;
        Self {
            b0,
            b1: -2.0 * b0,
            b2: b0,
            a1,
            a2,
        }
    }

    /// Design by mode without validation
    #[inline]
    pub fn design(mode: FilterMode, sample_rate: f32, cutoff: f32, q: f32) -> Self {
        match mode {
            FilterMode::Lowpass => Self::lowpass(sample_rate, cutoff, q),
            FilterMode::Highpass => Self::highpass(sample_rate, cutoff, q),
        }
    }

    /// Design by mode, rejecting inputs that give an unstable or undefined filter
    ///
    /// Requires finite inputs with `0 < cutoff < sample_rate / 2` and `q > 0`.
    /// For configuration checks off the audio thread.
    pub fn try_design(mode: FilterMode, sample_rate: f32, cutoff: f32, q: f32) -> EngineResult<Self> {
        let valid = sample_rate.is_finite()
            && cutoff.is_finite()
            && q.is_finite()
            && sample_rate > 0.0
            && cutoff > 0.0
            && cutoff < sample_rate / 2.0
            && q > 0.0;
        if !valid {
            return Err(EngineError::InvalidFilterParameters {
                sample_rate,
                cutoff,
                q,
            });
        }
        Ok(Self::design(mode, sample_rate, cutoff, q))
    }
}

impl Default for BiquadCoefficients {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Precomputed responses for one `LANES`-sample chunk
///
/// Output lane k of a chunk is
/// `Σ_j taps[j][k]·x[j] + state1[k]·s1 + state2[k]·s2`,
/// with `s1, s2` the TDF-II state entering the chunk.
#[derive(Debug, Clone, Copy)]
struct BlockKernel {
    /// Zero-state response to a unit sample at lane j
    taps: [f64x4; LANES],
    /// Zero-input response to s1 = 1
    state1: f64x4,
    /// Zero-input response to s2 = 1
    state2: f64x4,
}

impl BlockKernel {
    fn new(c: &BiquadCoefficients) -> Self {
        let respond = |x: [f64; LANES], mut s1: f64, mut s2: f64| -> [f64; LANES] {
            let mut y = [0.0; LANES];
            for k in 0..LANES {
                y[k] = c.b0 * x[k] + s1;
                s1 = c.b1 * x[k] - c.a1 * y[k] + s2;
                s2 = c.b2 * x[k] - c.a2 * y[k];
            }
            y
        };

        let taps = std::array::from_fn(|j| {
            let mut x = [0.0; LANES];
            x[j] = 1.0;
            f64x4::from(respond(x, 0.0, 0.0))
        });

        Self {
            taps,
            state1: f64x4::from(respond([0.0; LANES], 1.0, 0.0)),
            state2: f64x4::from(respond([0.0; LANES], 0.0, 1.0)),
        }
    }
}

/// A single biquad section with its own history
///
/// History (two inputs, two outputs) persists across calls and is only
/// touched by the processing methods and [`Biquad::reset`].
#[derive(Debug, Clone)]
pub struct Biquad {
    coeffs: BiquadCoefficients,
    kernel: BlockKernel,
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

impl Biquad {
    /// Create a pass-through filter with cleared history
    pub fn new() -> Self {
        Self::with_coefficients(BiquadCoefficients::IDENTITY)
    }

    /// Create a filter with the given coefficients and cleared history
    pub fn with_coefficients(coeffs: BiquadCoefficients) -> Self {
        Self {
            coeffs,
            kernel: BlockKernel::new(&coeffs),
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    /// Replace the coefficients, keeping history
    ///
    /// Allocation-free; safe to call on the audio thread.
    pub fn set_coefficients(&mut self, coeffs: BiquadCoefficients) {
        self.coeffs = coeffs;
        self.kernel = BlockKernel::new(&coeffs);
    }

    /// Current coefficients
    pub fn coefficients(&self) -> BiquadCoefficients {
        self.coeffs
    }

    /// Recompute as a resonant lowpass (inputs are not validated)
    pub fn design_lowpass(&mut self, sample_rate: f32, cutoff: f32, q: f32) {
        self.set_coefficients(BiquadCoefficients::lowpass(sample_rate, cutoff, q));
    }

    /// Recompute as a resonant highpass (inputs are not validated)
    pub fn design_highpass(&mut self, sample_rate: f32, cutoff: f32, q: f32) {
        self.set_coefficients(BiquadCoefficients::highpass(sample_rate, cutoff, q));
    }

    #[inline]
    fn step(&mut self, input: f64) -> f64 {
        let c = &self.coeffs;
        let output = c.b0 * input + c.b1 * self.x1 + c.b2 * self.x2 - c.a1 * self.y1 - c.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;

        output
    }

    /// Process one sample through the DF-I recurrence
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        self.step(input as f64) as f32
    }

    /// Process a buffer in place, one sample at a time in order
    pub fn process_block(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.process(*sample);
        }
    }

    /// Process a buffer in place, `LANES` samples per step
    ///
    /// Produces the same sequence as [`Biquad::process_block`] within float
    /// rounding and leaves the same history behind. The remainder that does
    /// not fill a whole chunk runs through the scalar recurrence.
    pub fn process_block_vectorized(&mut self, buffer: &mut [f32]) {
        let c = self.coeffs;
        let kernel = self.kernel;
        let mut chunks = buffer.chunks_exact_mut(LANES);

        for chunk in &mut chunks {
            let x: [f64; LANES] = std::array::from_fn(|k| chunk[k] as f64);

            // TDF-II state equivalent to the DF-I history
            let s1 = c.b1 * self.x1 + c.b2 * self.x2 - c.a1 * self.y1 - c.a2 * self.y2;
            let s2 = c.b2 * self.x1 - c.a2 * self.y1;

            let y = kernel.taps[0] * f64x4::splat(x[0])
                + kernel.taps[1] * f64x4::splat(x[1])
                + kernel.taps[2] * f64x4::splat(x[2])
                + kernel.taps[3] * f64x4::splat(x[3])
                + kernel.state1 * f64x4::splat(s1)
                + kernel.state2 * f64x4::splat(s2);
            let out = y.to_array();

            self.x2 = x[LANES - 2];
            self.x1 = x[LANES - 1];
            self.y2 = out[LANES - 2];
            self.y1 = out[LANES - 1];
            for (sample, &value) in chunk.iter_mut().zip(&out) {
                *sample = value as f32;
            }
        }

        for sample in chunks.into_remainder() {
            *sample = self.process(*sample);
        }
    }

    /// Clear history; coefficients are untouched
    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }
}

impl Default for Biquad {
    fn default() -> Self {
        Self::new()
    }
}
