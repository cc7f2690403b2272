//! DSP building blocks used by the engine
//!
//! - `biquad`: two-pole/two-zero IIR filter with scalar and vectorized paths
//! - `vector`: stateless block transforms (gain, clipping, mixing)
//! - `convolution`: overlap-add FFT convolver for impulse-response reverb

pub mod biquad;
pub mod convolution;
pub mod vector;

pub use biquad::{Biquad, BiquadCoefficients, FilterMode};
pub use convolution::Convolver;
pub use vector::OutputStage;
