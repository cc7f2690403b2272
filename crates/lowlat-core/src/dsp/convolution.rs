//! Convolution engine - overlap-add FFT convolution for impulse-response reverb
//!
//! Each call zero-pads one block of `B` samples to the transform size
//! `F = next_pow2(B + L - 1)`, multiplies its spectrum with the stored
//! impulse-response spectrum and transforms back. Because `F` covers the
//! whole linear convolution of the block, the circular product equals the
//! linear one. The first `B` samples plus the carried overlap are the output
//! block; the rest is carried to the next call.
//!
//! Latency is zero: output block n depends only on input blocks up to n.
//! All buffers (including FFT scratch) are sized at construction, so
//! [`Convolver::process`] never allocates.

use std::sync::Arc;

use realfft::num_complex::Complex;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};

use crate::error::{EngineError, EngineResult};
use crate::types::{Sample, MAX_BLOCK_SIZE};

/// Block-based frequency-domain convolver
pub struct Convolver {
    block_size: usize,
    ir_length: usize,
    fft_size: usize,
    forward: Arc<dyn RealToComplex<Sample>>,
    inverse: Arc<dyn ComplexToReal<Sample>>,
    /// Spectrum of the zero-padded impulse response, pre-scaled by 1/F
    ir_spectrum: Vec<Complex<Sample>>,
    /// Time-domain work buffer (F samples)
    time: Vec<Sample>,
    /// Spectrum work buffer (F/2 + 1 bins)
    spectrum: Vec<Complex<Sample>>,
    forward_scratch: Vec<Complex<Sample>>,
    inverse_scratch: Vec<Complex<Sample>>,
    /// Tail carried between calls (F - B samples)
    overlap: Vec<Sample>,
}

impl Convolver {
    /// Build a convolver for `impulse_response` and a fixed `block_size`
    ///
    /// Plans the transforms and computes the impulse-response spectrum.
    /// Allocates; call off the audio thread.
    pub fn new(impulse_response: &[Sample], block_size: usize) -> EngineResult<Self> {
        if impulse_response.is_empty() {
            return Err(EngineError::EmptyImpulseResponse);
        }
        if block_size == 0 || block_size > MAX_BLOCK_SIZE {
            return Err(EngineError::InvalidBlockSize {
                size: block_size,
                max: MAX_BLOCK_SIZE,
            });
        }

        let ir_length = impulse_response.len();
        // A one-point transform is degenerate; two points still hold B + L - 1 = 1
        let fft_size = (block_size + ir_length - 1).next_power_of_two().max(2);

        let mut planner = RealFftPlanner::<Sample>::new();
        let forward = planner.plan_fft_forward(fft_size);
        let inverse = planner.plan_fft_inverse(fft_size);

        let mut padded = forward.make_input_vec();
        padded[..ir_length].copy_from_slice(impulse_response);
        let mut ir_spectrum = forward.make_output_vec();
        let mut forward_scratch = forward.make_scratch_vec();
        let transformed = forward.process_with_scratch(&mut padded, &mut ir_spectrum, &mut forward_scratch);
        debug_assert!(transformed.is_ok(), "buffers come from the plan itself");

        // Fold the inverse transform's 1/F normalisation into the stored spectrum
        let norm = 1.0 / fft_size as Sample;
        for bin in ir_spectrum.iter_mut() {
            *bin *= norm;
        }

        log::debug!(
            "Convolver: ir_length={} block_size={} fft_size={}",
            ir_length,
            block_size,
            fft_size
        );

        Ok(Self {
            block_size,
            ir_length,
            fft_size,
            time: forward.make_input_vec(),
            spectrum: forward.make_output_vec(),
            inverse_scratch: inverse.make_scratch_vec(),
            forward_scratch,
            overlap: vec![0.0; fft_size - block_size],
            forward,
            inverse,
            ir_spectrum,
        })
    }

    /// Block size this convolver was built for
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Length of the impulse response in samples
    pub fn ir_length(&self) -> usize {
        self.ir_length
    }

    /// Transform size in samples
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Convolve one block
    ///
    /// `input` and `output` must both hold exactly `block_size` samples;
    /// otherwise `output` is silenced and the carried tail is left as is.
    /// Real-time safe: no allocation, no locking.
    pub fn process(&mut self, input: &[Sample], output: &mut [Sample]) {
        let block = self.block_size;
        if input.len() != block || output.len() != block {
            output.fill(0.0);
            return;
        }

        self.time[..block].copy_from_slice(&input[..block]);
        self.time[block..].fill(0.0);

        let forward = self
            .forward
            .process_with_scratch(&mut self.time, &mut self.spectrum, &mut self.forward_scratch);
        debug_assert!(forward.is_ok(), "forward transform buffers sized at construction");

        for (bin, ir) in self.spectrum.iter_mut().zip(&self.ir_spectrum) {
            *bin *= *ir;
        }
        // DC and Nyquist bins of a real signal are real
        if let Some(first) = self.spectrum.first_mut() {
            first.im = 0.0;
        }
        if let Some(last) = self.spectrum.last_mut() {
            last.im = 0.0;
        }

        let inverse = self
            .inverse
            .process_with_scratch(&mut self.spectrum, &mut self.time, &mut self.inverse_scratch);
        debug_assert!(inverse.is_ok(), "inverse transform buffers sized at construction");

        for (i, out) in output[..block].iter_mut().enumerate() {
            *out = self.time[i] + self.overlap.get(i).copied().unwrap_or(0.0);
        }

        // Shift the carried tail down by one block and add this block's tail.
        // Ascending order reads overlap[i + block] before it is overwritten.
        let overlap_len = self.overlap.len();
        for i in 0..overlap_len {
            let carried = if i + block < overlap_len {
                self.overlap[i + block]
            } else {
                0.0
            };
            self.overlap[i] = self.time[block + i] + carried;
        }
    }

    /// Clear the carried tail
    pub fn reset(&mut self) {
        self.overlap.fill(0.0);
    }
}
