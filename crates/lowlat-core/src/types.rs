//! Common types for Lowlat
//!
//! Sample type, engine-wide constants and the fixed-size audio block used
//! as working storage between processing stages.

use std::ops::{Deref, DerefMut};

/// Default sample rate (48kHz - standard professional audio rate)
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

/// Default block size per callback (~10.7ms at 48kHz)
pub const DEFAULT_BLOCK_SIZE: usize = 512;

/// Largest block size the engine accepts
/// Covers all common host configurations (64 .. 4096 frames)
pub const MAX_BLOCK_SIZE: usize = 8192;

/// Audio sample type (32-bit float for processing)
pub type Sample = f32;

/// A fixed-length run of samples
///
/// Length is chosen at construction and never changes, so a block can be
/// allocated before the audio thread starts and reused every callback.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBlock {
    samples: Box<[Sample]>,
}

impl AudioBlock {
    /// Create a block of the given length filled with silence
    pub fn silence(len: usize) -> Self {
        Self {
            samples: vec![0.0; len].into_boxed_slice(),
        }
    }

    /// Number of samples in the block
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if the block has zero length
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Fill the block with silence
    #[inline]
    pub fn clear(&mut self) {
        self.samples.fill(0.0);
    }

    /// Get the samples as a slice
    #[inline]
    pub fn as_slice(&self) -> &[Sample] {
        &self.samples
    }

    /// Get the samples as a mutable slice
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [Sample] {
        &mut self.samples
    }
}

impl Deref for AudioBlock {
    type Target = [Sample];

    #[inline]
    fn deref(&self) -> &[Sample] {
        &self.samples
    }
}

impl DerefMut for AudioBlock {
    #[inline]
    fn deref_mut(&mut self) -> &mut [Sample] {
        &mut self.samples
    }
}
