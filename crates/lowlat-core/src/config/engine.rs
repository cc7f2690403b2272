//! Engine configuration
//!
//! Sample rate, block size and queue capacities are fixed once the engine
//! is built. The remaining fields seed the initial control state; they can
//! be changed later through the `EngineController`.

use serde::{Deserialize, Serialize};

use crate::dsp::{BiquadCoefficients, FilterMode, OutputStage};
use crate::error::{EngineError, EngineResult};
use crate::params::{CUTOFF_RANGE, GAIN_RANGE, RESONANCE_RANGE, REVERB_MIX_RANGE};
use crate::types::{DEFAULT_BLOCK_SIZE, DEFAULT_SAMPLE_RATE, MAX_BLOCK_SIZE};

/// Default capacity of the control → audio command queue
pub const DEFAULT_COMMAND_QUEUE_CAPACITY: usize = 64;

/// Initial filter state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Lowpass or highpass response
    pub mode: FilterMode,
    /// Cutoff frequency in Hz
    pub cutoff: f32,
    /// Resonance (Q)
    pub resonance: f32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            mode: FilterMode::default(),
            cutoff: CUTOFF_RANGE.default,
            resonance: RESONANCE_RANGE.default,
        }
    }
}

/// Initial convolution reverb state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReverbConfig {
    /// Whether a loaded impulse response is applied
    pub enabled: bool,
    /// Dry/wet balance (1.0 = convolution output only)
    pub mix: f32,
}

impl Default for ReverbConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mix: REVERB_MIX_RANGE.default,
        }
    }
}

/// Configuration for an [`AudioEngine`](crate::engine::AudioEngine)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Samples per callback
    pub block_size: usize,
    /// Initial linear gain
    pub gain: f32,
    /// Initial filter settings
    pub filter: FilterConfig,
    /// Initial reverb settings
    pub reverb: ReverbConfig,
    /// Final waveshaping stage
    pub output_stage: OutputStage,
    /// Slots in the control → audio command queue
    pub command_queue_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            block_size: DEFAULT_BLOCK_SIZE,
            gain: GAIN_RANGE.default,
            filter: FilterConfig::default(),
            reverb: ReverbConfig::default(),
            output_stage: OutputStage::default(),
            command_queue_capacity: DEFAULT_COMMAND_QUEUE_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Create a config with the given sample rate and block size
    pub fn new(sample_rate: u32, block_size: usize) -> Self {
        Self {
            sample_rate,
            block_size,
            ..Default::default()
        }
    }

    /// Set the initial gain
    pub fn with_gain(mut self, gain: f32) -> Self {
        self.gain = gain;
        self
    }

    /// Set the initial filter
    pub fn with_filter(mut self, mode: FilterMode, cutoff: f32, resonance: f32) -> Self {
        self.filter = FilterConfig {
            mode,
            cutoff,
            resonance,
        };
        self
    }

    /// Set whether the reverb starts enabled
    pub fn with_reverb_enabled(mut self, enabled: bool) -> Self {
        self.reverb.enabled = enabled;
        self
    }

    /// Set the final waveshaping stage
    pub fn with_output_stage(mut self, stage: OutputStage) -> Self {
        self.output_stage = stage;
        self
    }

    /// Block duration in milliseconds (the audio thread's deadline)
    pub fn block_duration_ms(&self) -> f32 {
        (self.block_size as f32 / self.sample_rate as f32) * 1000.0
    }

    /// Check the config before anything touches the audio thread
    ///
    /// The sample rate must put the whole cutoff range below Nyquist, since
    /// the real-time path redesigns the filter without validating.
    pub fn validate(&self) -> EngineResult<()> {
        if self.block_size == 0 || self.block_size > MAX_BLOCK_SIZE {
            return Err(EngineError::InvalidBlockSize {
                size: self.block_size,
                max: MAX_BLOCK_SIZE,
            });
        }
        if (self.sample_rate as f32) <= 2.0 * CUTOFF_RANGE.max {
            return Err(EngineError::SampleRateTooLow(self.sample_rate));
        }
        if self.command_queue_capacity == 0 {
            return Err(EngineError::InvalidQueueCapacity);
        }
        BiquadCoefficients::try_design(
            self.filter.mode,
            self.sample_rate as f32,
            self.filter.cutoff,
            self.filter.resonance,
        )?;
        Ok(())
    }
}
