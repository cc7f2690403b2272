//! Lock-free parameter store shared by the control and audio threads
//!
//! Each control value is an independent `AtomicU32` holding the bits of an
//! `f32`. Writes clamp to the control's range and then store with
//! `Ordering::Relaxed`; reads are a single relaxed load. There is no
//! ordering between different controls: the audio thread may observe a new
//! gain and an old cutoff in the same callback, and sees any update at most
//! one callback late.

use std::sync::atomic::{AtomicU32, Ordering};

/// Valid range and default of a control value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamRange {
    pub min: f32,
    pub max: f32,
    pub default: f32,
}

impl ParamRange {
    pub const fn new(min: f32, max: f32, default: f32) -> Self {
        Self { min, max, default }
    }

    /// Clamp a value into the range
    #[inline]
    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }
}

/// Linear gain (0.0 = silence, 1.0 = unity, 2.0 = +6dB)
pub const GAIN_RANGE: ParamRange = ParamRange::new(0.0, 2.0, 1.0);

/// Filter cutoff in Hz
pub const CUTOFF_RANGE: ParamRange = ParamRange::new(20.0, 20000.0, 1000.0);

/// Filter resonance (Q)
pub const RESONANCE_RANGE: ParamRange = ParamRange::new(0.1, 10.0, 0.707);

/// Convolution dry/wet balance (0.0 = dry, 1.0 = fully wet)
pub const REVERB_MIX_RANGE: ParamRange = ParamRange::new(0.0, 1.0, 1.0);

/// A single clamped, atomically published `f32` control
#[derive(Debug)]
pub struct AtomicParam {
    bits: AtomicU32,
    range: ParamRange,
}

impl AtomicParam {
    /// Create a control holding the range's default
    pub fn new(range: ParamRange) -> Self {
        Self::with_value(range, range.default)
    }

    /// Create a control with an initial value (clamped)
    pub fn with_value(range: ParamRange, value: f32) -> Self {
        let initial = if value.is_nan() { range.default } else { range.clamp(value) };
        Self {
            bits: AtomicU32::new(initial.to_bits()),
            range,
        }
    }

    /// Clamp and publish a new value
    ///
    /// NaN is ignored so the stored value always stays inside the range.
    #[inline]
    pub fn set(&self, value: f32) {
        if value.is_nan() {
            return;
        }
        self.bits
            .store(self.range.clamp(value).to_bits(), Ordering::Relaxed);
    }

    /// Most recently published value
    #[inline]
    pub fn get(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }

    /// The control's valid range
    pub fn range(&self) -> ParamRange {
        self.range
    }
}

/// Values read by the audio thread once per callback
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSnapshot {
    pub gain: f32,
    pub cutoff: f32,
    pub resonance: f32,
    pub reverb_mix: f32,
}

/// Every continuous control of the engine
///
/// Shared as `Arc<EngineParams>` between the engine and its controller.
/// Owned per engine; there is no process-wide instance.
#[derive(Debug)]
pub struct EngineParams {
    pub gain: AtomicParam,
    pub cutoff: AtomicParam,
    pub resonance: AtomicParam,
    pub reverb_mix: AtomicParam,
}

impl EngineParams {
    /// Create a store with every control at its default
    pub fn new() -> Self {
        Self {
            gain: AtomicParam::new(GAIN_RANGE),
            cutoff: AtomicParam::new(CUTOFF_RANGE),
            resonance: AtomicParam::new(RESONANCE_RANGE),
            reverb_mix: AtomicParam::new(REVERB_MIX_RANGE),
        }
    }

    /// Read all controls (four relaxed loads, no retry)
    #[inline]
    pub fn snapshot(&self) -> ParamSnapshot {
        ParamSnapshot {
            gain: self.gain.get(),
            cutoff: self.cutoff.get(),
            resonance: self.resonance.get(),
            reverb_mix: self.reverb_mix.get(),
        }
    }
}

impl Default for EngineParams {
    fn default() -> Self {
        Self::new()
    }
}
