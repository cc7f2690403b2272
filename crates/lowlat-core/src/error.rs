//! Engine error types
//!
//! Only configuration and control-side operations can fail. Nothing on the
//! audio thread returns an error: capacity limits are reported through
//! short counts and numerical misuse is a caller contract violation.

use thiserror::Error;

/// Errors that can occur while building or controlling the engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Ring channel capacity is not a power of two (or is below 2)
    #[error("Ring capacity must be a power of two >= 2, got {0}")]
    InvalidRingCapacity(usize),

    /// Impulse response has no samples
    #[error("Impulse response is empty")]
    EmptyImpulseResponse,

    /// Block size outside the supported range
    #[error("Block size must be between 1 and {max}, got {size}")]
    InvalidBlockSize { size: usize, max: usize },

    /// Sample rate leaves part of the cutoff range at or above Nyquist
    #[error("Sample rate {0}Hz is too low: maximum cutoff must stay below Nyquist")]
    SampleRateTooLow(u32),

    /// Filter design inputs that produce an unstable or undefined filter
    #[error("Degenerate filter parameters: cutoff={cutoff}Hz, q={q} at {sample_rate}Hz")]
    InvalidFilterParameters { sample_rate: f32, cutoff: f32, q: f32 },

    /// Command queue capacity of zero
    #[error("Command queue capacity must be non-zero")]
    InvalidQueueCapacity,

    /// The deferred-deallocation thread could not be started
    #[error("Audio GC thread is unavailable")]
    CollectorUnavailable,

    /// The audio thread has not drained earlier commands yet
    #[error("Engine command queue is full")]
    CommandQueueFull,
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
