//! Lowlat Core - Real-time audio chain for low-latency processing
//!
//! Moves one block per callback through gain, a biquad filter and an
//! optional convolution reverb. The audio thread never blocks, allocates
//! or takes a lock; control values cross threads through atomics and
//! discrete events through a lock-free command queue.

pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod params;
pub mod ring;
pub mod types;

pub use error::{EngineError, EngineResult};
pub use types::*;
