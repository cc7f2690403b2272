//! Audio engine - per-callback orchestration of the processing chain
//!
//! - AudioEngine: owned by the audio thread, runs gain → filter → reverb
//! - EngineController: owned by the control thread, writes parameters and
//!   sends commands
//! - Deferred deallocation for resources replaced on the audio thread

mod command;
mod controller;
mod engine;
pub mod gc;

pub use command::*;
pub use controller::*;
pub use engine::*;
