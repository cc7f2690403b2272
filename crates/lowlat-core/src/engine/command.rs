//! Lock-free command queue from the control thread to the audio thread
//!
//! Continuous values (gain, cutoff, resonance, mix) go through the atomic
//! parameter store. Discrete events go through this bounded `rtrb` queue and
//! are applied at the start of the next callback, before any sample is
//! processed, so a block never sees a state change half way through.

use basedrop::Owned;

use crate::dsp::{Convolver, FilterMode, OutputStage};

/// Commands sent from the control thread to the audio thread
pub enum EngineCommand {
    /// Switch the filter response; coefficients are redesigned next callback
    SetFilterMode(FilterMode),
    /// Enable or bypass the convolution stage
    SetReverbEnabled(bool),
    /// Replace the final waveshaping stage
    SetOutputStage(OutputStage),
    /// Install a convolver built off the audio thread
    ///
    /// The replaced convolver is dropped on the audio thread, which only
    /// enqueues it for the GC thread.
    LoadConvolver(Owned<Convolver>),
    /// Remove the convolver (reverb becomes a pass-through)
    ClearConvolver,
    /// Clear filter history and the convolution tail
    ResetState,
}

impl EngineCommand {
    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            EngineCommand::SetFilterMode(_) => "SetFilterMode",
            EngineCommand::SetReverbEnabled(_) => "SetReverbEnabled",
            EngineCommand::SetOutputStage(_) => "SetOutputStage",
            EngineCommand::LoadConvolver(_) => "LoadConvolver",
            EngineCommand::ClearConvolver => "ClearConvolver",
            EngineCommand::ResetState => "ResetState",
        }
    }
}

/// Create a command channel with room for `capacity` pending commands
///
/// Returns `(Producer, Consumer)`: the producer belongs to the control
/// thread, the consumer to the audio thread.
pub fn command_channel(
    capacity: usize,
) -> (rtrb::Producer<EngineCommand>, rtrb::Consumer<EngineCommand>) {
    rtrb::RingBuffer::new(capacity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_channel_roundtrip() {
        let (mut tx, mut rx) = command_channel(4);
        assert!(tx.push(EngineCommand::SetFilterMode(FilterMode::Highpass)).is_ok());

        let cmd = rx.pop().unwrap();
        assert!(matches!(cmd, EngineCommand::SetFilterMode(FilterMode::Highpass)));
        assert!(rx.pop().is_err());
    }

    #[test]
    fn test_command_channel_bounded() {
        let (mut tx, _rx) = command_channel(2);
        assert!(tx.push(EngineCommand::ResetState).is_ok());
        assert!(tx.push(EngineCommand::ClearConvolver).is_ok());
        assert!(tx.push(EngineCommand::ResetState).is_err());
    }

    #[test]
    fn test_command_size() {
        // Large payloads travel behind a pointer
        let size = std::mem::size_of::<EngineCommand>();
        assert!(size <= 16, "EngineCommand is {} bytes, expected <= 16", size);
    }

    #[test]
    fn test_command_names() {
        assert_eq!(EngineCommand::ResetState.name(), "ResetState");
        assert_eq!(EngineCommand::SetReverbEnabled(true).name(), "SetReverbEnabled");
    }
}
