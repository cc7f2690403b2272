//! Control-thread handle to a running engine

use std::sync::Arc;

use basedrop::Owned;

use super::command::EngineCommand;
use super::gc::gc_handle;
use crate::dsp::{Convolver, FilterMode, OutputStage};
use crate::error::{EngineError, EngineResult};
use crate::params::EngineParams;
use crate::types::Sample;

/// Control side of an [`AudioEngine`](super::AudioEngine)
///
/// Parameter setters are a single atomic store and may be called at any
/// rate. Command methods enqueue onto the bounded command queue and fail
/// with [`EngineError::CommandQueueFull`] if the audio thread has fallen
/// behind; they never block.
pub struct EngineController {
    params: Arc<EngineParams>,
    commands: rtrb::Producer<EngineCommand>,
    sample_rate: u32,
    block_size: usize,
}

impl EngineController {
    pub(super) fn new(
        params: Arc<EngineParams>,
        commands: rtrb::Producer<EngineCommand>,
        sample_rate: u32,
        block_size: usize,
    ) -> Self {
        Self {
            params,
            commands,
            sample_rate,
            block_size,
        }
    }

    /// The shared parameter store
    pub fn params(&self) -> &Arc<EngineParams> {
        &self.params
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    // ─────────────────────────────────────────────────────────────
    // Continuous parameters
    // ─────────────────────────────────────────────────────────────

    /// Set linear gain (clamped to 0.0..=2.0)
    pub fn set_gain(&self, gain: f32) {
        self.params.gain.set(gain);
    }

    pub fn gain(&self) -> f32 {
        self.params.gain.get()
    }

    /// Set filter cutoff in Hz (clamped to 20..=20000)
    pub fn set_cutoff(&self, cutoff: f32) {
        self.params.cutoff.set(cutoff);
    }

    pub fn cutoff(&self) -> f32 {
        self.params.cutoff.get()
    }

    /// Set filter resonance (clamped to 0.1..=10)
    pub fn set_resonance(&self, q: f32) {
        self.params.resonance.set(q);
    }

    pub fn resonance(&self) -> f32 {
        self.params.resonance.get()
    }

    /// Set reverb dry/wet balance (clamped to 0.0..=1.0)
    pub fn set_reverb_mix(&self, mix: f32) {
        self.params.reverb_mix.set(mix);
    }

    pub fn reverb_mix(&self) -> f32 {
        self.params.reverb_mix.get()
    }

    // ─────────────────────────────────────────────────────────────
    // Commands
    // ─────────────────────────────────────────────────────────────

    fn send(&mut self, command: EngineCommand) -> EngineResult<()> {
        let name = command.name();
        // A rejected command is dropped here, on the control thread
        self.commands.push(command).map_err(|_| {
            log::warn!("Command queue full, dropping {}", name);
            EngineError::CommandQueueFull
        })
    }

    pub fn set_filter_mode(&mut self, mode: FilterMode) -> EngineResult<()> {
        self.send(EngineCommand::SetFilterMode(mode))
    }

    pub fn set_reverb_enabled(&mut self, enabled: bool) -> EngineResult<()> {
        self.send(EngineCommand::SetReverbEnabled(enabled))
    }

    pub fn set_output_stage(&mut self, stage: OutputStage) -> EngineResult<()> {
        self.send(EngineCommand::SetOutputStage(stage))
    }

    /// Clear filter history and the convolution tail
    pub fn reset(&mut self) -> EngineResult<()> {
        self.send(EngineCommand::ResetState)
    }

    /// Build a convolver for `impulse_response` and hand it to the audio thread
    ///
    /// Planning the transforms and computing the IR spectrum happens here, on
    /// the calling thread. The audio thread only swaps a pointer.
    pub fn load_impulse_response(&mut self, impulse_response: &[Sample]) -> EngineResult<()> {
        let convolver = Convolver::new(impulse_response, self.block_size)?;
        log::info!(
            "Loading impulse response: {} samples ({:.1}ms), fft_size={}",
            convolver.ir_length(),
            convolver.ir_length() as f32 * 1000.0 / self.sample_rate as f32,
            convolver.fft_size()
        );
        let convolver = Owned::new(&gc_handle()?, convolver);
        self.send(EngineCommand::LoadConvolver(convolver))
    }

    /// Remove the impulse response; the reverb stage becomes a pass-through
    pub fn clear_impulse_response(&mut self) -> EngineResult<()> {
        self.send(EngineCommand::ClearConvolver)
    }
}
