//! Main audio engine - gain, biquad filter and convolution reverb

use std::sync::Arc;

use basedrop::Owned;

use super::command::{command_channel, EngineCommand};
use super::controller::EngineController;
use super::gc::gc_handle;
use crate::config::EngineConfig;
use crate::dsp::vector::{apply_gain, mix};
use crate::dsp::{Biquad, BiquadCoefficients, Convolver, FilterMode, OutputStage};
use crate::error::EngineResult;
use crate::params::{EngineParams, ParamSnapshot};
use crate::types::{AudioBlock, Sample};

/// The real-time processing chain
///
/// Owned by the audio thread. Each [`process`](Self::process) call drains
/// pending commands, reads one parameter snapshot and runs one block through
/// gain → filter → reverb → output stage. Every buffer is sized at
/// construction; nothing in the callback allocates, locks or logs.
pub struct AudioEngine {
    sample_rate: u32,
    block_size: usize,
    params: Arc<EngineParams>,
    commands: rtrb::Consumer<EngineCommand>,
    filter: Biquad,
    filter_mode: FilterMode,
    /// Cutoff the current coefficients were designed for
    last_cutoff: f32,
    /// Resonance the current coefficients were designed for
    last_resonance: f32,
    /// Set when the mode changes; cutoff/Q changes are caught by comparison
    filter_dirty: bool,
    convolver: Option<Owned<Convolver>>,
    reverb_enabled: bool,
    output_stage: OutputStage,
    /// Private copy of the input block
    working: AudioBlock,
    /// Convolution output
    wet: AudioBlock,
}

impl AudioEngine {
    /// Build an engine and its controller
    ///
    /// `config` fixes sample rate, block size and queue capacity for the
    /// engine's lifetime and seeds the initial control values. The optional
    /// impulse response is turned into the initial convolver. Allocates; call
    /// before the audio thread starts.
    pub fn new(
        config: &EngineConfig,
        impulse_response: Option<&[Sample]>,
    ) -> EngineResult<(AudioEngine, EngineController)> {
        config.validate()?;

        let params = Arc::new(EngineParams::new());
        params.gain.set(config.gain);
        params.cutoff.set(config.filter.cutoff);
        params.resonance.set(config.filter.resonance);
        params.reverb_mix.set(config.reverb.mix);

        let convolver = match impulse_response {
            Some(ir) => Some(Owned::new(&gc_handle()?, Convolver::new(ir, config.block_size)?)),
            None => None,
        };

        let (tx, rx) = command_channel(config.command_queue_capacity);

        let snapshot = params.snapshot();
        let filter = Biquad::with_coefficients(BiquadCoefficients::design(
            config.filter.mode,
            config.sample_rate as f32,
            snapshot.cutoff,
            snapshot.resonance,
        ));

        log::info!(
            "AudioEngine: {}Hz, block_size={} ({:.2}ms), filter={:?}, ir={}",
            config.sample_rate,
            config.block_size,
            config.block_duration_ms(),
            config.filter.mode,
            convolver
                .as_ref()
                .map(|c| format!("{} samples, fft_size={}", c.ir_length(), c.fft_size()))
                .unwrap_or_else(|| "none".to_string())
        );

        let engine = Self {
            sample_rate: config.sample_rate,
            block_size: config.block_size,
            params: Arc::clone(&params),
            commands: rx,
            filter,
            filter_mode: config.filter.mode,
            last_cutoff: snapshot.cutoff,
            last_resonance: snapshot.resonance,
            filter_dirty: false,
            convolver,
            reverb_enabled: config.reverb.enabled,
            output_stage: config.output_stage,
            working: AudioBlock::silence(config.block_size),
            wet: AudioBlock::silence(config.block_size),
        };
        let controller = EngineController::new(params, tx, config.sample_rate, config.block_size);

        Ok((engine, controller))
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn params(&self) -> &Arc<EngineParams> {
        &self.params
    }

    pub fn filter_mode(&self) -> FilterMode {
        self.filter_mode
    }

    /// Coefficients currently applied by the filter
    pub fn filter_coefficients(&self) -> BiquadCoefficients {
        self.filter.coefficients()
    }

    pub fn reverb_enabled(&self) -> bool {
        self.reverb_enabled
    }

    pub fn has_impulse_response(&self) -> bool {
        self.convolver.is_some()
    }

    pub fn output_stage(&self) -> OutputStage {
        self.output_stage
    }

    /// Process one block
    ///
    /// `input` and `output` must both hold exactly `block_size` samples. A
    /// block of any other length is not processed and `output` is silenced.
    pub fn process(&mut self, input: &[Sample], output: &mut [Sample]) {
        self.process_commands();

        let snapshot = self.params.snapshot();
        self.update_filter(&snapshot);

        if input.len() != self.block_size || output.len() != self.block_size {
            output.fill(0.0);
            return;
        }

        let working = self.working.as_mut_slice();
        working.copy_from_slice(input);
        apply_gain(working, snapshot.gain);
        self.filter.process_block_vectorized(working);

        match self.convolver.as_mut() {
            Some(convolver) if self.reverb_enabled => {
                let wet = self.wet.as_mut_slice();
                convolver.process(working, wet);

                if snapshot.reverb_mix >= 1.0 {
                    output.copy_from_slice(wet);
                } else {
                    apply_gain(wet, snapshot.reverb_mix);
                    apply_gain(working, 1.0 - snapshot.reverb_mix);
                    mix(output, working, wet);
                }
            }
            _ => output.copy_from_slice(working),
        }

        self.output_stage.process(output);
    }

    /// Clear filter history and the convolution tail
    pub fn reset(&mut self) {
        self.filter.reset();
        if let Some(convolver) = self.convolver.as_mut() {
            convolver.reset();
        }
    }

    /// Apply the commands queued before this callback started
    ///
    /// Pops at most the number of slots filled on entry, so a producer that
    /// keeps pushing cannot extend the callback.
    fn process_commands(&mut self) {
        let pending = self.commands.slots();
        for _ in 0..pending {
            match self.commands.pop() {
                Ok(command) => self.apply_command(command),
                Err(_) => break,
            }
        }
    }

    fn apply_command(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::SetFilterMode(mode) => {
                if mode != self.filter_mode {
                    self.filter_mode = mode;
                    self.filter_dirty = true;
                }
            }
            EngineCommand::SetReverbEnabled(enabled) => self.reverb_enabled = enabled,
            EngineCommand::SetOutputStage(stage) => self.output_stage = stage,
            EngineCommand::LoadConvolver(convolver) => {
                // A convolver for another block size is discarded; dropping
                // an Owned only enqueues it for the GC thread
                if convolver.block_size() == self.block_size {
                    self.convolver = Some(convolver);
                }
            }
            EngineCommand::ClearConvolver => self.convolver = None,
            EngineCommand::ResetState => self.reset(),
        }
    }

    /// Redesign the filter only when mode, cutoff or resonance changed
    fn update_filter(&mut self, snapshot: &ParamSnapshot) {
        if !self.filter_dirty
            && snapshot.cutoff == self.last_cutoff
            && snapshot.resonance == self.last_resonance
        {
            return;
        }

        self.filter.set_coefficients(BiquadCoefficients::design(
            self.filter_mode,
            self.sample_rate as f32,
            snapshot.cutoff,
            snapshot.resonance,
        ));
        self.last_cutoff = snapshot.cutoff;
        self.last_resonance = snapshot.resonance;
        self.filter_dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;

    const BLOCK: usize = 64;

    fn config() -> EngineConfig {
        EngineConfig::new(48000, BLOCK)
    }

    fn noise(len: usize, mut seed: u32) -> Vec<f32> {
        (0..len)
            .map(|_| {
                seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (seed >> 8) as f32 / (1u32 << 23) as f32 - 1.0
            })
            .collect()
    }

    fn decaying_ir(len: usize) -> Vec<f32> {
        noise(len, 99)
            .iter()
            .enumerate()
            .map(|(i, s)| s * (-(i as f32) / 40.0).exp())
            .collect()
    }

    fn run(engine: &mut AudioEngine, signal: &[f32]) -> Vec<f32> {
        let mut out = vec![0.0; signal.len()];
        for (input, output) in signal.chunks(BLOCK).zip(out.chunks_mut(BLOCK)) {
            engine.process(input, output);
        }
        out
    }

    #[test]
    fn test_engine_creation() {
        let (engine, controller) = AudioEngine::new(&config(), None).unwrap();
        assert_eq!(engine.sample_rate(), 48000);
        assert_eq!(engine.block_size(), BLOCK);
        assert_eq!(engine.filter_mode(), FilterMode::Lowpass);
        assert!(engine.reverb_enabled());
        assert!(!engine.has_impulse_response());
        assert_eq!(controller.gain(), 1.0);
        assert_eq!(controller.cutoff(), 1000.0);
        assert_eq!(
            engine.filter_coefficients(),
            BiquadCoefficients::lowpass(48000.0, 1000.0, 0.707)
        );
    }

    #[test]
    fn test_invalid_config_rejected() {
        let bad = EngineConfig::new(48000, 0);
        assert!(matches!(
            AudioEngine::new(&bad, None),
            Err(EngineError::InvalidBlockSize { size: 0, .. })
        ));

        let empty: &[f32] = &[];
        assert!(matches!(
            AudioEngine::new(&config(), Some(empty)),
            Err(EngineError::EmptyImpulseResponse)
        ));
    }

    #[test]
    fn test_coefficients_not_redesigned_when_unchanged() {
        let (mut engine, _controller) = AudioEngine::new(&config(), None).unwrap();

        // Overwrite the designed coefficients; a redesign would undo this
        engine.filter.set_coefficients(BiquadCoefficients::IDENTITY);
        let signal = noise(BLOCK * 3, 1);
        let out = run(&mut engine, &signal);

        assert_eq!(engine.filter_coefficients(), BiquadCoefficients::IDENTITY);
        assert_eq!(out, signal);
    }

    #[test]
    fn test_cutoff_change_triggers_redesign() {
        let (mut engine, controller) = AudioEngine::new(&config(), None).unwrap();
        engine.filter.set_coefficients(BiquadCoefficients::IDENTITY);

        controller.set_cutoff(2500.0);
        run(&mut engine, &vec![0.0; BLOCK]);

        assert_eq!(
            engine.filter_coefficients(),
            BiquadCoefficients::lowpass(48000.0, 2500.0, 0.707)
        );
    }

    #[test]
    fn test_resonance_and_mode_trigger_redesign() {
        let (mut engine, mut controller) = AudioEngine::new(&config(), None).unwrap();

        controller.set_resonance(2.0);
        run(&mut engine, &vec![0.0; BLOCK]);
        assert_eq!(
            engine.filter_coefficients(),
            BiquadCoefficients::lowpass(48000.0, 1000.0, 2.0)
        );

        controller.set_filter_mode(FilterMode::Highpass).unwrap();
        run(&mut engine, &vec![0.0; BLOCK]);
        assert_eq!(engine.filter_mode(), FilterMode::Highpass);
        assert_eq!(
            engine.filter_coefficients(),
            BiquadCoefficients::highpass(48000.0, 1000.0, 2.0)
        );
    }

    #[test]
    fn test_zero_gain_is_silence() {
        let ir = decaying_ir(200);
        let (mut engine, controller) = AudioEngine::new(&config(), Some(ir.as_slice())).unwrap();
        controller.set_gain(0.0);

        let out = run(&mut engine, &noise(BLOCK * 8, 3));
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_chain_matches_hand_composed_chain() {
        let ir = decaying_ir(150);
        let cfg = config().with_gain(0.8).with_filter(FilterMode::Lowpass, 3000.0, 1.2);
        let (mut engine, _controller) = AudioEngine::new(&cfg, Some(ir.as_slice())).unwrap();

        let mut filter = Biquad::with_coefficients(BiquadCoefficients::lowpass(48000.0, 3000.0, 1.2));
        let mut convolver = Convolver::new(&ir, BLOCK).unwrap();

        let signal = noise(BLOCK * 10, 7);
        let actual = run(&mut engine, &signal);

        for (n, (input, out)) in signal.chunks(BLOCK).zip(actual.chunks(BLOCK)).enumerate() {
            let mut working = input.to_vec();
            apply_gain(&mut working, 0.8);
            filter.process_block_vectorized(&mut working);
            let mut expected = vec![0.0; BLOCK];
            convolver.process(&working, &mut expected);

            for (i, (&a, &e)) in out.iter().zip(&expected).enumerate() {
                assert!((a - e).abs() < 1e-6, "block {} sample {}: {} vs {}", n, i, a, e);
            }
        }
    }

    #[test]
    fn test_reverb_bypass_and_mix() {
        let signal = noise(BLOCK, 11);
        let (mut reference, _) = AudioEngine::new(&config().with_reverb_enabled(false), None).unwrap();
        let dry = run(&mut reference, &signal);

        let (mut engine, mut controller) = AudioEngine::new(&config(), Some(&[0.5][..])).unwrap();
        let wet = run(&mut engine, &signal);
        for (&w, &d) in wet.iter().zip(&dry) {
            assert!((w - 0.5 * d).abs() < 1e-5, "{} vs {}", w, 0.5 * d);
        }

        controller.set_reverb_enabled(false).unwrap();
        engine.reset();
        let bypassed = run(&mut engine, &signal);
        assert_eq!(bypassed, dry);

        // 0.5 of the wet signal (0.5·x) plus 0.5 of the dry signal
        controller.set_reverb_enabled(true).unwrap();
        controller.set_reverb_mix(0.5);
        engine.reset();
        let mixed = run(&mut engine, &signal);
        for (&m, &d) in mixed.iter().zip(&dry) {
            assert!((m - 0.75 * d).abs() < 1e-5, "{} vs {}", m, 0.75 * d);
        }
    }

    #[test]
    fn test_load_and_clear_impulse_response() {
        let (mut engine, mut controller) = AudioEngine::new(&config(), None).unwrap();
        let signal = noise(BLOCK, 13);
        let dry = run(&mut engine, &signal);
        engine.reset();

        controller.load_impulse_response(&[0.0, -1.0]).unwrap();
        let shifted = run(&mut engine, &signal);
        assert!(engine.has_impulse_response());
        assert!(shifted[0].abs() < 1e-6);
        for i in 1..BLOCK {
            assert!((shifted[i] + dry[i - 1]).abs() < 1e-5, "sample {}", i);
        }

        controller.clear_impulse_response().unwrap();
        run(&mut engine, &vec![0.0; BLOCK]);
        assert!(!engine.has_impulse_response());
    }

    #[test]
    fn test_convolver_with_wrong_block_size_ignored() {
        let (mut engine, _controller) = AudioEngine::new(&config(), None).unwrap();
        let convolver = Owned::new(&gc_handle().unwrap(), Convolver::new(&[1.0], BLOCK * 2).unwrap());
        engine.apply_command(EngineCommand::LoadConvolver(convolver));
        assert!(!engine.has_impulse_response());
    }

    #[test]
    fn test_reset_command_clears_tail() {
        let mut ir = vec![0.0; BLOCK * 3];
        ir[BLOCK * 2] = 1.0;
        let (mut engine, mut controller) = AudioEngine::new(&config(), Some(ir.as_slice())).unwrap();

        run(&mut engine, &noise(BLOCK, 17));
        controller.reset().unwrap();
        let out = run(&mut engine, &vec![0.0; BLOCK * 4]);

        assert!(out.iter().all(|&s| s == 0.0), "tail survived reset");
    }

    #[test]
    fn test_output_stage_applied_last() {
        let cfg = config()
            .with_reverb_enabled(false)
            .with_output_stage(OutputStage::HardClip { threshold: 0.1 });
        let (mut engine, mut controller) = AudioEngine::new(&cfg, None).unwrap();
        controller.set_gain(2.0);

        let out = run(&mut engine, &noise(BLOCK * 4, 19));
        assert!(out.iter().all(|s| s.abs() <= 0.1));

        controller.set_output_stage(OutputStage::None).unwrap();
        let out = run(&mut engine, &noise(BLOCK * 4, 19));
        assert!(out.iter().any(|s| s.abs() > 0.1));
    }

    #[test]
    fn test_wrong_length_outputs_silence() {
        let (mut engine, _controller) = AudioEngine::new(&config(), None).unwrap();
        let mut output = vec![1.0; BLOCK - 1];
        engine.process(&vec![0.5; BLOCK], &mut output);
        assert!(output.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_full_queue_reports_error() {
        let mut cfg = config();
        cfg.command_queue_capacity = 2;
        let (mut engine, mut controller) = AudioEngine::new(&cfg, None).unwrap();

        controller.set_reverb_enabled(false).unwrap();
        controller.set_reverb_enabled(true).unwrap();
        assert_eq!(controller.reset(), Err(EngineError::CommandQueueFull));

        run(&mut engine, &vec![0.0; BLOCK]);
        assert!(controller.reset().is_ok());
    }
}
