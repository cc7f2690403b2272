//! Lowlat Bench - headless host for the lowlat engine
//!
//! Simulates a sound-card host with three threads:
//! 1. An I/O thread that keeps the input ring full and drains the output ring
//! 2. An audio thread that processes one block per period and times it
//!    against the block deadline
//! 3. The main (control) thread, which sweeps the filter and swaps the
//!    impulse response while audio runs
//!
//! ## Command line flags
//!
//! - `--config <path>`: engine config (defaults to `<config dir>/lowlat/engine.yaml`)
//! - `--seconds <n>`: run length (default 5)
//! - `--ir-ms <ms>`: synthetic impulse response length (default 1500)

mod signal;
mod stats;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context};

use lowlat_core::config::{default_config_path, load_config, EngineConfig};
use lowlat_core::dsp::FilterMode;
use lowlat_core::engine::{AudioEngine, EngineController};
use lowlat_core::ring::{ring_channel, RingConsumer, RingProducer};
use lowlat_core::AudioBlock;

use signal::{synthetic_ir, IrShape, TestSignal};
use stats::BlockStats;

/// Reverb time of the synthetic impulse response in seconds
const IR_RT60: f32 = 1.2;

/// Discrete reflections ahead of the diffuse tail
const IR_REFLECTIONS: usize = 8;

/// Interval between control updates
const CONTROL_INTERVAL: Duration = Duration::from_millis(20);

/// Period of one cutoff sweep
const SWEEP_PERIOD_SECS: f32 = 4.0;

struct Args {
    config_path: PathBuf,
    seconds: f32,
    ir_ms: f32,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = Args {
        config_path: default_config_path(),
        seconds: 5.0,
        ir_ms: 1500.0,
    };

    let mut iter = std::env::args().skip(1);
    while let Some(flag) = iter.next() {
        let mut value = || iter.next().ok_or_else(|| anyhow!("{} requires a value", flag));
        match flag.as_str() {
            "--config" => args.config_path = PathBuf::from(value()?),
            "--seconds" => args.seconds = value()?.parse().context("Invalid --seconds")?,
            "--ir-ms" => args.ir_ms = value()?.parse().context("Invalid --ir-ms")?,
            other => return Err(anyhow!("Unknown argument: {}", other)),
        }
    }
    Ok(args)
}

/// Samples seen on the output side
#[derive(Debug, Default)]
struct OutputStats {
    samples: u64,
    peak: f32,
    sum_squares: f64,
}

impl OutputStats {
    fn rms(&self) -> f64 {
        if self.samples == 0 {
            0.0
        } else {
            (self.sum_squares / self.samples as f64).sqrt()
        }
    }
}

/// Keep the input ring topped up and drain the output ring until stopped
fn run_io(
    running: Arc<AtomicBool>,
    mut input_tx: RingProducer<f32>,
    mut output_rx: RingConsumer<f32>,
    sample_rate: u32,
    block_size: usize,
) -> OutputStats {
    let mut signal = TestSignal::new(sample_rate);
    let mut chunk = vec![0.0f32; block_size];
    let mut stats = OutputStats::default();

    while running.load(Ordering::Acquire) {
        while input_tx.free_space() >= block_size {
            signal.fill(&mut chunk);
            input_tx.write(&chunk);
        }

        loop {
            let read = output_rx.read(&mut chunk);
            if read == 0 {
                break;
            }
            for &s in &chunk[..read] {
                stats.peak = stats.peak.max(s.abs());
                stats.sum_squares += (s as f64) * (s as f64);
            }
            stats.samples += read as u64;
        }

        thread::sleep(Duration::from_millis(1));
    }
    stats
}

/// Process one block per period until stopped
fn run_audio(
    running: Arc<AtomicBool>,
    mut engine: AudioEngine,
    mut input_rx: RingConsumer<f32>,
    mut output_tx: RingProducer<f32>,
) -> BlockStats {
    let block_size = engine.block_size();
    let deadline = Duration::from_secs_f64(block_size as f64 / engine.sample_rate() as f64);
    let mut input = AudioBlock::silence(block_size);
    let mut output = AudioBlock::silence(block_size);
    let mut stats = BlockStats::default();
    let mut next_tick = Instant::now();

    while running.load(Ordering::Acquire) {
        if input_rx.available() >= block_size {
            input_rx.read(input.as_mut_slice());
        } else {
            input.clear();
            stats.underruns += 1;
        }

        let start = Instant::now();
        engine.process(input.as_slice(), output.as_mut_slice());
        stats.record(start.elapsed(), deadline);

        let written = output_tx.write(output.as_slice());
        stats.dropped_samples += (block_size - written) as u64;

        next_tick += deadline;
        let now = Instant::now();
        if next_tick > now {
            thread::sleep(next_tick - now);
        } else {
            // Behind schedule: start the next period immediately
            next_tick = now;
        }
    }
    stats
}

/// Sweep the cutoff, flip the filter mode and swap the impulse response
fn run_control(controller: &mut EngineController, seconds: f32, ir_ms: f32) {
    let sample_rate = controller.sample_rate();
    let start = Instant::now();
    let mut swapped = false;
    let mut mode = FilterMode::Lowpass;

    while start.elapsed().as_secs_f32() < seconds {
        let t = start.elapsed().as_secs_f32();
        let phase = (t / SWEEP_PERIOD_SECS * std::f32::consts::TAU).cos();
        // Logarithmic sweep between 200Hz and 8kHz
        let cutoff = 200.0 * 40.0f32.powf(0.5 - 0.5 * phase);
        controller.set_cutoff(cutoff);
        controller.set_reverb_mix(0.6 + 0.4 * phase);

        let wanted = if t < seconds * 0.75 { FilterMode::Lowpass } else { FilterMode::Highpass };
        if wanted != mode {
            match controller.set_filter_mode(wanted) {
                Ok(()) => {
                    log::info!("Filter mode -> {:?}", wanted);
                    mode = wanted;
                }
                Err(e) => log::warn!("Could not switch filter mode: {}", e),
            }
        }

        if !swapped && t >= seconds * 0.5 {
            swapped = true;
            let shape = IrShape {
                length_ms: ir_ms * 0.5,
                rt60: IR_RT60 * 0.5,
                reflections: IR_REFLECTIONS / 2,
            };
            let ir = synthetic_ir(sample_rate, controller.block_size(), shape);
            if let Err(e) = controller.load_impulse_response(&ir) {
                log::warn!("Impulse response swap failed: {}", e);
            }
        }

        thread::sleep(CONTROL_INTERVAL);
    }
}

fn report(config: &EngineConfig, blocks: &BlockStats, output: &OutputStats) {
    let deadline = Duration::from_secs_f64(config.block_size as f64 / config.sample_rate as f64);
    log::info!(
        "Processed {} blocks of {} samples ({:.2}ms deadline)",
        blocks.blocks,
        config.block_size,
        deadline.as_secs_f64() * 1000.0
    );
    log::info!(
        "Block time: avg {:.1}us, max {:.1}us, peak load {:.1}%",
        blocks.average().as_secs_f64() * 1e6,
        blocks.max.as_secs_f64() * 1e6,
        blocks.peak_load(deadline) * 100.0
    );
    log::info!(
        "Output: {} samples, peak {:.3}, rms {:.3}",
        output.samples,
        output.peak,
        output.rms()
    );

    if blocks.overruns > 0 || blocks.underruns > 0 || blocks.dropped_samples > 0 {
        log::warn!(
            "Deadline overruns: {}, input underruns: {}, dropped output samples: {}",
            blocks.overruns,
            blocks.underruns,
            blocks.dropped_samples
        );
    }
}

fn main() -> anyhow::Result<()> {
    // Initialize logger - set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = parse_args()?;
    log::info!("lowlat-bench starting up");

    let config: EngineConfig = load_config(&args.config_path);
    config.validate().context("Invalid engine configuration")?;

    let shape = IrShape {
        length_ms: args.ir_ms,
        rt60: IR_RT60,
        reflections: IR_REFLECTIONS,
    };
    let ir = synthetic_ir(config.sample_rate, config.block_size, shape);
    let (engine, mut controller) =
        AudioEngine::new(&config, Some(ir.as_slice())).context("Failed to build audio engine")?;

    let ring_capacity = (config.block_size * 8).next_power_of_two();
    let (input_tx, input_rx) = ring_channel::<f32>(ring_capacity)?;
    let (output_tx, output_rx) = ring_channel::<f32>(ring_capacity)?;

    let running = Arc::new(AtomicBool::new(true));

    let io_running = Arc::clone(&running);
    let (sample_rate, block_size) = (config.sample_rate, config.block_size);
    let io = thread::Builder::new()
        .name("bench-io".to_string())
        .spawn(move || run_io(io_running, input_tx, output_rx, sample_rate, block_size))
        .context("Failed to spawn I/O thread")?;

    // Let the I/O thread fill the input ring before the first period
    thread::sleep(Duration::from_millis(5));

    let audio_running = Arc::clone(&running);
    let audio = thread::Builder::new()
        .name("bench-audio".to_string())
        .spawn(move || run_audio(audio_running, engine, input_rx, output_tx))
        .context("Failed to spawn audio thread")?;

    run_control(&mut controller, args.seconds, args.ir_ms);
    running.store(false, Ordering::Release);

    let blocks = audio.join().map_err(|_| anyhow!("Audio thread panicked"))?;
    let output = io.join().map_err(|_| anyhow!("I/O thread panicked"))?;

    report(&config, &blocks, &output);
    Ok(())
}
